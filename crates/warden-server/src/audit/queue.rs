//! Bounded in-memory queue backing the network sink
//!
//! Producers never wait: a full queue evicts its oldest entry to admit the
//! new one. Recent history is worth more than old history when the
//! consumer cannot keep up.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::entry::AuditLogEntry;
use super::sink::SinkError;

pub(crate) struct EntryQueue {
    inner: Mutex<VecDeque<AuditLogEntry>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl EntryQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an entry, evicting the oldest one when the queue is full.
    ///
    /// Fails only after [`close`](Self::close) has been called.
    pub(crate) fn push(&self, entry: AuditLogEntry) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }

        let evicted = {
            let mut queue = self.lock();
            let evicted = if queue.len() == self.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(entry);
            evicted
        };

        if let Some(old) = evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                evicted_id = %old.id,
                category = %old.category,
                "Audit queue full, dropping oldest entry"
            );
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Dequeue the next entry, waiting until one arrives. Returns `None`
    /// once the queue is closed and drained.
    pub(crate) async fn pop(&self) -> Option<AuditLogEntry> {
        loop {
            if let Some(entry) = self.lock().pop_front() {
                return Some(entry);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Dequeue without waiting.
    pub(crate) fn try_pop(&self) -> Option<AuditLogEntry> {
        self.lock().pop_front()
    }

    /// Stop accepting entries and wake the consumer.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        // A consumer that checked the closed flag but has not yet started
        // waiting still needs a stored permit to wake up.
        self.notify.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Number of entries evicted by overflow since creation.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditLogEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
