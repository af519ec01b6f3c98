use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mediator::Request;
use serde::ser::Error as _;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use warden_common::json::value_depth;

use super::middleware::{Command, Dispatcher, Query};
use super::DefaultAsyncMediator;
use crate::api::context::CallerContext;
use crate::audit::test_support::{FailingSink, RecordingSink};
use crate::audit::{
    AuditSink, RequestKind, SinkMode, MAX_RESPONSE_PAYLOAD_DEPTH, TRUNCATED_PLACEHOLDER,
    UNSERIALIZABLE_PLACEHOLDER,
};

#[derive(Debug, Serialize)]
struct CreateNoteCommand {
    title: String,
}

#[derive(Debug, Serialize)]
struct RenameNoteCommand {
    note_id: Uuid,
    title: String,
}

#[derive(Debug, Serialize)]
struct ArchiveNoteCommand {
    note_id: Uuid,
}

#[derive(Debug, Serialize)]
struct ListNotesQuery {
    limit: i64,
}

#[derive(Debug, Serialize)]
struct GetNoteQuery {
    note_id: Uuid,
}

#[derive(Debug, Serialize)]
struct NoteResponse {
    id: Uuid,
    title: String,
}

/// Serializes structurally but always fails at runtime.
#[derive(Debug)]
struct OpaqueCommand;

impl Serialize for OpaqueCommand {
    fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("refuses to serialize"))
    }
}

/// Request with no audit capability at all.
#[derive(Debug)]
struct PingRequest;

impl Request<Result<NoteResponse, String>> for CreateNoteCommand {}
impl Command for CreateNoteCommand {
    fn log_name() -> String {
        "notes.commands.create".to_string()
    }
}

impl Request<Result<NoteResponse, String>> for RenameNoteCommand {}
impl Command for RenameNoteCommand {
    fn log_name() -> String {
        "notes.commands.rename".to_string()
    }

    fn entity_id(&self) -> Option<Uuid> {
        Some(self.note_id)
    }
}

// Relies on the default log_name derivation.
impl Request<Result<NoteResponse, String>> for ArchiveNoteCommand {}
impl Command for ArchiveNoteCommand {
    fn entity_id(&self) -> Option<Uuid> {
        Some(self.note_id)
    }
}

impl Request<Result<Vec<NoteResponse>, String>> for ListNotesQuery {}
impl Query for ListNotesQuery {
    fn log_name() -> String {
        "notes.queries.list".to_string()
    }
}

impl Request<Result<NoteResponse, String>> for GetNoteQuery {}
impl Query for GetNoteQuery {
    const LOG_RESPONSE: bool = true;

    fn log_name() -> String {
        "notes.queries.get".to_string()
    }
}

impl Request<Result<NoteResponse, String>> for OpaqueCommand {}
impl Command for OpaqueCommand {
    fn log_name() -> String {
        "notes.commands.opaque".to_string()
    }
}

impl Request<String> for PingRequest {}

fn note_mediator() -> DefaultAsyncMediator {
    DefaultAsyncMediator::builder()
        .add_handler(|cmd: CreateNoteCommand| async move {
            if cmd.title.is_empty() {
                Err("title must not be empty".to_string())
            } else {
                Ok(NoteResponse {
                    id: Uuid::new_v4(),
                    title: cmd.title,
                })
            }
        })
        .add_handler(|cmd: RenameNoteCommand| async move {
            Ok::<_, String>(NoteResponse {
                id: cmd.note_id,
                title: cmd.title,
            })
        })
        .add_handler(|cmd: ArchiveNoteCommand| async move {
            Ok::<_, String>(NoteResponse {
                id: cmd.note_id,
                title: "archived".to_string(),
            })
        })
        .add_handler(|_cmd: OpaqueCommand| async move {
            Ok::<_, String>(NoteResponse {
                id: Uuid::new_v4(),
                title: "opaque".to_string(),
            })
        })
        .add_handler(|query: ListNotesQuery| async move {
            if query.limit < 0 {
                Err("limit out of range".to_string())
            } else {
                Ok(vec![NoteResponse {
                    id: Uuid::new_v4(),
                    title: "first".to_string(),
                }])
            }
        })
        .add_handler(|query: GetNoteQuery| async move {
            if query.note_id.is_nil() {
                Err("note not found".to_string())
            } else {
                Ok(NoteResponse {
                    id: query.note_id,
                    title: "note".to_string(),
                })
            }
        })
        .add_handler(|_req: PingRequest| async move { "pong".to_string() })
        .build()
}

fn sink_pair() -> (Arc<RecordingSink>, Arc<RecordingSink>, Vec<Arc<dyn AuditSink>>) {
    let db = Arc::new(RecordingSink::new("database", SinkMode::WritesOnly));
    let net = Arc::new(RecordingSink::new("network", SinkMode::All));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![db.clone(), net.clone()];
    (db, net, sinks)
}

fn caller() -> CallerContext {
    CallerContext {
        user_email: Some("ops@example.com".to_string()),
        ip_address: Some("10.0.0.9".to_string()),
    }
}

#[tokio::test]
async fn test_command_reaches_all_sinks() {
    let (db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let response = dispatcher
        .send_command(
            &caller(),
            CreateNoteCommand {
                title: "daily standup".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.title, "daily standup");
    assert_eq!(db.writes(), 1);
    assert_eq!(net.writes(), 1);

    let entry = db.last_entry();
    assert_eq!(entry.category, "notes.commands.create");
    assert_eq!(entry.request_kind, RequestKind::Command);
    assert!(entry.success);
    assert_eq!(entry.request_payload["title"], "daily standup");
    assert!(entry.response_payload.is_none());
    assert_eq!(entry.user_email.as_deref(), Some("ops@example.com"));
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.9"));
    assert!(entry.entity_id.is_none());

    // Every sink sees the same entry, id included.
    assert_eq!(entry.id, net.last_entry().id);
}

#[tokio::test]
async fn test_query_skips_write_only_sinks() {
    let (db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let notes = dispatcher
        .send_query(&caller(), ListNotesQuery { limit: 10 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(notes.len(), 1);
    assert_eq!(db.writes(), 0, "queries must not reach write-only sinks");
    assert_eq!(net.writes(), 1);

    let entry = net.last_entry();
    assert_eq!(entry.category, "notes.queries.list");
    assert_eq!(entry.request_kind, RequestKind::Query);
    assert!(entry.success);
    assert!(entry.entity_id.is_none(), "query entries never carry an entity id");
}

#[tokio::test]
async fn test_mixed_traffic_write_counts() {
    let (db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    dispatcher
        .send_command(
            &caller(),
            CreateNoteCommand {
                title: "retro".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    dispatcher
        .send_query(&caller(), ListNotesQuery { limit: 5 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(db.writes(), 1);
    assert_eq!(net.writes(), 2);

    let categories: Vec<String> =
        net.entries().iter().map(|entry| entry.category.clone()).collect();
    assert_eq!(categories, vec!["notes.commands.create", "notes.queries.list"]);
}

#[tokio::test]
async fn test_query_without_eligible_sink_skips_audit() {
    let executed = Arc::new(AtomicBool::new(false));
    let mediator = DefaultAsyncMediator::builder()
        .add_handler({
            let executed = executed.clone();
            move |query: ListNotesQuery| {
                let executed = executed.clone();
                async move {
                    executed.store(true, Ordering::SeqCst);
                    Ok::<_, String>(vec![NoteResponse {
                        id: Uuid::new_v4(),
                        title: format!("note {}", query.limit),
                    }])
                }
            }
        })
        .build();

    let db = Arc::new(RecordingSink::new("database", SinkMode::WritesOnly));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![db.clone()];
    let dispatcher = Dispatcher::new(mediator, sinks);

    let notes = dispatcher
        .send_query(&caller(), ListNotesQuery { limit: 3 })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(notes.len(), 1);
    assert!(executed.load(Ordering::SeqCst), "handler must still run");
    assert_eq!(db.writes(), 0);
}

#[tokio::test]
async fn test_failed_command_leaves_no_trail() {
    // Current policy: a command that fails is not recorded anywhere.
    // Failures are observable only through handler logging.
    let (db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let response: Result<NoteResponse, String> = dispatcher
        .send_command(
            &caller(),
            CreateNoteCommand {
                title: String::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.unwrap_err(), "title must not be empty");
    assert_eq!(db.writes(), 0);
    assert_eq!(net.writes(), 0);
}

#[tokio::test]
async fn test_failed_query_recorded_with_failure() {
    let (_db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let response: Result<NoteResponse, String> = dispatcher
        .send_query(
            &caller(),
            GetNoteQuery {
                note_id: Uuid::nil(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.unwrap_err(), "note not found");
    assert_eq!(net.writes(), 1);

    let entry = net.last_entry();
    assert!(!entry.success);
    assert!(
        entry.response_payload.is_none(),
        "failed queries never record a response, opt-in or not"
    );
}

#[tokio::test]
async fn test_query_response_recorded_on_opt_in() {
    let (_db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let note_id = Uuid::new_v4();
    dispatcher
        .send_query(&caller(), GetNoteQuery { note_id })
        .await
        .unwrap()
        .unwrap();

    let entry = net.last_entry();
    let payload = entry.response_payload.expect("opt-in query records its response");
    assert_eq!(payload["title"], "note");
    assert_eq!(payload["id"], json!(note_id));
}

#[tokio::test]
async fn test_query_response_not_recorded_by_default() {
    let (_db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    dispatcher
        .send_query(&caller(), ListNotesQuery { limit: 1 })
        .await
        .unwrap()
        .unwrap();

    assert!(net.last_entry().response_payload.is_none());
}

#[tokio::test]
async fn test_response_payload_depth_capped() {
    #[derive(Debug, Serialize)]
    struct TreeQuery;

    impl Request<Result<JsonValue, String>> for TreeQuery {}
    impl Query for TreeQuery {
        const LOG_RESPONSE: bool = true;

        fn log_name() -> String {
            "notes.queries.tree".to_string()
        }
    }

    let mediator = DefaultAsyncMediator::builder()
        .add_handler(|_query: TreeQuery| async move {
            let mut tree = json!({ "leaf": true });
            for _ in 0..14 {
                tree = json!({ "child": tree });
            }
            Ok::<_, String>(tree)
        })
        .build();

    let net = Arc::new(RecordingSink::new("network", SinkMode::All));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![net.clone()];
    let dispatcher = Dispatcher::new(mediator, sinks);

    dispatcher.send_query(&caller(), TreeQuery).await.unwrap().unwrap();

    let payload = net.last_entry().response_payload.expect("response recorded");
    assert!(value_depth(&payload) <= MAX_RESPONSE_PAYLOAD_DEPTH);
    let rendered = serde_json::to_string(&payload).unwrap();
    assert!(rendered.contains(TRUNCATED_PLACEHOLDER));
}

#[tokio::test]
async fn test_sink_failure_does_not_affect_response() {
    let failing = Arc::new(FailingSink::new());
    let net = Arc::new(RecordingSink::new("network", SinkMode::All));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![failing.clone(), net.clone()];
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let response = dispatcher
        .send_command(
            &caller(),
            CreateNoteCommand {
                title: "sink failure drill".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(response.is_ok(), "sink failures never surface to the caller");
    assert_eq!(failing.calls(), 1);
    assert_eq!(net.writes(), 1, "later sinks still receive the entry");
}

#[tokio::test]
async fn test_entity_scoped_command_records_entity_id() {
    let (db, _net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let note_id = Uuid::new_v4();
    dispatcher
        .send_command(
            &caller(),
            RenameNoteCommand {
                note_id,
                title: "renamed".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(db.last_entry().entity_id, Some(note_id));
}

#[tokio::test]
async fn test_duration_reflects_handler_time() {
    #[derive(Debug, Serialize)]
    struct SlowCommand;

    impl Request<Result<NoteResponse, String>> for SlowCommand {}
    impl Command for SlowCommand {
        fn log_name() -> String {
            "notes.commands.slow".to_string()
        }
    }

    let mediator = DefaultAsyncMediator::builder()
        .add_handler(|_cmd: SlowCommand| async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            Ok::<_, String>(NoteResponse {
                id: Uuid::new_v4(),
                title: "slow".to_string(),
            })
        })
        .build();

    let db = Arc::new(RecordingSink::new("database", SinkMode::WritesOnly));
    let sinks: Vec<Arc<dyn AuditSink>> = vec![db.clone()];
    let dispatcher = Dispatcher::new(mediator, sinks);

    dispatcher.send_command(&caller(), SlowCommand).await.unwrap().unwrap();

    assert!(db.last_entry().duration_ms >= 25);
}

#[tokio::test]
async fn test_unserializable_command_still_dispatched() {
    let (db, _net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let response = dispatcher.send_command(&caller(), OpaqueCommand).await.unwrap();

    assert!(response.is_ok(), "serialization failures never block dispatch");
    assert_eq!(
        db.last_entry().request_payload,
        JsonValue::String(UNSERIALIZABLE_PLACEHOLDER.to_string())
    );
}

#[tokio::test]
async fn test_plain_request_bypasses_audit() {
    let (db, net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let pong: String = dispatcher.send(PingRequest).await.unwrap();

    assert_eq!(pong, "pong");
    assert_eq!(db.writes(), 0);
    assert_eq!(net.writes(), 0);
}

#[tokio::test]
async fn test_default_log_name_derived_from_module_path() {
    let (db, _net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    dispatcher
        .send_command(
            &caller(),
            ArchiveNoteCommand {
                note_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(db.last_entry().category, "warden_server.cqrs.middleware_tests");
}

#[tokio::test]
async fn test_anonymous_caller_recorded_empty() {
    let (db, _net, sinks) = sink_pair();
    let dispatcher = Dispatcher::new(note_mediator(), sinks);

    let ctx = CallerContext {
        user_email: None,
        ip_address: None,
    };
    dispatcher
        .send_command(
            &ctx,
            CreateNoteCommand {
                title: "anonymous".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();

    let entry = db.last_entry();
    assert!(entry.user_email.is_none());
    assert!(entry.ip_address.is_none());
}
