//! Configuration management

use serde::{Deserialize, Serialize};

use crate::audit::SinkMode;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/warden";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Audit Configuration Constants
// ============================================================================

/// Default collector endpoint tagged on forwarded audit entries.
pub const DEFAULT_AUDIT_NET_ENDPOINT: &str = "http://localhost:4318/v1/logs";

/// Default capacity of the network sink's in-memory queue.
pub const DEFAULT_AUDIT_NET_QUEUE_CAPACITY: usize = 10_000;

/// Default grace period for draining the network sink at shutdown.
pub const DEFAULT_AUDIT_NET_GRACE_SECS: u64 = 5;

/// Default service name reported to the tracer.
pub const DEFAULT_TELEMETRY_SERVICE_NAME: &str = "warden-server";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub audit: AuditConfig,
    pub telemetry: TelemetryConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Audit pipeline configuration
///
/// The database sink is always on and is not configurable; the network and
/// trace sinks are opt-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub network: NetworkAuditConfig,
    pub trace: TraceAuditConfig,
}

/// Network audit sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAuditConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub mode: SinkMode,
    pub queue_capacity: usize,
    pub shutdown_grace_secs: u64,
}

/// Trace audit sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceAuditConfig {
    pub enabled: bool,
    pub mode: SinkMode,
}

/// Telemetry (OpenTelemetry tracer) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("WARDEN_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("WARDEN_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("WARDEN_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            audit: AuditConfig {
                network: NetworkAuditConfig {
                    enabled: std::env::var("AUDIT_NET_ENABLED")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(false),
                    endpoint: std::env::var("AUDIT_NET_ENDPOINT")
                        .unwrap_or_else(|_| DEFAULT_AUDIT_NET_ENDPOINT.to_string()),
                    mode: std::env::var("AUDIT_NET_MODE")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(SinkMode::All),
                    queue_capacity: std::env::var("AUDIT_NET_QUEUE_CAPACITY")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_AUDIT_NET_QUEUE_CAPACITY),
                    shutdown_grace_secs: std::env::var("AUDIT_NET_GRACE_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_AUDIT_NET_GRACE_SECS),
                },
                trace: TraceAuditConfig {
                    enabled: std::env::var("AUDIT_TRACE_ENABLED")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(false),
                    mode: std::env::var("AUDIT_TRACE_MODE")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(SinkMode::All),
                },
            },
            telemetry: TelemetryConfig {
                enabled: std::env::var("WARDEN_OTEL_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                service_name: std::env::var("WARDEN_SERVICE_NAME")
                    .unwrap_or_else(|_| DEFAULT_TELEMETRY_SERVICE_NAME.to_string()),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate connection pool settings
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        // Validate audit settings
        if self.audit.network.queue_capacity == 0 {
            anyhow::bail!("Audit network queue_capacity must be greater than 0");
        }

        if self.audit.network.enabled && self.audit.network.endpoint.is_empty() {
            anyhow::bail!("Audit network endpoint cannot be empty when the sink is enabled");
        }

        // Validate CORS origins
        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            audit: AuditConfig {
                network: NetworkAuditConfig {
                    enabled: false,
                    endpoint: DEFAULT_AUDIT_NET_ENDPOINT.to_string(),
                    mode: SinkMode::All,
                    queue_capacity: DEFAULT_AUDIT_NET_QUEUE_CAPACITY,
                    shutdown_grace_secs: DEFAULT_AUDIT_NET_GRACE_SECS,
                },
                trace: TraceAuditConfig {
                    enabled: false,
                    mode: SinkMode::All,
                },
            },
            telemetry: TelemetryConfig {
                enabled: false,
                service_name: DEFAULT_TELEMETRY_SERVICE_NAME.to_string(),
            },
        }
    }
}
