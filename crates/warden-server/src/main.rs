//! Warden Server - Main entry point

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::info;
use warden_common::logging::{init_logging, LogConfig};

use warden_server::{audit, config::Config, cqrs, features, middleware, telemetry, ServerResult};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
    dispatcher: Arc<cqrs::middleware::Dispatcher>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging: the telemetry flag decides which
    // subscriber owns the global default
    let config = Config::load()?;

    let mut telemetry_guard = None;
    let mut _log_guard = None;
    if config.telemetry.enabled {
        telemetry_guard = Some(telemetry::init_tracing(&config.telemetry)?);
    } else {
        let log_config = LogConfig::builder()
            .log_file_prefix("warden-server".to_string())
            .filter_directives(
                "warden_server=debug,tower_http=debug,axum=trace,sqlx=info".to_string(),
            )
            .build();

        // Merge with environment variables (they take precedence)
        let log_config = LogConfig::from_env().unwrap_or(log_config);

        _log_guard = init_logging(&log_config)?;
    }

    info!("Starting Warden Server");
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    // Assemble the audit pipeline and the dispatcher that feeds it
    let sinks = audit::build_sinks(&config.audit, db_pool.clone());
    let mediator = cqrs::build_mediator(db_pool.clone());
    let dispatcher = Arc::new(cqrs::middleware::Dispatcher::new(mediator, sinks.clone()));

    // Create application state
    let state = AppState {
        db: db_pool,
        dispatcher,
    };

    // Build the application router
    let app = create_router(state, &config);

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown. ConnectInfo is required for the
    // caller-context extractor to see client addresses.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
    .await?;

    // Flush queued audit entries before exit
    audit::close_sinks(&sinks).await;

    if let Some(mut guard) = telemetry_guard {
        guard.shutdown();
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, config: &Config) -> Router {
    // Create feature state
    let feature_state = features::FeatureState {
        db: state.db.clone(),
        dispatcher: state.dispatcher.clone(),
    };

    // Feature routes (CQRS architecture)
    let feature_routes = features::router(feature_state);

    // Build the main router with middleware stack
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/audit", get(query_audit_logs))
        .with_state(state.clone())
        .nest("/api/v1", feature_routes)
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    // Check database connectivity
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}

/// Get platform statistics
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    // Query all stats in parallel
    let users_result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(&state.db);

    let roles_result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles").fetch_one(&state.db);

    let audit_result =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_log").fetch_one(&state.db);

    // Execute all queries concurrently
    let (users_res, roles_res, audit_res) = tokio::join!(users_result, roles_result, audit_result);

    match (users_res, roles_res, audit_res) {
        (Ok(users), Ok(roles), Ok(audit_entries)) => (
            StatusCode::OK,
            Json(json!({
                "users": users,
                "roles": roles,
                "audit_entries": audit_entries
            })),
        )
            .into_response(),
        _ => {
            tracing::error!("Failed to fetch stats from database");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch statistics" })),
            )
                .into_response()
        },
    }
}

/// Query audit logs handler
async fn query_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<audit::AuditLogQuery>,
) -> ServerResult<Json<serde_json::Value>> {
    let logs = audit::query_audit_logs(&state.db, query).await?;
    Ok(Json(json!({ "data": logs })))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give ongoing requests time to complete
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
