//! Toolgate HTTP server
//!
//! Serves the JSON-RPC tool gateway over HTTP:
//!
//! - `POST /rpc` — JSON-RPC 2.0 endpoint (`initialize`, `tools/list`,
//!   `tools/call`, `ping`)
//! - `GET /health` — liveness probe
//! - `GET /ready` — readiness probe (checks the database)
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (binds 127.0.0.1:8085)
//! toolgate-server
//!
//! # Custom bind address and database
//! toolgate-server --bind 0.0.0.0:9000 --db-path /var/lib/toolgate/gateway.sqlite
//!
//! # Enable verbose logging
//! toolgate-server --verbose
//! ```
//!
//! All other settings come from `TOOLGATE_*` environment variables; see the
//! library's `config` module.

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use toolgate::{
    build_registry, AnalyticsRecorder, Caller, Config, Dispatcher, SearchEngine, Store,
    TieredCache, ToolExecutor,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Toolgate - sandboxed tool-execution gateway for AI agents
#[derive(Parser, Debug)]
#[command(name = "toolgate-server")]
#[command(author, version, about = "JSON-RPC tool gateway with sandboxed execution")]
struct Args {
    /// Listen address, e.g. 127.0.0.1:8085
    #[arg(long, short = 'b')]
    bind: Option<String>,

    /// Path to the gateway database file
    #[arg(long, short = 'd')]
    db_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

struct AppState {
    dispatcher: Dispatcher,
    store: Arc<Store>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "toolgate=info,toolgate_server=info,tower_http=warn".into())
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    tracing::info!(
        db = %config.db_path.display(),
        fs_root = %config.fs_root.display(),
        auth = config.api_key.is_some(),
        "Starting toolgate"
    );

    let store = Arc::new(Store::open(&config.db_path).context("Failed to open database")?);
    let cache = TieredCache::new(
        config.cache_dir.clone(),
        Duration::from_secs(config.cache_ttl_secs),
    );
    let search = SearchEngine::new(store.clone(), cache, config.search_min_relevance);
    let executor =
        ToolExecutor::new(&config, store.clone(), search).context("Failed to build executor")?;
    let registry = build_registry(&config).context("Failed to build tool registry")?;
    tracing::info!(tools = registry.len(), "Tool catalog registered");

    let recorder = AnalyticsRecorder::new(store.clone());
    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(registry, executor, recorder, config.api_key.clone()),
        store,
    });

    let app = Router::new()
        .route(
            "/rpc",
            post(rpc_handler).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn rpc_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let caller = Caller::new(addr.ip().to_string(), user_agent);

    let dispatch = state
        .dispatcher
        .handle(&body, authorization.as_deref(), &caller)
        .await;

    let status = StatusCode::from_u16(dispatch.http_status).unwrap_or(StatusCode::OK);
    (status, Json(dispatch.response))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": toolgate::VERSION,
    }))
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.schema_version() {
        Ok(version) => (
            StatusCode::OK,
            Json(json!({"status": "ready", "schemaVersion": version})),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unavailable", "error": err.to_string()})),
        ),
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
