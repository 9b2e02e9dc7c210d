//! glr-daemon entry point.
//!
//! Thin: loads config and secrets, picks a snapshot store, wires middleware
//! and starts the HTTP server. Handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use glr_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, ReadinessConfig, UnusedKeyPolicy,
};
use glr_daemon::{
    routes,
    state::{AppState, ODataConnector},
};
use glr_db::{MemorySnapshotStore, PgSnapshotStore, SnapshotStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "GLR_CONFIG";
const ENV_DAEMON_ADDR: &str = "GLR_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("config load failed")?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &unused.unused_leaf_pointers {
        warn!(pointer = %p, "config key is not read by anything");
    }
    let config = ReadinessConfig::from_config_json(&loaded.config_json)?;
    let secrets = resolve_secrets(&loaded.config_json);
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    if secrets.directory_credentials().is_err() {
        warn!(
            username_var = %secrets.username_var,
            password_var = %secrets.password_var,
            "directory credentials not set; /v1/run will answer 400"
        );
    }

    let store = snapshot_store_from_env().await?;

    let shared = Arc::new(AppState::new(
        config,
        loaded.config_hash,
        secrets,
        store,
        Arc::new(ODataConnector),
    ));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("glr-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

/// Comma-separated YAML paths, base first.
fn config_paths_from_env() -> Vec<String> {
    std::env::var(ENV_CONFIG_PATHS)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Postgres when GLR_DATABASE_URL is set, otherwise a process-local store.
async fn snapshot_store_from_env() -> anyhow::Result<Arc<dyn SnapshotStore>> {
    if std::env::var(glr_db::ENV_DB_URL).is_err() {
        warn!("GLR_DATABASE_URL not set; snapshots are kept in memory and lost on restart");
        return Ok(Arc::new(MemorySnapshotStore::new()));
    }
    let pool = glr_db::connect_from_env().await?;
    glr_db::migrate(&pool).await?;
    info!("snapshot store: postgres");
    Ok(Arc::new(PgSnapshotStore::new(pool)))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:8501",
        "http://127.0.0.1:8501",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
