//! Axum router and HTTP handlers for glr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use glr_odata::normalize_base_url;
use tracing::{error, info};

use crate::{
    api_types::{ErrorResponse, HealthResponse, LatestQuery, LatestResponse, RunRequest, RunResponse},
    runner::{execute_run, RunContext, RunError, RunOverrides},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/run", post(run_now))
        .route("/v1/metrics/latest", get(latest_metrics))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/run
// ---------------------------------------------------------------------------

/// Run every gate now and store the snapshot.
///
/// 400 when the run cannot start (bad body, no base URL, no credentials);
/// 500 `{"error":"Run failed: ..."}` when evidence could not be acquired,
/// in which case nothing is stored.
pub(crate) async fn run_now(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    // An empty body means "use config defaults".
    let req: RunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid run request: {e}")),
        }
    };

    let ctx = RunContext {
        config: &st.config,
        config_hash: &st.config_hash,
        secrets: &st.secrets,
        connector: st.connector.as_ref(),
        store: st.store.as_ref(),
    };
    let overrides = RunOverrides {
        instance_url: req.instance_url,
        api_base_url: req.api_base_url,
        company_id: req.company_id,
    };

    match execute_run(&ctx, &overrides).await {
        Ok(outcome) => {
            info!(snapshot_id = %outcome.snapshot_id, "run completed");
            (
                StatusCode::OK,
                Json(RunResponse {
                    ok: true,
                    snapshot_id: outcome.snapshot_id,
                    metrics: outcome.result,
                }),
            )
                .into_response()
        }
        Err(e @ RunError::BadRequest(_)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!(error = %e, "run/now failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/metrics/latest
// ---------------------------------------------------------------------------

/// Latest snapshot for `?instance_url=`, or the latest overall without it.
pub(crate) async fn latest_metrics(
    State(st): State<Arc<AppState>>,
    Query(q): Query<LatestQuery>,
) -> Response {
    let scope_key = q
        .instance_url
        .as_deref()
        .map(normalize_base_url)
        .filter(|s| !s.is_empty());

    match st.store.load_latest(scope_key.as_deref()).await {
        Ok(None) => (StatusCode::OK, Json(LatestResponse::empty())).into_response(),
        Ok(Some(snap)) => (
            StatusCode::OK,
            Json(LatestResponse {
                status: "ok".to_string(),
                snapshot_id: Some(snap.snapshot_id),
                taken_at_utc: Some(snap.taken_at_utc),
                config_hash: Some(snap.config_hash),
                metrics: Some(snap.metrics),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics/latest failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}
