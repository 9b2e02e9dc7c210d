//! One readiness run: resolve scope, connect, evaluate, persist.
//!
//! All-or-nothing: a snapshot is written only after every gate completed.
//! Shared by the HTTP handler and the CLI `run` command.

use std::fmt;

use glr_config::{ReadinessConfig, ResolvedSecrets};
use glr_db::{NewSnapshot, SnapshotStore};
use glr_gates::{run_ec_gates, RunFailed};
use glr_odata::normalize_base_url;
use glr_schemas::GateResult;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::DirectoryConnector;

/// Scope values supplied by the caller; `None` or blank falls back to config.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub instance_url: Option<String>,
    pub api_base_url: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub snapshot_id: Uuid,
    pub scope_key: String,
    pub result: GateResult,
}

#[derive(Debug)]
pub enum RunError {
    /// The run could not start: missing base URL or credentials.
    BadRequest(String),
    /// Required evidence could not be acquired.
    Failed(RunFailed),
    /// The run completed but its snapshot could not be stored.
    Persist(anyhow::Error),
    /// Client construction or serialization failed.
    Internal(anyhow::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::BadRequest(msg) => write!(f, "{msg}"),
            RunError::Failed(e) => write!(f, "Run failed: {e}"),
            RunError::Persist(e) => write!(f, "snapshot not stored: {e:#}"),
            RunError::Internal(e) => write!(f, "internal error: {e:#}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Failed(e) => Some(e),
            RunError::BadRequest(_) | RunError::Persist(_) | RunError::Internal(_) => None,
        }
    }
}

/// Everything a run needs besides the caller's overrides.
pub struct RunContext<'a> {
    pub config: &'a ReadinessConfig,
    pub config_hash: &'a str,
    pub secrets: &'a ResolvedSecrets,
    pub connector: &'a dyn DirectoryConnector,
    pub store: &'a dyn SnapshotStore,
}

pub async fn execute_run(ctx: &RunContext<'_>, overrides: &RunOverrides) -> Result<RunOutcome, RunError> {
    let mut scope = ctx.config.scope_ids(
        overrides.instance_url.as_deref(),
        overrides.api_base_url.as_deref(),
        overrides.company_id.as_deref(),
    );
    scope.instance_url = normalize_base_url(&scope.instance_url);
    scope.api_base_url = normalize_base_url(&scope.api_base_url);

    if scope.api_base_url.is_empty() {
        return Err(RunError::BadRequest(
            "Missing api_base_url and directory.api_base_url is not configured".to_string(),
        ));
    }

    let credentials = ctx
        .secrets
        .directory_credentials()
        .map_err(|e| RunError::BadRequest(e.to_string()))?;

    let directory = ctx
        .connector
        .connect(&scope.api_base_url, &credentials, &ctx.config.directory.client_settings())
        .map_err(RunError::Internal)?;

    let result = match run_ec_gates(directory.as_ref(), &scope, &ctx.config.gates).await {
        Ok(r) => r,
        Err(e) => {
            warn!(entity = e.entity(), error = %e, "readiness run failed; nothing stored");
            return Err(RunError::Failed(e));
        }
    };

    let metrics = serde_json::to_value(&result).map_err(|e| RunError::Internal(e.into()))?;
    let scope_key = scope.scope_key();
    let snapshot_id = ctx
        .store
        .store(&NewSnapshot {
            scope_key: scope_key.clone(),
            taken_at_utc: result.snapshot_time_utc,
            config_hash: ctx.config_hash.to_string(),
            metrics,
        })
        .await
        .map_err(RunError::Persist)?;

    info!(
        %snapshot_id,
        scope_key = %scope_key,
        risk_score = result.risk_score,
        config_hash = %ctx.config_hash,
        "readiness run stored"
    );

    Ok(RunOutcome {
        snapshot_id,
        scope_key,
        result,
    })
}
