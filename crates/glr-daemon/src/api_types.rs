//! Request and response types for the glr-daemon HTTP endpoints.
//!
//! No business logic lives here.

use chrono::{DateTime, Utc};
use glr_schemas::GateResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// POST /v1/run
// ---------------------------------------------------------------------------

/// Every field is optional; absent or blank ones fall back to config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub instance_url: Option<String>,
    pub api_base_url: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub ok: bool,
    pub snapshot_id: Uuid,
    pub metrics: GateResult,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// GET /v1/metrics/latest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatestQuery {
    pub instance_url: Option<String>,
}

/// `{"status":"empty"}` when nothing is stored for the scope, otherwise
/// `{"status":"ok", "metrics": ...}` plus snapshot metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_at_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

impl LatestResponse {
    pub fn empty() -> Self {
        Self {
            status: "empty".to_string(),
            snapshot_id: None,
            taken_at_utc: None,
            config_hash: None,
            metrics: None,
        }
    }
}
