//! glr-odata
//!
//! Evidence acquisition from a SuccessFactors-style OData v2 API.
//!
//! This crate owns the [`Directory`] abstraction and the concrete paging
//! HTTP client. It does **not** classify or score anything; the readiness
//! core in `glr-gates` consumes rows through the trait only.

pub mod directory;

pub use directory::{Directory, EntityQuery, FetchError, Row};

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Path prefix of the OData v2 service root.
const ODATA_V2_ROOT: &str = "/odata/v2";

/// Longest upstream error body echoed into a [`FetchError`].
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Trim whitespace and trailing slashes from a base URL.
pub fn normalize_base_url(u: &str) -> String {
    u.trim().trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Transport and paging knobs for [`ODataClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Rows requested per page (`$top`).
    pub page_size: usize,
    /// Hard cap on pages fetched per entity.
    pub max_pages: usize,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub verify_tls: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 200,
            timeout_secs: 60,
            verify_tls: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OData v2 client with `$top`/`$skip` paging and basic auth.
///
/// Credentials are passed in by the caller; they are never logged and are
/// redacted from `Debug`.
#[derive(Clone)]
pub struct ODataClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
    settings: ClientSettings,
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ODataClient {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        settings: ClientSettings,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url);
        if base_url.is_empty() {
            return Err(anyhow!("directory base url is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            base_url,
            username: username.into(),
            password: password.into(),
            http,
            settings,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/odata/v2/{entity}`; a base that already ends in the service
    /// root is not doubled.
    fn entity_url(&self, entity: &str) -> String {
        let entity = entity.trim_start_matches('/');
        if self.base_url.ends_with(ODATA_V2_ROOT) {
            format!("{}/{}", self.base_url, entity)
        } else {
            format!("{}{}/{}", self.base_url, ODATA_V2_ROOT, entity)
        }
    }

    async fn get_page(&self, entity: &str, params: &[(String, String)]) -> Result<Vec<Row>, FetchError> {
        let resp = self
            .http
            .get(self.entity_url(entity))
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| request_error(entity, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(entity, status.as_u16(), odata_error_message(&body)));
        }

        let body: Value = resp.json().await.map_err(|e| FetchError::Decode {
            entity: entity.to_string(),
            message: e.to_string(),
        })?;

        extract_results(&body).ok_or_else(|| FetchError::Decode {
            entity: entity.to_string(),
            message: "response has no d.results collection".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Directory for ODataClient {
    fn source_name(&self) -> &'static str {
        "sf-odata-v2"
    }

    async fn fetch_all(&self, entity: &str, query: &EntityQuery) -> Result<Vec<Row>, FetchError> {
        let page_size = self.settings.page_size.max(1);
        let mut base_params = query.to_params();
        base_params.push(("$format".to_string(), "json".to_string()));

        let mut rows: Vec<Row> = Vec::new();
        let mut skip = 0usize;

        for page in 0..self.settings.max_pages {
            let mut params = base_params.clone();
            params.push(("$top".to_string(), page_size.to_string()));
            params.push(("$skip".to_string(), skip.to_string()));

            let batch = self.get_page(entity, &params).await?;
            let n = batch.len();
            rows.extend(batch);
            debug!(entity, page, rows = n, "odata page fetched");

            if n < page_size {
                return Ok(rows);
            }
            skip += page_size;
        }

        warn!(
            entity,
            max_pages = self.settings.max_pages,
            rows = rows.len(),
            "odata page cap reached; result may be truncated"
        );
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Pull the row collection out of an OData payload.
///
/// Accepts the v2 shapes `{"d":{"results":[..]}}` and `{"d":[..]}`, and the
/// v4 shape `{"value":[..]}`. Non-object entries are dropped.
fn extract_results(body: &Value) -> Option<Vec<Row>> {
    let arr = match body.get("d") {
        Some(Value::Object(d)) => d.get("results")?.as_array()?,
        Some(Value::Array(a)) => a,
        _ => body.get("value")?.as_array()?,
    };
    Some(
        arr.iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
    )
}

/// Best-effort human message from an OData error body.
fn odata_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        let msg = v.pointer("/error/message")?;
        match msg {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => msg.get("value")?.as_str().map(str::to_string),
            _ => None,
        }
    });

    match from_json {
        Some(m) => m,
        None => {
            let t = body.trim();
            if t.is_empty() {
                "empty response body".to_string()
            } else {
                t.chars().take(MAX_ERROR_BODY_CHARS).collect()
            }
        }
    }
}

fn status_error(entity: &str, status: u16, message: String) -> FetchError {
    let entity = entity.to_string();
    match status {
        400 => FetchError::QueryRejected {
            entity,
            status,
            message,
        },
        401 | 403 => FetchError::Auth {
            entity,
            status,
            message,
        },
        _ => FetchError::Http {
            entity,
            status,
            message,
        },
    }
}

fn request_error(entity: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            entity: entity.to_string(),
            message: e.to_string(),
        }
    } else {
        FetchError::Transport {
            entity: entity.to_string(),
            message: e.to_string(),
        }
    }
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_trims_and_strips_trailing_slashes() {
        assert_eq!(normalize_base_url("  https://api.sf.com//  "), "https://api.sf.com");
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn empty_base_url_is_refused() {
        assert!(ODataClient::new("  / ", "u", "p", ClientSettings::default()).is_err());
    }

    #[test]
    fn entity_url_does_not_double_service_root() {
        let a = ODataClient::new("https://api.sf.com", "u", "p", ClientSettings::default()).unwrap();
        let b = ODataClient::new("https://api.sf.com/odata/v2/", "u", "p", ClientSettings::default())
            .unwrap();
        assert_eq!(a.entity_url("EmpJob"), "https://api.sf.com/odata/v2/EmpJob");
        assert_eq!(b.entity_url("/EmpJob"), "https://api.sf.com/odata/v2/EmpJob");
    }

    #[test]
    fn debug_redacts_password() {
        let c = ODataClient::new("https://api.sf.com", "admin", "hunter2", ClientSettings::default())
            .unwrap();
        let s = format!("{c:?}");
        assert!(!s.contains("hunter2"));
        assert!(s.contains("<REDACTED>"));
    }

    #[test]
    fn extract_results_accepts_known_shapes() {
        let v2 = json!({"d": {"results": [{"userId": "U1"}, 7, {"userId": "U2"}]}});
        let v2_bare = json!({"d": [{"userId": "U1"}]});
        let v4 = json!({"value": [{"userId": "U1"}]});

        assert_eq!(extract_results(&v2).unwrap().len(), 2);
        assert_eq!(extract_results(&v2_bare).unwrap().len(), 1);
        assert_eq!(extract_results(&v4).unwrap().len(), 1);
        assert!(extract_results(&json!({"d": {"userId": "U1"}})).is_none());
        assert!(extract_results(&json!({"error": "x"})).is_none());
    }

    #[test]
    fn error_message_prefers_odata_error_value() {
        let body = r#"{"error":{"code":"COE_PROPERTY_NOT_FOUND","message":{"lang":"en-US","value":"[COE0021]Invalid property names: EmpJob/foo."}}}"#;
        assert_eq!(
            odata_error_message(body),
            "[COE0021]Invalid property names: EmpJob/foo."
        );
        assert_eq!(odata_error_message("   "), "empty response body");
        assert_eq!(odata_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn status_mapping_separates_rejection_from_auth() {
        assert!(status_error("User", 400, String::new()).is_query_rejection());
        assert!(matches!(status_error("User", 401, String::new()), FetchError::Auth { .. }));
        assert!(matches!(status_error("User", 403, String::new()), FetchError::Auth { .. }));
        assert!(matches!(
            status_error("User", 502, String::new()),
            FetchError::Http { status: 502, .. }
        ));
    }
}
