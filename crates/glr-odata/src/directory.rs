//! Directory boundary for readiness evidence acquisition.
//!
//! This module defines **only** the query type, the row type, the error
//! taxonomy and the [`Directory`] trait. No HTTP, no paging, no
//! classification logic belong here.

use std::fmt;

use serde_json::{Map, Value};

/// One upstream entity row, exactly as decoded from the response payload.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Field selection plus optional filter / expansion for one entity fetch.
///
/// Paging parameters (`$top`, `$skip`, `$format`) are owned by the
/// [`Directory`] implementation and never appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub expand: Vec<String>,
}

impl EntityQuery {
    /// Query selecting the given fields.
    pub fn select(fields: &[&str]) -> Self {
        Self {
            select: fields.iter().map(|f| f.to_string()).collect(),
            filter: None,
            expand: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_expand(mut self, navs: &[&str]) -> Self {
        self.expand = navs.iter().map(|n| n.to_string()).collect();
        self
    }

    /// `true` when `field` is one of the selected properties.
    pub fn selects(&self, field: &str) -> bool {
        self.select.iter().any(|f| f == field)
    }

    /// `true` when `nav` is one of the expanded navigation paths.
    pub fn expands(&self, nav: &str) -> bool {
        self.expand.iter().any(|n| n == nav)
    }

    /// OData system query options in a stable order: `$select`, `$filter`, `$expand`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(3);
        if !self.select.is_empty() {
            out.push(("$select".to_string(), self.select.join(",")));
        }
        if let Some(f) = &self.filter {
            out.push(("$filter".to_string(), f.clone()));
        }
        if !self.expand.is_empty() {
            out.push(("$expand".to_string(), self.expand.join(",")));
        }
        out
    }
}

impl fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .to_params()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{}", parts.join("&"))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`Directory`] may return.
///
/// Only [`FetchError::QueryRejected`] means "this query shape is not
/// supported here, try a smaller one". Every other variant means the
/// directory itself is unreachable or refusing us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server refused the query itself (unknown field, bad expand, bad filter).
    QueryRejected {
        entity: String,
        status: u16,
        message: String,
    },
    /// Credentials were refused or lack permission.
    Auth {
        entity: String,
        status: u16,
        message: String,
    },
    /// Any other non-success HTTP status.
    Http {
        entity: String,
        status: u16,
        message: String,
    },
    Timeout { entity: String, message: String },
    /// Network or transport failure.
    Transport { entity: String, message: String },
    /// A response payload could not be decoded.
    Decode { entity: String, message: String },
}

impl FetchError {
    pub fn is_query_rejection(&self) -> bool {
        matches!(self, FetchError::QueryRejected { .. })
    }

    pub fn entity(&self) -> &str {
        match self {
            FetchError::QueryRejected { entity, .. }
            | FetchError::Auth { entity, .. }
            | FetchError::Http { entity, .. }
            | FetchError::Timeout { entity, .. }
            | FetchError::Transport { entity, .. }
            | FetchError::Decode { entity, .. } => entity,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::QueryRejected {
                entity,
                status,
                message,
            } => write!(f, "{entity}: query rejected (http {status}): {message}"),
            FetchError::Auth {
                entity,
                status,
                message,
            } => write!(f, "{entity}: not authorized (http {status}): {message}"),
            FetchError::Http {
                entity,
                status,
                message,
            } => write!(f, "{entity}: http error {status}: {message}"),
            FetchError::Timeout { entity, message } => write!(f, "{entity}: timed out: {message}"),
            FetchError::Transport { entity, message } => {
                write!(f, "{entity}: transport error: {message}")
            }
            FetchError::Decode { entity, message } => write!(f, "{entity}: decode error: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Directory trait
// ---------------------------------------------------------------------------

/// Upstream HR directory contract: "fetch every row matching this query".
///
/// Implementations own pagination and must be `Send + Sync` so one handle
/// can be shared by an HTTP handler and the run it spawns.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Human-readable name identifying this directory (e.g. `"sf-odata-v2"`).
    fn source_name(&self) -> &'static str;

    /// Fetch all rows of `entity` (e.g. `"EmpJob"`) matching `query`.
    async fn fetch_all(&self, entity: &str, query: &EntityQuery) -> Result<Vec<Row>, FetchError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
