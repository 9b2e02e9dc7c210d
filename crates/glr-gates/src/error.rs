use std::fmt;

use glr_odata::FetchError;

/// A readiness run could not produce a result. Nothing is persisted.
///
/// Only required evidence (identity rows, job rows) can fail a run; every
/// variant names the entity, the query last attempted and the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailed {
    /// Every field-selection attempt was rejected by the server.
    AttemptsExhausted {
        entity: String,
        attempts: usize,
        last_query: String,
        last_error: FetchError,
    },
    /// A failure that is not a query rejection (auth, network, timeout, decode).
    Unavailable {
        entity: String,
        query: String,
        error: FetchError,
    },
    /// The accepted query returned no rows.
    NoRows { entity: String, query: String },
}

impl RunFailed {
    pub fn entity(&self) -> &str {
        match self {
            RunFailed::AttemptsExhausted { entity, .. }
            | RunFailed::Unavailable { entity, .. }
            | RunFailed::NoRows { entity, .. } => entity,
        }
    }

    /// Human-readable reason, as shown to API callers.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailed::AttemptsExhausted {
                entity,
                attempts,
                last_query,
                last_error,
            } => write!(
                f,
                "unable to fetch {entity}: all {attempts} field selections were rejected; \
                 last query: {last_query}; last error: {last_error}"
            ),
            RunFailed::Unavailable { entity, query, error } => {
                write!(f, "unable to fetch {entity} (query: {query}): {error}")
            }
            RunFailed::NoRows { entity, query } => {
                write!(f, "{entity} returned no rows (query: {query})")
            }
        }
    }
}

impl std::error::Error for RunFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunFailed::AttemptsExhausted { last_error, .. } => Some(last_error),
            RunFailed::Unavailable { error, .. } => Some(error),
            RunFailed::NoRows { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_entity_query_and_cause() {
        let e = RunFailed::AttemptsExhausted {
            entity: "EmpJob".to_string(),
            attempts: 7,
            last_query: "$select=userId".to_string(),
            last_error: FetchError::QueryRejected {
                entity: "EmpJob".to_string(),
                status: 400,
                message: "Invalid property names".to_string(),
            },
        };
        let s = e.to_string();
        assert!(s.contains("EmpJob"));
        assert!(s.contains("$select=userId"));
        assert!(s.contains("Invalid property names"));
        assert_eq!(e.entity(), "EmpJob");
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn no_rows_has_no_source() {
        let e = RunFailed::NoRows {
            entity: "User".to_string(),
            query: "$select=userId,email".to_string(),
        };
        assert!(e.reason().starts_with("User returned no rows"));
        assert!(std::error::Error::source(&e).is_none());
    }
}
