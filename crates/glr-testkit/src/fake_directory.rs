use std::collections::HashMap;
use std::sync::Mutex;

use glr_odata::{Directory, EntityQuery, FetchError, Row};

type RejectRule = Box<dyn Fn(&EntityQuery) -> bool + Send + Sync>;

/// One `fetch_all` call as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub entity: String,
    pub query: EntityQuery,
}

/// Scripted directory used ONLY for tests.
///
/// - rows are served per entity and projected onto the selected fields, the
///   way a real server drops unselected properties
/// - a matching reject rule answers with a 400-style query rejection
/// - a scripted failure answers every call for that entity
/// - every call is recorded
#[derive(Default)]
pub struct FakeDirectory {
    rows: HashMap<String, Vec<Row>>,
    failures: HashMap<String, FetchError>,
    rejections: Vec<(String, RejectRule)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, entity: &str, rows: Vec<Row>) -> Self {
        self.rows.entry(entity.to_string()).or_default().extend(rows);
        self
    }

    /// Every call for `entity` fails with `err`.
    pub fn fail_entity(mut self, entity: &str, err: FetchError) -> Self {
        self.failures.insert(entity.to_string(), err);
        self
    }

    /// Reject queries on `entity` for which `rule` holds.
    pub fn reject_when<F>(mut self, entity: &str, rule: F) -> Self
    where
        F: Fn(&EntityQuery) -> bool + Send + Sync + 'static,
    {
        self.rejections.push((entity.to_string(), Box::new(rule)));
        self
    }

    /// Reject any query on `entity` selecting a path that contains `token`
    /// (e.g. a field the tenant does not expose).
    pub fn reject_select_containing(self, entity: &str, token: &str) -> Self {
        let token = token.to_string();
        self.reject_when(entity, move |q| q.select.iter().any(|f| f.contains(&token)))
    }

    /// Reject any query on `entity` that expands `nav`.
    pub fn reject_expand(self, entity: &str, nav: &str) -> Self {
        let nav = nav.to_string();
        self.reject_when(entity, move |q| q.expands(&nav))
    }

    /// Reject every query on `entity`.
    pub fn reject_all(self, entity: &str) -> Self {
        self.reject_when(entity, |_| true)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn queries_for(&self, entity: &str) -> Vec<EntityQuery> {
        self.calls()
            .into_iter()
            .filter(|c| c.entity == entity)
            .map(|c| c.query)
            .collect()
    }

    fn record(&self, entity: &str, query: &EntityQuery) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                entity: entity.to_string(),
                query: query.clone(),
            });
    }
}

impl std::fmt::Debug for FakeDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDirectory")
            .field("entities", &self.rows.keys().collect::<Vec<_>>())
            .field("failures", &self.failures)
            .field("rejections", &self.rejections.len())
            .finish()
    }
}

#[async_trait::async_trait]
impl Directory for FakeDirectory {
    fn source_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_all(&self, entity: &str, query: &EntityQuery) -> Result<Vec<Row>, FetchError> {
        self.record(entity, query);

        if let Some(err) = self.failures.get(entity) {
            return Err(err.clone());
        }

        if self
            .rejections
            .iter()
            .any(|(e, rule)| e == entity && rule(query))
        {
            return Err(FetchError::QueryRejected {
                entity: entity.to_string(),
                status: 400,
                message: format!("[COE0021]Invalid query for {entity}: {query}"),
            });
        }

        Ok(self
            .rows
            .get(entity)
            .map(|rows| rows.iter().map(|r| project(r, query)).collect())
            .unwrap_or_default())
    }
}

/// Keep only top-level properties named by `$select` (a path `nav/field`
/// keeps `nav`). An empty selection keeps everything.
fn project(row: &Row, query: &EntityQuery) -> Row {
    if query.select.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(k, _)| {
            query
                .select
                .iter()
                .any(|s| s.split('/').next() == Some(k.as_str()))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
