//! Status code → label resolution.
//!
//! Job rows carry a tenant-specific status code. Its meaning lives in a
//! picklist label, which may come back inline on the expanded navigation,
//! as a localized collection, or only via a separate `PicklistOption`
//! lookup. All of it is best-effort: the worst outcome is an empty map.

use std::collections::{BTreeMap, BTreeSet};

use glr_odata::{Directory, EntityQuery, Row};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cascade::{first_match, Step};
use crate::fields::{collection, field, non_blank, norm, text};
use crate::policy::GatePolicy;

pub const PICKLIST_ENTITY: &str = "PicklistOption";

/// Direct label properties on a picklist object, in preference order.
const DIRECT_LABEL_KEYS: [&str; 5] =
    ["label_defaultValue", "label_en_US", "localeLabel", "label", "externalName"];

/// Label extraction from one picklist-shaped object (an expanded
/// `emplStatusNav` or a `PicklistOption` row).
pub const LABEL_EXTRACTORS: [Step<Map<String, Value>, String>; 2] = [
    Step {
        name: "navigation_label",
        attempt: navigation_label,
    },
    Step {
        name: "localized_labels",
        attempt: localized_label,
    },
];

fn navigation_label(obj: &Map<String, Value>) -> Option<String> {
    DIRECT_LABEL_KEYS.iter().find_map(|k| text(obj, k))
}

/// Pick from `picklistLabels`: `en_US`, then `en_GB`, then any English or
/// default locale, then any locale with a label.
fn localized_label(obj: &Map<String, Value>) -> Option<String> {
    let entries: Vec<(String, String)> = collection(obj.get("picklistLabels"))
        .into_iter()
        .filter_map(|e| {
            let label = text(e, "label")?;
            let locale = text(e, "locale").map(|l| norm(&l)).unwrap_or_default();
            Some((locale, label))
        })
        .collect();

    let pick = |pred: &dyn Fn(&str) -> bool| {
        entries
            .iter()
            .find(|(loc, _)| pred(loc.as_str()))
            .map(|(_, label)| label.clone())
    };

    pick(&|l| l == "en_us")
        .or_else(|| pick(&|l| l == "en_gb"))
        .or_else(|| pick(&|l| l.starts_with("en") || l.is_empty() || l == "default"))
        .or_else(|| pick(&|_| true))
}

/// Status code of a job row (`emplStatus`), trimmed.
pub fn status_code(row: &Row) -> Option<String> {
    text(row, "emplStatus")
}

// ---------------------------------------------------------------------------
// Picklist lookup
// ---------------------------------------------------------------------------

/// Ways a status code can be written in a `PicklistOption` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeEncoding {
    /// `id eq 123`
    Integer,
    /// `id eq 123L`
    Int64Literal,
    /// `externalCode eq 'A'`
    ExternalCode,
}

impl CodeEncoding {
    pub const ALL: [CodeEncoding; 3] = [
        CodeEncoding::Integer,
        CodeEncoding::Int64Literal,
        CodeEncoding::ExternalCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeEncoding::Integer => "picklist_lookup:id",
            CodeEncoding::Int64Literal => "picklist_lookup:id_int64",
            CodeEncoding::ExternalCode => "picklist_lookup:external_code",
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, CodeEncoding::ExternalCode)
    }

    /// Filter predicate for one code; `None` when this encoding cannot express it.
    pub fn predicate(&self, code: &str) -> Option<String> {
        match self {
            CodeEncoding::Integer => code.parse::<i64>().ok().map(|n| format!("id eq {n}")),
            CodeEncoding::Int64Literal => code.parse::<i64>().ok().map(|n| format!("id eq {n}L")),
            CodeEncoding::ExternalCode => Some(format!("externalCode eq '{}'", code.replace('\'', "''"))),
        }
    }

    /// Code a returned option row answers for.
    fn key_of(&self, row: &Row) -> Option<String> {
        match self {
            CodeEncoding::Integer | CodeEncoding::Int64Literal => {
                text(row, "id").and_then(|s| s.parse::<i64>().ok()).map(|n| n.to_string())
            }
            CodeEncoding::ExternalCode => text(row, "externalCode"),
        }
    }

    /// Code as it appears in the key space of [`Self::key_of`].
    fn canonical(&self, code: &str) -> Option<String> {
        match self {
            CodeEncoding::Integer | CodeEncoding::Int64Literal => {
                code.parse::<i64>().ok().map(|n| n.to_string())
            }
            CodeEncoding::ExternalCode => Some(code.to_string()),
        }
    }
}

fn picklist_query(filter: String) -> EntityQuery {
    EntityQuery::select(&[
        "id",
        "externalCode",
        "localeLabel",
        "picklistLabels/locale",
        "picklistLabels/label",
    ])
    .with_filter(filter)
    .with_expand(&["picklistLabels"])
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Code → label map for one run, plus which strategies produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelResolution {
    pub labels: BTreeMap<String, String>,
    /// Codes labeled per strategy name.
    pub hits: BTreeMap<&'static str, usize>,
}

impl LabelResolution {
    pub fn label_for(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    /// Provenance, e.g. `emplStatusNav.navigation_label (2 codes); picklist_lookup:id (1 code)`.
    pub fn source(&self) -> String {
        if self.labels.is_empty() {
            return "none (no status labels resolved; codes inferred)".to_string();
        }
        let mut parts = Vec::new();
        for (name, n) in &self.hits {
            let unit = if *n == 1 { "code" } else { "codes" };
            if name.starts_with("picklist_lookup") {
                parts.push(format!("{PICKLIST_ENTITY}.{name} ({n} {unit})"));
            } else {
                parts.push(format!("emplStatusNav.{name} ({n} {unit})"));
            }
        }
        parts.join("; ")
    }

    fn insert(&mut self, code: String, label: String, strategy: &'static str) -> bool {
        if self.labels.contains_key(&code) {
            return false;
        }
        self.labels.insert(code, label);
        *self.hits.entry(strategy).or_insert(0) += 1;
        true
    }
}

/// Resolve labels for every status code in `jobs`. Never fails.
pub async fn resolve_labels(dir: &dyn Directory, jobs: &[Row], policy: &GatePolicy) -> LabelResolution {
    let mut out = LabelResolution::default();
    let mut codes: BTreeSet<String> = BTreeSet::new();

    for row in jobs {
        let Some(code) = status_code(row) else { continue };
        codes.insert(code.clone());
        if out.labels.contains_key(&code) {
            continue;
        }
        if let Some(nav) = field(row, "emplStatusNav").as_structured() {
            if let Some((name, label)) = first_match(&LABEL_EXTRACTORS, nav) {
                out.insert(code, label, name);
            }
        }
    }

    let pending: Vec<String> = codes
        .into_iter()
        .filter(|c| !out.labels.contains_key(c))
        .collect();
    if !pending.is_empty() {
        lookup_picklist(dir, &pending, policy, &mut out).await;
    }

    info!(
        codes = out.labels.len(),
        unlabeled = pending.iter().filter(|c| !out.labels.contains_key(*c)).count(),
        "status label resolution finished"
    );
    out
}

/// Batch `PicklistOption` lookup for codes without a label.
///
/// Encodings are tried in order. A rejected encoding falls through to the
/// next one; once a numeric encoding is accepted the other numeric form is
/// skipped. Any other failure ends the lookup.
async fn lookup_picklist(
    dir: &dyn Directory,
    codes: &[String],
    policy: &GatePolicy,
    out: &mut LabelResolution,
) {
    let mut numeric_accepted = false;

    'encodings: for enc in CodeEncoding::ALL {
        if enc.is_numeric() && numeric_accepted {
            continue;
        }
        let todo: Vec<(&String, String)> = codes
            .iter()
            .filter(|c| !out.labels.contains_key(*c))
            .filter_map(|c| enc.predicate(c).map(|p| (c, p)))
            .collect();
        if todo.is_empty() {
            continue;
        }

        for batch in todo.chunks(policy.batch_size()) {
            let filter = batch
                .iter()
                .map(|(_, p)| p.as_str())
                .collect::<Vec<_>>()
                .join(" or ");
            match dir.fetch_all(PICKLIST_ENTITY, &picklist_query(filter)).await {
                Ok(rows) => {
                    if enc.is_numeric() {
                        numeric_accepted = true;
                    }
                    let by_key: BTreeMap<String, &String> = batch
                        .iter()
                        .filter_map(|(code, _)| enc.canonical(code).map(|k| (k, *code)))
                        .collect();
                    for row in &rows {
                        let Some(code) = enc.key_of(row).and_then(|k| by_key.get(&k).copied()) else {
                            continue;
                        };
                        if let Some((_, label)) = first_match(&LABEL_EXTRACTORS, row) {
                            out.insert(code.clone(), label, enc.as_str());
                        }
                    }
                    debug!(encoding = enc.as_str(), codes = batch.len(), rows = rows.len(), "picklist batch fetched");
                }
                Err(e) if e.is_query_rejection() => {
                    debug!(encoding = enc.as_str(), error = %e, "picklist encoding rejected");
                    continue 'encodings;
                }
                Err(e) => {
                    warn!(encoding = enc.as_str(), error = %e, "picklist lookup failed; continuing without it");
                    break 'encodings;
                }
            }
        }
    }
}

/// `"{label} ({code})"`, whichever half exists, or `"Unknown status"`.
pub fn display_status(code: Option<&str>, label: Option<&str>) -> String {
    let code = code.and_then(non_blank);
    let label = label.and_then(non_blank);
    match (label, code) {
        (Some(l), Some(c)) => format!("{l} ({c})"),
        (Some(l), None) => l,
        (None, Some(c)) => c,
        (None, None) => "Unknown status".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn navigation_label_key_order() {
        let nav = obj(json!({"label_en_US": "Active (US)", "label_defaultValue": "Active", "externalName": "X"}));
        assert_eq!(first_match(&LABEL_EXTRACTORS, &nav), Some(("navigation_label", "Active".to_string())));

        let nav = obj(json!({"label_defaultValue": "  ", "externalName": "Leave"}));
        assert_eq!(navigation_label(&nav).as_deref(), Some("Leave"));
    }

    #[test]
    fn localized_labels_prefer_us_then_gb_then_english() {
        let nav = obj(json!({"picklistLabels": {"results": [
            {"locale": "de_DE", "label": "Aktiv"},
            {"locale": "en_GB", "label": "Active (GB)"},
            {"locale": "en_US", "label": "Active"}
        ]}}));
        assert_eq!(first_match(&LABEL_EXTRACTORS, &nav), Some(("localized_labels", "Active".to_string())));

        let nav = obj(json!({"picklistLabels": [
            {"locale": "de_DE", "label": "Aktiv"},
            {"locale": "en_AU", "label": "Active (AU)"}
        ]}));
        assert_eq!(localized_label(&nav).as_deref(), Some("Active (AU)"));

        let nav = obj(json!({"picklistLabels": [{"locale": "fr_FR", "label": "Actif"}, {"locale": "en_US", "label": " "}]}));
        assert_eq!(localized_label(&nav).as_deref(), Some("Actif"));

        assert_eq!(localized_label(&obj(json!({"picklistLabels": {"__deferred": {}}}))), None);
    }

    #[test]
    fn encodings_skip_non_numeric_codes() {
        assert_eq!(CodeEncoding::Integer.predicate("36541").as_deref(), Some("id eq 36541"));
        assert_eq!(CodeEncoding::Int64Literal.predicate("36541").as_deref(), Some("id eq 36541L"));
        assert_eq!(CodeEncoding::Integer.predicate("A"), None);
        assert_eq!(
            CodeEncoding::ExternalCode.predicate("O'B").as_deref(),
            Some("externalCode eq 'O''B'")
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(display_status(Some("A"), Some("Active")), "Active (A)");
        assert_eq!(display_status(Some("A"), None), "A");
        assert_eq!(display_status(None, Some("Active")), "Active");
        assert_eq!(display_status(Some(" "), None), "Unknown status");
        assert_eq!(display_status(None, None), "Unknown status");
    }

    #[test]
    fn empty_resolution_reports_none() {
        assert!(LabelResolution::default().source().starts_with("none"));
    }
}
