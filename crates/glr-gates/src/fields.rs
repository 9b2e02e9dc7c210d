//! Typed access to loosely-shaped upstream values.
//!
//! Upstream properties arrive either as scalars or as nested objects
//! (expanded navigations, `{"results": [..]}` collections, deferred links).
//! [`FieldValue`] makes that split explicit so callers match on shape
//! instead of probing JSON at runtime.

use glr_odata::Row;
use serde_json::{Map, Value};

/// Keys probed, in order, when a scalar is wanted from a structured value.
const SCALAR_KEYS: [&str; 4] = ["code", "externalCode", "value", "id"];

/// Tokens accepted as "true" / "false" by [`truthy`].
const TRUE_TOKENS: [&str; 5] = ["true", "t", "1", "yes", "y"];
const FALSE_TOKENS: [&str; 5] = ["false", "f", "0", "no", "n"];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Missing key or JSON `null`.
    Absent,
    /// String, number or boolean, rendered as text.
    Scalar(String),
    /// Object, or an array wrapped as `{"results": [..]}`.
    Structured(Map<String, Value>),
}

impl FieldValue {
    pub fn from_json(v: Option<&Value>) -> Self {
        match v {
            None | Some(Value::Null) => FieldValue::Absent,
            Some(Value::String(s)) => FieldValue::Scalar(s.clone()),
            Some(Value::Number(n)) => FieldValue::Scalar(n.to_string()),
            Some(Value::Bool(b)) => FieldValue::Scalar(b.to_string()),
            Some(Value::Object(m)) => FieldValue::Structured(m.clone()),
            Some(Value::Array(a)) => {
                let mut m = Map::new();
                m.insert("results".to_string(), Value::Array(a.clone()));
                FieldValue::Structured(m)
            }
        }
    }

    /// Raw scalar text. Structured values yield the first scalar found under
    /// `code`, `externalCode`, `value` or `id`; deferred links yield `None`.
    pub fn scalar(&self) -> Option<String> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Scalar(s) => Some(s.clone()),
            FieldValue::Structured(m) => SCALAR_KEYS.iter().find_map(|k| {
                match FieldValue::from_json(m.get(*k)) {
                    FieldValue::Scalar(s) => Some(s),
                    _ => None,
                }
            }),
        }
    }

    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            FieldValue::Structured(m) => Some(m),
            _ => None,
        }
    }
}

/// Shape-tagged value of `name` in `row`.
pub fn field(row: &Row, name: &str) -> FieldValue {
    FieldValue::from_json(row.get(name))
}

/// Untrimmed scalar text of `name`, kept as-is for drilldown samples.
pub fn raw_text(row: &Row, name: &str) -> Option<String> {
    field(row, name).scalar()
}

/// Trimmed scalar text of `name`; blank values become `None`.
pub fn text(row: &Row, name: &str) -> Option<String> {
    raw_text(row, name).and_then(|s| non_blank(&s))
}

/// Trimmed copy of `s`, or `None` when it is empty after trimming.
pub fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Null or whitespace-only.
pub fn is_blank(v: Option<&str>) -> bool {
    v.map(|s| s.trim().is_empty()).unwrap_or(true)
}

/// Trimmed, lower-cased comparison form.
pub fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Tolerant boolean parse for flags that arrive as `true`, `"t"`, `1`, `"yes"`...
/// Unrecognised tokens are `None`.
pub fn truthy(v: Option<&str>) -> Option<bool> {
    let s = norm(v?);
    if TRUE_TOKENS.contains(&s.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&s.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Identity-source status (`User.status`) as an active flag.
pub fn identity_active_flag(v: Option<&str>) -> Option<bool> {
    let s = norm(v?);
    match s.as_str() {
        "active" | "a" => Some(true),
        "inactive" | "i" => Some(false),
        _ => truthy(Some(&s)),
    }
}

/// Elements of an OData collection value: `{"results": [..]}` or a bare array.
pub fn collection(v: Option<&Value>) -> Vec<&Map<String, Value>> {
    let arr = match v {
        Some(Value::Array(a)) => a,
        Some(Value::Object(m)) => match m.get("results") {
            Some(Value::Array(a)) => a,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    arr.iter().filter_map(Value::as_object).collect()
}
