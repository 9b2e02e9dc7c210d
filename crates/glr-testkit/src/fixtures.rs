//! Row builders shaped like SuccessFactors OData v2 payload entries.

use glr_odata::Row;
use serde_json::{json, Map, Value};

/// Object literal as a row; anything else becomes an empty row.
pub fn row(v: Value) -> Row {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// `User` row.
pub fn user(user_id: &str, status: &str, email: &str) -> Row {
    row(json!({
        "userId": user_id,
        "status": status,
        "email": email,
        "username": user_id.to_lowercase(),
    }))
}

/// `User` row from a tenant that does not expose `status`.
pub fn user_without_status(user_id: &str, email: Option<&str>) -> Row {
    row(json!({ "userId": user_id, "email": email }))
}

/// `EmpEmployment` row.
pub fn employment(user_id: &str, is_contingent_worker: Value) -> Row {
    row(json!({ "userId": user_id, "isContingentWorker": is_contingent_worker }))
}

/// Start an `EmpJob` row with a status code, a manager and a complete org
/// assignment.
pub fn job(user_id: &str, status_code: &str, manager_id: &str) -> JobBuilder {
    JobBuilder {
        row: row(json!({
            "userId": user_id,
            "managerId": manager_id,
            "company": "ACME",
            "businessUnit": "CORP",
            "division": "OPS",
            "department": "HR",
            "location": "NYC",
            "emplStatus": status_code,
            "effectiveLatestChange": true,
        })),
    }
}

#[derive(Debug, Clone)]
pub struct JobBuilder {
    row: Row,
}

impl JobBuilder {
    /// Set any property; `Value::Null` keeps the key with a null value.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.row.insert(key.to_string(), value);
        self
    }

    /// Drop a property entirely.
    pub fn without(mut self, key: &str) -> Self {
        self.row.remove(key);
        self
    }

    pub fn manager(self, manager_id: &str) -> Self {
        self.set("managerId", json!(manager_id))
    }

    /// Expanded `emplStatusNav` carrying a direct label.
    pub fn with_nav_label(self, label: &str) -> Self {
        let code = self.row.get("emplStatus").cloned().unwrap_or(Value::Null);
        self.set(
            "emplStatusNav",
            json!({ "id": code, "externalCode": code, "label_defaultValue": label }),
        )
    }

    /// Expanded `emplStatusNav` carrying only localized labels.
    pub fn with_localized_labels(self, labels: &[(&str, &str)]) -> Self {
        let code = self.row.get("emplStatus").cloned().unwrap_or(Value::Null);
        let results: Vec<Value> = labels
            .iter()
            .map(|(locale, label)| json!({ "locale": locale, "label": label }))
            .collect();
        self.set(
            "emplStatusNav",
            json!({ "id": code, "picklistLabels": { "results": results } }),
        )
    }

    pub fn build(self) -> Row {
        self.row
    }
}
