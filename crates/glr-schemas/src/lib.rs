//! Wire types for a go-live readiness snapshot.
//!
//! Everything here is `Serialize + Deserialize` and carries no logic beyond
//! small accessors. Field names are the keys dashboards and stored snapshots
//! read, so renames here are breaking changes for persisted data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organisational fields checked by the org-completeness gate, in report order.
pub const ORG_FIELDS: [&str; 5] = ["company", "businessUnit", "division", "department", "location"];

// ---------------------------------------------------------------------------
// Drilldown sample entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingManagerEntry {
    pub user_id: String,
    pub manager_id: Option<String>,
}

/// One employee with at least one blank org field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidOrgEntry {
    pub user_id: String,
    /// Comma-joined list of the blank fields, e.g. `"division, department"`.
    pub missing_fields: String,
    pub company: Option<String>,
    pub business_unit: Option<String>,
    pub division: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub manager_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingEmailEntry {
    pub user_id: String,
    /// Raw value as received (trimmed), so placeholder tokens stay visible.
    pub email: String,
    pub username: Option<String>,
}

/// One normalized email shared by more than one active employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateEmailEntry {
    pub email: String,
    /// Full group size (not capped).
    pub count: usize,
    /// Member ids, capped for payload size.
    pub sample_user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveUserEntry {
    pub user_id: String,
    /// Display form of the job status: `"{label} ({code})"`, one of them, or a placeholder.
    pub empl_status: String,
    /// Identity-source status value as received.
    pub status: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContingentWorkerEntry {
    pub user_id: String,
    /// Which contingent strategy produced the verdict.
    pub source: String,
    pub is_contingent_worker: Option<String>,
    pub employee_class: Option<String>,
    pub employee_type: Option<String>,
    pub employment_type: Option<String>,
}

/// Per-field blank tallies. Fields are not mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgMissingFieldCounts {
    pub company: usize,
    pub business_unit: usize,
    pub division: usize,
    pub department: usize,
    pub location: usize,
}

impl OrgMissingFieldCounts {
    /// Increment the tally for one of [`ORG_FIELDS`]. Unknown names are ignored.
    pub fn bump(&mut self, field: &str) {
        if let Some(slot) = self.slot_mut(field) {
            *slot += 1;
        }
    }

    pub fn get(&self, field: &str) -> Option<usize> {
        match field {
            "company" => Some(self.company),
            "businessUnit" => Some(self.business_unit),
            "division" => Some(self.division),
            "department" => Some(self.department),
            "location" => Some(self.location),
            _ => None,
        }
    }

    fn slot_mut(&mut self, field: &str) -> Option<&mut usize> {
        match field {
            "company" => Some(&mut self.company),
            "businessUnit" => Some(&mut self.business_unit),
            "division" => Some(&mut self.division),
            "department" => Some(&mut self.department),
            "location" => Some(&mut self.location),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

/// The single record produced by one readiness run.
///
/// Alias fields (`inactive_user_count`, `current_empjob_rows`,
/// `contingent_worker_count`) duplicate their primaries for older readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub snapshot_time_utc: DateTime<Utc>,

    // scope (opaque pass-through)
    pub instance_url: String,
    pub api_base_url: String,
    pub company_id: String,

    // workforce
    pub active_users: usize,
    pub inactive_users: usize,
    pub inactive_user_count: usize,

    // job rows
    pub empjob_rows: usize,
    pub current_empjob_rows: usize,
    pub duplicate_job_rows: usize,

    // checks
    pub missing_manager_count: usize,
    pub missing_manager_pct: f64,
    pub invalid_org_count: usize,
    pub invalid_org_pct: f64,
    pub missing_email_count: usize,
    pub missing_email_pct: f64,
    pub duplicate_email_count: usize,
    pub dup_email_pct: f64,

    pub contingent_workers: usize,
    pub contingent_worker_count: usize,

    pub risk_score: u32,

    // samples
    pub missing_manager_sample: Vec<MissingManagerEntry>,
    pub invalid_org_sample: Vec<InvalidOrgEntry>,
    pub org_missing_field_counts: OrgMissingFieldCounts,
    pub missing_email_sample: Vec<MissingEmailEntry>,
    pub duplicate_email_sample: Vec<DuplicateEmailEntry>,
    pub inactive_users_sample: Vec<InactiveUserEntry>,
    pub contingent_workers_sample: Vec<ContingentWorkerEntry>,

    // provenance / explainability
    pub employee_status_source: String,
    pub label_source: String,
    pub contingent_source: String,
    pub users_select_used: String,
    pub empjob_select_used: String,
    pub empemployment_select_used: String,
    pub empemployment_available: bool,
    pub empemployment_error: String,
    pub emplstatus_value_counts: BTreeMap<String, usize>,
    pub status_label_map: BTreeMap<String, String>,
    pub status_strategy_counts: BTreeMap<String, usize>,
    pub unknown_status_user_count: usize,
}
