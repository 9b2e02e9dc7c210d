//! Employee reconciliation: one record per current job row, joined with
//! identity and employment evidence, with an active/inactive verdict and a
//! contingent verdict. Nothing here fails; ambiguity is resolved by the
//! cascades and recorded as provenance.

use std::collections::{BTreeMap, HashMap, HashSet};

use glr_odata::Row;
use glr_schemas::ORG_FIELDS;
use tracing::debug;

use crate::cascade::{first_match, Step};
use crate::fields::{identity_active_flag, norm, raw_text, text, truthy};
use crate::labels::{status_code, LabelResolution};
use crate::policy::GatePolicy;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Identity-source (`User`) evidence for one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    pub status: Option<String>,
    /// As received, untrimmed.
    pub email: Option<String>,
    pub username: Option<String>,
}

impl IdentityRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            status: text(row, "status"),
            email: raw_text(row, "email"),
            username: text(row, "username"),
        }
    }

    pub fn active_flag(&self) -> Option<bool> {
        identity_active_flag(self.status.as_deref())
    }
}

/// How an employee's active/inactive verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    pub active: bool,
    pub strategy: &'static str,
}

/// One reconciled employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub user_id: String,
    /// As received, so blank values stay visible in samples.
    pub manager_id: Option<String>,
    /// Org values in [`ORG_FIELDS`] order, as received.
    pub org: [Option<String>; 5],
    pub status_code: Option<String>,
    pub status_label: Option<String>,
    pub status: StatusDecision,
    pub identity: Option<IdentityRecord>,
    pub job_contingent_flag: Option<String>,
    pub employee_class: Option<String>,
    pub employee_type: Option<String>,
    pub employment_type: Option<String>,
    /// Strategy that marked this employee contingent; `None` when not contingent.
    pub contingent_by: Option<&'static str>,
}

impl EmployeeRecord {
    pub fn is_active(&self) -> bool {
        self.status.active
    }

    pub fn org_value(&self, field: &str) -> Option<&str> {
        ORG_FIELDS
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.org[i].as_deref())
    }
}

// ---------------------------------------------------------------------------
// Status cascade
// ---------------------------------------------------------------------------

pub const STATUS_LABEL: &str = "label";
pub const STATUS_INFERRED_CODE: &str = "inferred_code";
pub const STATUS_IDENTITY_FLAG: &str = "identity_flag";
pub const STATUS_ASSUMED_ACTIVE: &str = "assumed_active";

/// Per-employee inputs to the status cascade.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusEvidence<'a> {
    pub code: Option<&'a str>,
    pub label: Option<&'a str>,
    pub inferred_active_code: Option<&'a str>,
    pub identity_flag: Option<bool>,
}

/// Label, then inferred active code, then identity flag.
pub fn status_cascade<'a>() -> [Step<StatusEvidence<'a>, bool>; 3] {
    [
        Step {
            name: STATUS_LABEL,
            attempt: status_by_label,
        },
        Step {
            name: STATUS_INFERRED_CODE,
            attempt: status_by_inferred_code,
        },
        Step {
            name: STATUS_IDENTITY_FLAG,
            attempt: status_by_identity_flag,
        },
    ]
}

fn status_by_label(e: &StatusEvidence<'_>) -> Option<bool> {
    e.code?;
    e.label.map(|l| norm(l) == "active")
}

fn status_by_inferred_code(e: &StatusEvidence<'_>) -> Option<bool> {
    let code = e.code?;
    e.inferred_active_code.map(|active| code == active)
}

fn status_by_identity_flag(e: &StatusEvidence<'_>) -> Option<bool> {
    if e.code.is_some() {
        return None;
    }
    e.identity_flag
}

/// Run the status cascade; an employee no step can decide is assumed active.
pub fn decide_status(e: &StatusEvidence<'_>) -> StatusDecision {
    match first_match(&status_cascade(), e) {
        Some((strategy, active)) => StatusDecision { active, strategy },
        None => StatusDecision {
            active: true,
            strategy: STATUS_ASSUMED_ACTIVE,
        },
    }
}

/// Where the active sentinel code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceBasis {
    /// Mode among employees the identity source flags active.
    IdentityActive,
    /// Mode over every employee with a code.
    AllCodes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredActiveCode {
    pub code: String,
    pub basis: InferenceBasis,
}

/// Infer the code that means "active" from `(code, identity flag)` pairs.
pub fn infer_active_code<'a, I>(pairs: I) -> Option<InferredActiveCode>
where
    I: IntoIterator<Item = (Option<&'a str>, Option<bool>)>,
{
    let mut correlated: BTreeMap<&str, usize> = BTreeMap::new();
    let mut all: BTreeMap<&str, usize> = BTreeMap::new();
    for (code, flag) in pairs {
        let Some(code) = code else { continue };
        *all.entry(code).or_insert(0) += 1;
        if flag == Some(true) {
            *correlated.entry(code).or_insert(0) += 1;
        }
    }

    if let Some(code) = mode(&correlated) {
        return Some(InferredActiveCode {
            code: code.to_string(),
            basis: InferenceBasis::IdentityActive,
        });
    }
    mode(&all).map(|code| InferredActiveCode {
        code: code.to_string(),
        basis: InferenceBasis::AllCodes,
    })
}

/// Most frequent key; ties go to the smallest key.
fn mode<'a>(counts: &BTreeMap<&'a str, usize>) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for (k, n) in counts {
        if best.map(|(_, b)| *n > b).unwrap_or(true) {
            best = Some((*k, *n));
        }
    }
    best.map(|(k, _)| k)
}

// ---------------------------------------------------------------------------
// Contingent cascade
// ---------------------------------------------------------------------------

pub const CONTINGENT_EMPLOYMENT_FLAG: &str = "employment_flag";
pub const CONTINGENT_JOB_FLAG: &str = "job_flag";
pub const CONTINGENT_JOB_CLASSIFICATION: &str = "job_classification";

#[derive(Debug, Clone, Copy)]
pub struct ContingentEvidence<'a> {
    pub employment_flag: Option<bool>,
    pub job_flag: Option<bool>,
    /// `employeeClass`, `employeeType`, `employmentType`.
    pub classifications: [Option<&'a str>; 3],
    pub policy: &'a GatePolicy,
}

pub fn contingent_cascade<'a>() -> [Step<ContingentEvidence<'a>, bool>; 3] {
    [
        Step {
            name: CONTINGENT_EMPLOYMENT_FLAG,
            attempt: contingent_by_employment_flag,
        },
        Step {
            name: CONTINGENT_JOB_FLAG,
            attempt: contingent_by_job_flag,
        },
        Step {
            name: CONTINGENT_JOB_CLASSIFICATION,
            attempt: contingent_by_classification,
        },
    ]
}

fn contingent_by_employment_flag(e: &ContingentEvidence<'_>) -> Option<bool> {
    e.employment_flag
}

fn contingent_by_job_flag(e: &ContingentEvidence<'_>) -> Option<bool> {
    e.job_flag
}

fn contingent_by_classification(e: &ContingentEvidence<'_>) -> Option<bool> {
    let present: Vec<&str> = e.classifications.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().any(|v| e.policy.is_contingent_keyword(v)))
}

/// Contingent verdict and deciding strategy; `(false, None)` when nothing applies.
pub fn decide_contingent(e: &ContingentEvidence<'_>) -> (bool, Option<&'static str>) {
    match first_match(&contingent_cascade(), e) {
        Some((name, is)) => (is, Some(name)),
        None => (false, None),
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Everything the gates and provenance need from classification.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// One per distinct job `userId`, in acquisition order.
    pub employees: Vec<EmployeeRecord>,
    pub duplicate_job_rows: usize,
    pub jobs_without_user_id: usize,
    pub inferred_active_code: Option<InferredActiveCode>,
    pub status_strategy_counts: BTreeMap<String, usize>,
    pub contingent_strategy_counts: BTreeMap<String, usize>,
    pub emplstatus_value_counts: BTreeMap<String, usize>,
    pub unknown_status_user_count: usize,
}

impl Classification {
    pub fn active(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.employees.iter().filter(|e| e.is_active())
    }

    pub fn inactive(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.employees.iter().filter(|e| !e.is_active())
    }

    pub fn contingent(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.employees.iter().filter(|e| e.contingent_by.is_some())
    }

    /// Provenance for the status verdicts, e.g.
    /// `EmpJob.emplStatus label (2) -> User.status (1)`.
    pub fn status_source(&self) -> String {
        let n = |k: &str| self.status_strategy_counts.get(k).copied().unwrap_or(0);
        let mut parts = Vec::new();
        if n(STATUS_LABEL) > 0 {
            parts.push(format!("EmpJob.emplStatus label ({})", n(STATUS_LABEL)));
        }
        if n(STATUS_INFERRED_CODE) > 0 {
            let how = match &self.inferred_active_code {
                Some(InferredActiveCode {
                    code,
                    basis: InferenceBasis::IdentityActive,
                }) => format!("active code '{code}' inferred from User.status"),
                Some(InferredActiveCode {
                    code,
                    basis: InferenceBasis::AllCodes,
                }) => format!("active code '{code}' inferred as most frequent"),
                None => "inferred".to_string(),
            };
            parts.push(format!("EmpJob.emplStatus {how} ({})", n(STATUS_INFERRED_CODE)));
        }
        if n(STATUS_IDENTITY_FLAG) > 0 {
            parts.push(format!("User.status ({})", n(STATUS_IDENTITY_FLAG)));
        }
        if n(STATUS_ASSUMED_ACTIVE) > 0 {
            parts.push(format!("assumed active ({})", n(STATUS_ASSUMED_ACTIVE)));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" -> ")
        }
    }
}

/// Reconcile job, identity and employment rows into employee records.
///
/// `employments` is `None` when that entity could not be fetched.
/// Duplicate job rows for a `userId` keep the first row seen.
pub fn classify(
    jobs: &[Row],
    users: &[Row],
    employments: Option<&[Row]>,
    labels: &LabelResolution,
    policy: &GatePolicy,
) -> Classification {
    let mut identities: HashMap<String, IdentityRecord> = HashMap::new();
    for row in users {
        if let Some(uid) = text(row, "userId") {
            identities.entry(uid).or_insert_with(|| IdentityRecord::from_row(row));
        }
    }

    let mut employment_flags: HashMap<String, bool> = HashMap::new();
    for row in employments.unwrap_or(&[]) {
        let Some(uid) = text(row, "userId") else { continue };
        if let Some(flag) = truthy(raw_text(row, "isContingentWorker").as_deref()) {
            employment_flags.entry(uid).or_insert(flag);
        }
    }

    let mut out = Classification::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current: Vec<&Row> = Vec::new();
    for row in jobs {
        let Some(uid) = text(row, "userId") else {
            out.jobs_without_user_id += 1;
            continue;
        };
        if !seen.insert(uid) {
            out.duplicate_job_rows += 1;
            continue;
        }
        current.push(row);
    }

    let codes: Vec<(String, Option<String>)> = current
        .iter()
        .map(|row| (text(row, "userId").unwrap_or_default(), status_code(row)))
        .collect();

    for (_, code) in &codes {
        if let Some(c) = code {
            *out.emplstatus_value_counts.entry(c.clone()).or_insert(0) += 1;
        }
    }

    out.inferred_active_code = infer_active_code(codes.iter().map(|(uid, code)| {
        let flag = identities.get(uid).and_then(IdentityRecord::active_flag);
        (code.as_deref(), flag)
    }));

    for (row, (uid, code)) in current.iter().zip(codes.iter()) {
        let identity = identities.get(uid).cloned();
        let identity_flag = identity.as_ref().and_then(IdentityRecord::active_flag);
        let label = code.as_deref().and_then(|c| labels.label_for(c));

        let status = decide_status(&StatusEvidence {
            code: code.as_deref(),
            label,
            inferred_active_code: out.inferred_active_code.as_ref().map(|i| i.code.as_str()),
            identity_flag,
        });
        *out.status_strategy_counts.entry(status.strategy.to_string()).or_insert(0) += 1;
        if status.strategy == STATUS_ASSUMED_ACTIVE {
            out.unknown_status_user_count += 1;
        }

        let job_contingent_flag = raw_text(row, "isContingentWorker");
        let employee_class = text(row, "employeeClass");
        let employee_type = text(row, "employeeType");
        let employment_type = text(row, "employmentType");

        let (is_contingent, by) = decide_contingent(&ContingentEvidence {
            employment_flag: employment_flags.get(uid).copied(),
            job_flag: truthy(job_contingent_flag.as_deref()),
            classifications: [
                employee_class.as_deref(),
                employee_type.as_deref(),
                employment_type.as_deref(),
            ],
            policy,
        });
        if is_contingent {
            if let Some(name) = by {
                *out.contingent_strategy_counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }

        out.employees.push(EmployeeRecord {
            user_id: uid.clone(),
            manager_id: raw_text(row, "managerId"),
            org: ORG_FIELDS.map(|f| raw_text(row, f)),
            status_code: code.clone(),
            status_label: label.map(str::to_string),
            status,
            identity,
            job_contingent_flag,
            employee_class,
            employee_type,
            employment_type,
            contingent_by: if is_contingent { by } else { None },
        });
    }

    debug!(
        employees = out.employees.len(),
        duplicate_job_rows = out.duplicate_job_rows,
        unknown_status = out.unknown_status_user_count,
        "classification finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(v: Value) -> Vec<Row> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect()
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelResolution {
        LabelResolution {
            labels: pairs.iter().map(|(c, l)| (c.to_string(), l.to_string())).collect(),
            hits: BTreeMap::new(),
        }
    }

    #[test]
    fn label_is_authoritative_over_code_and_flag() {
        for code in ["A", "T", "36541", "x"] {
            let d = decide_status(&StatusEvidence {
                code: Some(code),
                label: Some(" ACTIVE "),
                inferred_active_code: Some("zzz"),
                identity_flag: Some(false),
            });
            assert_eq!(d, StatusDecision { active: true, strategy: STATUS_LABEL }, "{code}");
        }
        let d = decide_status(&StatusEvidence {
            code: Some("A"),
            label: Some("Active - Leave"),
            inferred_active_code: Some("A"),
            identity_flag: Some(true),
        });
        assert!(!d.active);
        assert_eq!(d.strategy, STATUS_LABEL);
    }

    #[test]
    fn unlabeled_code_uses_inferred_sentinel() {
        let base = StatusEvidence {
            code: Some("36541"),
            label: None,
            inferred_active_code: Some("36541"),
            identity_flag: Some(false),
        };
        assert_eq!(decide_status(&base), StatusDecision { active: true, strategy: STATUS_INFERRED_CODE });
        let other = StatusEvidence { code: Some("36542"), ..base };
        assert!(!decide_status(&other).active);
    }

    #[test]
    fn no_code_falls_to_identity_then_assumed_active() {
        let e = StatusEvidence {
            identity_flag: Some(false),
            inferred_active_code: Some("A"),
            ..Default::default()
        };
        assert_eq!(decide_status(&e), StatusDecision { active: false, strategy: STATUS_IDENTITY_FLAG });

        let e = StatusEvidence::default();
        assert_eq!(decide_status(&e), StatusDecision { active: true, strategy: STATUS_ASSUMED_ACTIVE });
    }

    #[test]
    fn inference_prefers_identity_correlation_and_breaks_ties_low() {
        let inferred = infer_active_code(vec![
            (Some("B"), Some(true)),
            (Some("A"), Some(true)),
            (Some("T"), Some(false)),
            (Some("T"), Some(false)),
            (Some("T"), None),
        ])
        .unwrap();
        assert_eq!(inferred.code, "A");
        assert_eq!(inferred.basis, InferenceBasis::IdentityActive);

        let inferred = infer_active_code(vec![(Some("T"), None), (Some("A"), None), (Some("T"), Some(false))]).unwrap();
        assert_eq!(inferred.code, "T");
        assert_eq!(inferred.basis, InferenceBasis::AllCodes);

        assert!(infer_active_code(vec![(None, Some(true))]).is_none());
    }

    #[test]
    fn classification_heuristic_inspects_every_field() {
        let p = GatePolicy::default();
        let e = ContingentEvidence {
            employment_flag: None,
            job_flag: None,
            classifications: [Some("Regular"), None, Some("Contract")],
            policy: &p,
        };
        assert_eq!(decide_contingent(&e), (true, Some(CONTINGENT_JOB_CLASSIFICATION)));

        let e = ContingentEvidence {
            classifications: [Some("Regular"), None, None],
            ..e
        };
        assert_eq!(decide_contingent(&e), (false, Some(CONTINGENT_JOB_CLASSIFICATION)));

        let e = ContingentEvidence {
            classifications: [None, None, None],
            ..e
        };
        assert_eq!(decide_contingent(&e), (false, None));
    }

    #[test]
    fn employment_flag_outranks_job_evidence() {
        let p = GatePolicy::default();
        let e = ContingentEvidence {
            employment_flag: Some(false),
            job_flag: Some(true),
            classifications: [Some("Contractor"), None, None],
            policy: &p,
        };
        assert_eq!(decide_contingent(&e), (false, Some(CONTINGENT_EMPLOYMENT_FLAG)));
    }

    #[test]
    fn every_job_user_is_classified_exactly_once() {
        let jobs = rows(json!([
            {"userId": "U1", "emplStatus": "A"},
            {"userId": "U2", "emplStatus": "T"},
            {"userId": "U1", "emplStatus": "T"},
            {"userId": "U3"},
            {"userId": "U4", "emplStatus": "Q"},
            {"emplStatus": "A"}
        ]));
        let users = rows(json!([
            {"userId": "U1", "status": "t"},
            {"userId": "U3", "status": "weird"}
        ]));
        let c = classify(&jobs, &users, None, &labels(&[("A", "Active"), ("T", "Terminated")]), &GatePolicy::default());

        assert_eq!(c.employees.len(), 4);
        assert_eq!(c.duplicate_job_rows, 1);
        assert_eq!(c.jobs_without_user_id, 1);
        assert_eq!(c.active().count() + c.inactive().count(), c.employees.len());

        let u1 = &c.employees[0];
        assert_eq!(u1.status_code.as_deref(), Some("A"));
        assert!(u1.is_active());

        // U3: no code, unrecognised flag.
        assert_eq!(c.employees[2].status.strategy, STATUS_ASSUMED_ACTIVE);
        assert_eq!(c.unknown_status_user_count, 1);

        // U4: code missing from a partial label map; the sentinel is "A".
        assert_eq!(c.inferred_active_code.as_ref().map(|i| i.code.as_str()), Some("A"));
        assert_eq!(c.employees[3].status.strategy, STATUS_INFERRED_CODE);
        assert!(!c.employees[3].is_active());

        assert_eq!(c.emplstatus_value_counts.get("A"), Some(&1));
        assert_eq!(c.status_strategy_counts.values().sum::<usize>(), 4);
        assert!(c.status_source().contains("EmpJob.emplStatus label (2)"));
    }

    #[test]
    fn contingent_counts_cover_inactive_employees_too() {
        let jobs = rows(json!([
            {"userId": "U1", "emplStatus": "T", "employeeClass": "Contractor"},
            {"userId": "U2", "emplStatus": "A", "isContingentWorker": true}
        ]));
        let employments = rows(json!([{"userId": "U2", "isContingentWorker": "false"}]));
        let c = classify(
            &jobs,
            &[],
            Some(&employments),
            &labels(&[("A", "Active"), ("T", "Terminated")]),
            &GatePolicy::default(),
        );
        let contingent: Vec<&str> = c.contingent().map(|e| e.user_id.as_str()).collect();
        assert_eq!(contingent, vec!["U1"]);
        assert_eq!(c.contingent_strategy_counts.get(CONTINGENT_JOB_CLASSIFICATION), Some(&1));
    }
}
