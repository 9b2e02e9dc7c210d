//! glr-gates
//!
//! Go-live readiness core: acquire identity, job and employment evidence
//! through a [`Directory`], reconcile it into one record per employee, run
//! the data-quality gates and fold everything into a [`GateResult`].
//!
//! A run is a pure function of `(directory, scope, policy)`. It either
//! returns a complete result or a [`RunFailed`]; there is no partial result.

pub mod acquisition;
pub mod cascade;
pub mod checks;
pub mod classify;
pub mod error;
pub mod fields;
pub mod labels;
pub mod policy;
pub mod score;

pub use error::RunFailed;
pub use policy::GatePolicy;

use chrono::{DateTime, Utc};
use glr_odata::{normalize_base_url, Directory};
use glr_schemas::{ContingentWorkerEntry, GateResult, InactiveUserEntry};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use acquisition::{acquire, employments_plan, jobs_plan, job_attempt_has_contingent_fields, users_plan};
use classify::{classify, Classification};
use labels::display_status;
use score::{pct, risk_score, round2, RiskInputs};

/// Tenant identifiers carried through to the result unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeIds {
    pub instance_url: String,
    pub api_base_url: String,
    pub company_id: String,
}

impl ScopeIds {
    /// Key snapshots are stored under: the normalized instance URL.
    pub fn scope_key(&self) -> String {
        normalize_base_url(&self.instance_url)
    }
}

/// Run every readiness gate for one tenant.
pub async fn run_ec_gates(
    dir: &dyn Directory,
    scope: &ScopeIds,
    policy: &GatePolicy,
) -> Result<GateResult, RunFailed> {
    run_ec_gates_at(dir, scope, policy, Utc::now()).await
}

/// [`run_ec_gates`] with an explicit snapshot time.
pub async fn run_ec_gates_at(
    dir: &dyn Directory,
    scope: &ScopeIds,
    policy: &GatePolicy,
    now: DateTime<Utc>,
) -> Result<GateResult, RunFailed> {
    info!(
        source = dir.source_name(),
        instance_url = %scope.instance_url,
        company_id = %scope.company_id,
        "readiness run started"
    );

    let users_plan = users_plan();
    let jobs_plan = jobs_plan();
    let employments_plan = employments_plan();

    let users = acquire(dir, &users_plan).await?;
    let jobs = acquire(dir, &jobs_plan).await?;
    let (employments, employment_error) = match acquire(dir, &employments_plan).await {
        Ok(a) => (Some(a), String::new()),
        Err(e) => {
            warn!(error = %e, "employment evidence unavailable; contingent figures fall back to job fields");
            (None, e.to_string())
        }
    };

    let labels = labels::resolve_labels(dir, &jobs.rows, policy).await;
    let cls = classify(
        &jobs.rows,
        &users.rows,
        employments.as_ref().map(|a| a.rows.as_slice()),
        &labels,
        policy,
    );

    let manager = checks::check_managers(cls.active(), policy);
    let org = checks::check_org(cls.active(), policy);
    let email = checks::check_emails(cls.active(), policy);

    let active_users = cls.active().count();
    let inactive_users = cls.inactive().count();
    let risk = RiskInputs {
        active: active_users,
        missing_manager: manager.missing,
        invalid_org: org.invalid,
        missing_email: email.missing,
        duplicate_email: email.duplicates,
    };

    let job_has_contingent_fields = job_attempt_has_contingent_fields(&jobs.attempt.query);
    let contingent_available = employments.is_some() || job_has_contingent_fields;
    let contingent_workers = if contingent_available {
        cls.contingent().count()
    } else {
        0
    };

    let result = GateResult {
        snapshot_time_utc: now,

        instance_url: scope.instance_url.clone(),
        api_base_url: scope.api_base_url.clone(),
        company_id: scope.company_id.clone(),

        active_users,
        inactive_users,
        inactive_user_count: inactive_users,

        empjob_rows: jobs.rows.len(),
        current_empjob_rows: jobs.rows.len(),
        duplicate_job_rows: cls.duplicate_job_rows,

        missing_manager_count: manager.missing,
        missing_manager_pct: round2(pct(manager.missing, active_users)),
        invalid_org_count: org.invalid,
        invalid_org_pct: round2(pct(org.invalid, active_users)),
        missing_email_count: email.missing,
        missing_email_pct: round2(pct(email.missing, active_users)),
        duplicate_email_count: email.duplicates,
        dup_email_pct: round2(pct(email.duplicates, active_users)),

        contingent_workers,
        contingent_worker_count: contingent_workers,

        risk_score: risk_score(&risk),

        missing_manager_sample: manager.sample,
        invalid_org_sample: org.sample,
        org_missing_field_counts: org.per_field,
        missing_email_sample: email.missing_sample,
        duplicate_email_sample: email.duplicate_sample,
        inactive_users_sample: inactive_sample(&cls, policy),
        contingent_workers_sample: if contingent_available {
            contingent_sample(&cls, policy)
        } else {
            Vec::new()
        },

        employee_status_source: cls.status_source(),
        label_source: labels.source(),
        contingent_source: contingent_source(employments.is_some(), job_has_contingent_fields),
        users_select_used: users.describe(users_plan.entity),
        empjob_select_used: jobs.describe(jobs_plan.entity),
        empemployment_select_used: employments
            .as_ref()
            .map(|a| a.describe(employments_plan.entity))
            .unwrap_or_default(),
        empemployment_available: employments.is_some(),
        empemployment_error: employment_error,
        emplstatus_value_counts: cls.emplstatus_value_counts.clone(),
        status_label_map: labels.labels.clone(),
        status_strategy_counts: cls.status_strategy_counts.clone(),
        unknown_status_user_count: cls.unknown_status_user_count,
    };

    info!(
        active = result.active_users,
        inactive = result.inactive_users,
        risk_score = result.risk_score,
        "readiness run finished"
    );
    Ok(result)
}

fn inactive_sample(cls: &Classification, policy: &GatePolicy) -> Vec<InactiveUserEntry> {
    cls.inactive()
        .take(policy.sample_cap())
        .map(|e| {
            let identity = e.identity.clone().unwrap_or_default();
            InactiveUserEntry {
                user_id: e.user_id.clone(),
                empl_status: display_status(e.status_code.as_deref(), e.status_label.as_deref()),
                status: identity.status,
                email: identity.email,
                username: identity.username,
            }
        })
        .collect()
}

fn contingent_sample(cls: &Classification, policy: &GatePolicy) -> Vec<ContingentWorkerEntry> {
    cls.contingent()
        .take(policy.sample_cap())
        .map(|e| ContingentWorkerEntry {
            user_id: e.user_id.clone(),
            source: e.contingent_by.unwrap_or_default().to_string(),
            is_contingent_worker: e.job_contingent_flag.clone(),
            employee_class: e.employee_class.clone(),
            employee_type: e.employee_type.clone(),
            employment_type: e.employment_type.clone(),
        })
        .collect()
}

fn contingent_source(employments_available: bool, job_has_contingent_fields: bool) -> String {
    match (employments_available, job_has_contingent_fields) {
        (true, _) => {
            "EmpEmployment.isContingentWorker -> fallback(EmpJob.isContingentWorker/employeeClass/employeeType/employmentType)"
                .to_string()
        }
        (false, true) => {
            "EmpJob.isContingentWorker/employeeClass/employeeType/employmentType (best-effort heuristic; EmpEmployment unavailable)"
                .to_string()
        }
        (false, false) => {
            "not available (EmpEmployment unavailable; EmpJob attempt carries no contingent fields)".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glr_odata::{EntityQuery, FetchError};
    use glr_testkit::{job, row, user, FakeDirectory};
    use serde_json::json;

    fn scope() -> ScopeIds {
        ScopeIds {
            instance_url: "https://tenant.example.com/".to_string(),
            api_base_url: "https://api.example.com".to_string(),
            company_id: "ACME".to_string(),
        }
    }

    #[test]
    fn scope_key_is_normalized_instance_url() {
        assert_eq!(scope().scope_key(), "https://tenant.example.com");
    }

    #[test]
    fn contingent_source_marks_each_fallback() {
        assert!(contingent_source(true, false).starts_with("EmpEmployment"));
        assert!(contingent_source(false, true).contains("heuristic"));
        assert!(contingent_source(false, false).starts_with("not available"));
    }

    #[tokio::test]
    async fn label_priority_holds_whatever_the_code() {
        for code in ["A", "36541", "T"] {
            let dir = FakeDirectory::new()
                .with_rows("User", vec![user("U1", "inactive", "u1@x.com")])
                .with_rows(
                    "EmpJob",
                    vec![job("U1", code, "M1").with_nav_label("Active").build()],
                )
                .fail_entity(
                    "EmpEmployment",
                    FetchError::Http {
                        entity: "EmpEmployment".to_string(),
                        status: 500,
                        message: "boom".to_string(),
                    },
                );
            let r = run_ec_gates(&dir, &scope(), &GatePolicy::default()).await.unwrap();
            assert_eq!((r.active_users, r.inactive_users), (1, 0), "code {code}");
            assert_eq!(r.status_strategy_counts.get("label"), Some(&1));
        }
    }

    #[tokio::test]
    async fn picklist_lookup_labels_codes_without_navigation() {
        let dir = FakeDirectory::new()
            .with_rows(
                "User",
                vec![user("U1", "active", "u1@x.com"), user("U2", "active", "u2@x.com")],
            )
            .with_rows(
                "EmpJob",
                vec![job("U1", "36541", "M1").build(), job("U2", "36542", "M1").build()],
            )
            .with_rows(
                "PicklistOption",
                vec![
                    row(json!({"id": 36541, "externalCode": "A", "localeLabel": "Active"})),
                    row(json!({"id": "36542", "externalCode": "T",
                               "picklistLabels": {"results": [{"locale": "en_US", "label": "Terminated"}]}})),
                ],
            );

        let r = run_ec_gates(&dir, &scope(), &GatePolicy::default()).await.unwrap();
        assert_eq!(r.status_label_map.get("36541").map(String::as_str), Some("Active"));
        assert_eq!(r.status_label_map.get("36542").map(String::as_str), Some("Terminated"));
        assert_eq!((r.active_users, r.inactive_users), (1, 1));
        assert_eq!(r.inactive_users_sample[0].empl_status, "Terminated (36542)");
        assert!(r.label_source.contains("PicklistOption.picklist_lookup:id"));

        let lookups: Vec<EntityQuery> = dir.queries_for("PicklistOption");
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].filter.as_deref(), Some("id eq 36541 or id eq 36542"));
    }

    #[tokio::test]
    async fn rejected_numeric_lookup_falls_through_to_next_encoding() {
        let dir = FakeDirectory::new()
            .with_rows("User", vec![user("U1", "active", "u1@x.com")])
            .with_rows("EmpJob", vec![job("U1", "101", "M1").build()])
            .reject_when("PicklistOption", |q| q.filter.as_deref() == Some("id eq 101"))
            .with_rows(
                "PicklistOption",
                vec![row(json!({"id": "101", "localeLabel": "Leave of Absence"}))],
            );

        let r = run_ec_gates(&dir, &scope(), &GatePolicy::default()).await.unwrap();
        assert_eq!(r.status_label_map.get("101").map(String::as_str), Some("Leave of Absence"));
        assert_eq!(r.inactive_users, 1);
        assert!(r.label_source.contains("picklist_lookup:id_int64"));
    }

    #[tokio::test]
    async fn failed_label_lookup_is_not_fatal() {
        let dir = FakeDirectory::new()
            .with_rows(
                "User",
                vec![
                    user("U1", "active", "u1@x.com"),
                    user("U2", "active", "u2@x.com"),
                    user("U3", "inactive", "u3@x.com"),
                ],
            )
            .with_rows(
                "EmpJob",
                vec![
                    job("U1", "A", "M1").build(),
                    job("U2", "A", "M1").build(),
                    job("U3", "T", "M1").build(),
                ],
            )
            .fail_entity(
                "PicklistOption",
                FetchError::Auth {
                    entity: "PicklistOption".to_string(),
                    status: 403,
                    message: "forbidden".to_string(),
                },
            );

        let r = run_ec_gates(&dir, &scope(), &GatePolicy::default()).await.unwrap();
        assert!(r.status_label_map.is_empty());
        assert!(r.label_source.starts_with("none"));
        assert_eq!((r.active_users, r.inactive_users), (2, 1));
        assert_eq!(r.status_strategy_counts.get("inferred_code"), Some(&3));
        assert!(r.employee_status_source.contains("active code 'A' inferred from User.status"));
    }
}
