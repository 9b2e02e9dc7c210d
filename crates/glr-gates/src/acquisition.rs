//! Field-selection fallback per entity.
//!
//! Tenants differ in which properties and navigations they expose. Each
//! entity gets an ordered list of attempts, richest first; a query rejection
//! moves to the next attempt, any other failure stops immediately.

use glr_odata::{Directory, EntityQuery, FetchError, Row};
use tracing::{debug, info, warn};

use crate::error::RunFailed;

pub const USERS_ENTITY: &str = "User";
pub const JOBS_ENTITY: &str = "EmpJob";
pub const EMPLOYMENTS_ENTITY: &str = "EmpEmployment";

const CURRENT_JOB_FILTER: &str = "effectiveLatestChange eq true";

const JOB_RICH_FIELDS: [&str; 13] = [
    "userId",
    "managerId",
    "company",
    "businessUnit",
    "division",
    "department",
    "location",
    "emplStatus",
    "effectiveLatestChange",
    "employeeClass",
    "employeeType",
    "employmentType",
    "isContingentWorker",
];

const JOB_STATUS_NAV_FIELDS: [&str; 7] = [
    "emplStatusNav/id",
    "emplStatusNav/externalCode",
    "emplStatusNav/label_defaultValue",
    "emplStatusNav/label_en_US",
    "emplStatusNav/localeLabel",
    "emplStatusNav/picklistLabels/locale",
    "emplStatusNav/picklistLabels/label",
];

/// Job fields that can mark a contingent worker.
pub const JOB_CONTINGENT_FIELDS: [&str; 4] =
    ["isContingentWorker", "employeeClass", "employeeType", "employmentType"];

/// One named field selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub name: &'static str,
    pub query: EntityQuery,
}

impl Attempt {
    fn new(name: &'static str, query: EntityQuery) -> Self {
        Self { name, query }
    }

    /// Provenance form, e.g. `EmpJob[minimal] $select=...`.
    pub fn describe(&self, entity: &str) -> String {
        format!("{entity}[{}] {}", self.name, self.query)
    }
}

/// Ordered attempts for one entity plus whether the run depends on it.
#[derive(Debug, Clone)]
pub struct AcquisitionPlan {
    pub entity: &'static str,
    pub required: bool,
    pub attempts: Vec<Attempt>,
}

pub fn users_plan() -> AcquisitionPlan {
    AcquisitionPlan {
        entity: USERS_ENTITY,
        required: true,
        attempts: vec![
            Attempt::new("full", EntityQuery::select(&["userId", "status", "email", "username"])),
            Attempt::new("no_username", EntityQuery::select(&["userId", "status", "email"])),
            Attempt::new("minimal", EntityQuery::select(&["userId", "email"])),
        ],
    }
}

pub fn jobs_plan() -> AcquisitionPlan {
    let rich: Vec<&str> = JOB_RICH_FIELDS.to_vec();
    let with_nav: Vec<&str> = rich.iter().chain(JOB_STATUS_NAV_FIELDS.iter()).copied().collect();
    let without = |drop: &[&str]| -> Vec<&str> {
        rich.iter().copied().filter(|f| !drop.contains(f)).collect()
    };

    let no_flag = without(&["isContingentWorker"]);
    let no_types = without(&["isContingentWorker", "employeeType", "employmentType"]);
    let no_status = without(&["emplStatus"]);
    let minimal = [
        "userId",
        "managerId",
        "company",
        "businessUnit",
        "division",
        "department",
        "location",
        "effectiveLatestChange",
    ];

    let q = |fields: &[&str]| EntityQuery::select(fields).with_filter(CURRENT_JOB_FILTER);

    AcquisitionPlan {
        entity: JOBS_ENTITY,
        required: true,
        attempts: vec![
            Attempt::new(
                "rich_localized_labels",
                q(&with_nav).with_expand(&["emplStatusNav", "emplStatusNav/picklistLabels"]),
            ),
            Attempt::new("rich_status_nav", q(&with_nav).with_expand(&["emplStatusNav"])),
            Attempt::new("rich", q(&rich)),
            Attempt::new("no_contingent_flag", q(&no_flag)),
            Attempt::new("no_employment_types", q(&no_types)),
            Attempt::new("no_status_code", q(&no_status)),
            Attempt::new("minimal", q(&minimal)),
        ],
    }
}

pub fn employments_plan() -> AcquisitionPlan {
    AcquisitionPlan {
        entity: EMPLOYMENTS_ENTITY,
        required: false,
        attempts: vec![
            Attempt::new(
                "with_person_id",
                EntityQuery::select(&["userId", "personIdExternal", "isContingentWorker"]),
            ),
            Attempt::new("minimal", EntityQuery::select(&["userId", "isContingentWorker"])),
        ],
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Rows(Vec<Row>),
    /// The server refused this field selection; a smaller one may work.
    Rejected(FetchError),
    Fatal(FetchError),
}

pub async fn run_attempt(dir: &dyn Directory, entity: &str, attempt: &Attempt) -> AttemptOutcome {
    match dir.fetch_all(entity, &attempt.query).await {
        Ok(rows) => AttemptOutcome::Rows(rows),
        Err(e) if e.is_query_rejection() => AttemptOutcome::Rejected(e),
        Err(e) => AttemptOutcome::Fatal(e),
    }
}

/// Rows from the first accepted attempt.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub rows: Vec<Row>,
    pub attempt: Attempt,
    /// Attempts refused before this one, with the server's reason.
    pub rejected: Vec<(&'static str, FetchError)>,
}

impl Acquired {
    pub fn describe(&self, entity: &str) -> String {
        self.attempt.describe(entity)
    }
}

/// Walk `plan` until an attempt is accepted.
///
/// Required plans also fail on an empty row set.
pub async fn acquire(dir: &dyn Directory, plan: &AcquisitionPlan) -> Result<Acquired, RunFailed> {
    let entity = plan.entity;
    let mut rejected: Vec<(&'static str, FetchError)> = Vec::new();

    for attempt in &plan.attempts {
        match run_attempt(dir, entity, attempt).await {
            AttemptOutcome::Rows(rows) => {
                info!(entity, attempt = attempt.name, rows = rows.len(), "acquisition attempt accepted");
                if plan.required && rows.is_empty() {
                    return Err(RunFailed::NoRows {
                        entity: entity.to_string(),
                        query: attempt.query.to_string(),
                    });
                }
                return Ok(Acquired {
                    rows,
                    attempt: attempt.clone(),
                    rejected,
                });
            }
            AttemptOutcome::Rejected(e) => {
                debug!(entity, attempt = attempt.name, error = %e, "acquisition attempt rejected");
                rejected.push((attempt.name, e));
            }
            AttemptOutcome::Fatal(e) => {
                warn!(entity, attempt = attempt.name, error = %e, "acquisition failed");
                return Err(RunFailed::Unavailable {
                    entity: entity.to_string(),
                    query: attempt.query.to_string(),
                    error: e,
                });
            }
        }
    }

    let last_query = plan
        .attempts
        .last()
        .map(|a| a.query.to_string())
        .unwrap_or_default();
    match rejected.pop() {
        Some((_, last_error)) => Err(RunFailed::AttemptsExhausted {
            entity: entity.to_string(),
            attempts: plan.attempts.len(),
            last_query,
            last_error,
        }),
        // An empty plan never reaches the server.
        None => Err(RunFailed::NoRows {
            entity: entity.to_string(),
            query: last_query,
        }),
    }
}

/// `true` when the accepted job attempt can carry contingent evidence.
pub fn job_attempt_has_contingent_fields(query: &EntityQuery) -> bool {
    JOB_CONTINGENT_FIELDS.iter().any(|f| query.selects(f))
}
