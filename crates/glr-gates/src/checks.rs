//! Data-quality checks over the active population.
//!
//! Each check is independent: a count, a capped drilldown sample, and for
//! org completeness a per-field tally.

use std::collections::BTreeMap;

use glr_schemas::{
    DuplicateEmailEntry, InvalidOrgEntry, MissingEmailEntry, MissingManagerEntry, OrgMissingFieldCounts,
    ORG_FIELDS,
};

use crate::classify::EmployeeRecord;
use crate::fields::{is_blank, norm};
use crate::policy::GatePolicy;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerCheck {
    pub missing: usize,
    pub sample: Vec<MissingManagerEntry>,
}

pub fn check_managers<'a>(active: impl IntoIterator<Item = &'a EmployeeRecord>, policy: &GatePolicy) -> ManagerCheck {
    let cap = policy.sample_cap();
    let mut out = ManagerCheck::default();
    for e in active {
        if !is_blank(e.manager_id.as_deref()) {
            continue;
        }
        out.missing += 1;
        if out.sample.len() < cap {
            out.sample.push(MissingManagerEntry {
                user_id: e.user_id.clone(),
                manager_id: e.manager_id.clone(),
            });
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrgCheck {
    pub invalid: usize,
    pub per_field: OrgMissingFieldCounts,
    pub sample: Vec<InvalidOrgEntry>,
}

pub fn check_org<'a>(active: impl IntoIterator<Item = &'a EmployeeRecord>, policy: &GatePolicy) -> OrgCheck {
    let cap = policy.sample_cap();
    let mut out = OrgCheck::default();
    for e in active {
        let blank: Vec<&str> = ORG_FIELDS
            .iter()
            .copied()
            .filter(|f| is_blank(e.org_value(f)))
            .collect();
        if blank.is_empty() {
            continue;
        }
        out.invalid += 1;
        for f in &blank {
            out.per_field.bump(f);
        }
        if out.sample.len() < cap {
            let v = |f: &str| e.org_value(f).map(str::to_string);
            out.sample.push(InvalidOrgEntry {
                user_id: e.user_id.clone(),
                missing_fields: blank.join(", "),
                company: v("company"),
                business_unit: v("businessUnit"),
                division: v("division"),
                department: v("department"),
                location: v("location"),
                manager_id: e.manager_id.clone(),
            });
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailCheck {
    pub missing: usize,
    pub missing_sample: Vec<MissingEmailEntry>,
    /// Sum over groups of `size - 1`.
    pub duplicates: usize,
    pub duplicate_sample: Vec<DuplicateEmailEntry>,
}

/// Placeholder or absent email.
pub fn is_missing_email(email: Option<&str>, policy: &GatePolicy) -> bool {
    match email {
        None => true,
        Some(s) => policy.is_missing_email_token(&norm(s)),
    }
}

/// Email hygiene over active employees that have an identity row.
pub fn check_emails<'a>(active: impl IntoIterator<Item = &'a EmployeeRecord>, policy: &GatePolicy) -> EmailCheck {
    let cap = policy.sample_cap();
    let mut out = EmailCheck::default();
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for e in active {
        let Some(identity) = &e.identity else { continue };
        let email = identity.email.as_deref();
        if is_missing_email(email, policy) {
            out.missing += 1;
            if out.missing_sample.len() < cap {
                out.missing_sample.push(MissingEmailEntry {
                    user_id: e.user_id.clone(),
                    email: email.map(|s| s.trim().to_string()).unwrap_or_default(),
                    username: identity.username.clone(),
                });
            }
            continue;
        }
        if let Some(s) = email {
            groups.entry(norm(s)).or_default().push(e.user_id.clone());
        }
    }

    let mut dups: Vec<(String, Vec<String>)> = groups.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    out.duplicates = dups.iter().map(|(_, ids)| ids.len() - 1).sum();

    // Stable sort keeps email-ascending order from the BTreeMap within equal sizes.
    dups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    out.duplicate_sample = dups
        .into_iter()
        .take(cap)
        .map(|(email, ids)| DuplicateEmailEntry {
            email,
            count: ids.len(),
            sample_user_ids: ids.into_iter().take(policy.max_users_per_dup_email).collect(),
        })
        .collect();
    out
}
