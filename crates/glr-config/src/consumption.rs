//! Config consumption registry and unused-key guard.
//!
//! "Consumed pointers" are JSON Pointer prefixes. A leaf under any consumed
//! prefix is read by code; every other leaf is reported as unused. Callers
//! choose whether an unused key is a warning or an error.
//!
//! Only list pointers that [`crate::ReadinessConfig`] or
//! [`crate::secrets::resolve_secrets`] actually read.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registry of consumed pointer prefixes.
pub const CONSUMED_POINTERS: &[&str] = &[
    // ReadinessConfig.directory
    "/directory/api_base_url",
    "/directory/page_size",
    "/directory/max_pages",
    "/directory/timeout_secs",
    "/directory/verify_tls",
    // secrets::resolve_secrets
    "/directory/credentials_env/username",
    "/directory/credentials_env/password",
    // ReadinessConfig.gates (GatePolicy)
    "/gates/max_sample",
    "/gates/max_users_per_dup_email",
    "/gates/label_batch_size",
    "/gates/missing_email_tokens",
    "/gates/contingent_exact_tokens",
    "/gates/contingent_substrings",
    // ReadinessConfig.scope
    "/scope/instance_url",
    "/scope/company_id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Consumed prefixes used for this analysis (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report config leaves nothing reads.
///
/// With [`UnusedKeyPolicy::Fail`] any unused leaf is an error; with
/// [`UnusedKeyPolicy::Warn`] the report is always returned.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS.iter().map(|p| normalize_pointer(p)).collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading "/" and no trailing "/" unless the pointer is the root.
pub(crate) fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc". "/" covers everything.
pub(crate) fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{prefix}/{i}");
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() { "/" } else { prefix };
            out.push(p.to_string());
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{take:?}")
}
