use serde::{Deserialize, Serialize};

/// Upper bound on any drilldown sample, whatever the policy asks for.
pub const MAX_SAMPLE_CAP: usize = 200;

/// Tunable heuristics for one readiness run.
///
/// Loaded from the `gates` config section; every field has a default so an
/// absent section behaves like the stock policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    pub max_sample: usize,
    pub max_users_per_dup_email: usize,
    /// Codes per `PicklistOption` filter.
    pub label_batch_size: usize,
    /// Lower-cased email values treated as "no email".
    pub missing_email_tokens: Vec<String>,
    /// Classification values that mark a contingent worker outright.
    pub contingent_exact_tokens: Vec<String>,
    /// Classification fragments that mark a contingent worker.
    pub contingent_substrings: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_sample: MAX_SAMPLE_CAP,
            max_users_per_dup_email: 10,
            label_batch_size: 40,
            missing_email_tokens: strings(&[
                "", "none", "no_email", "no email", "null", "n/a", "na", "-", "undefined",
            ]),
            contingent_exact_tokens: strings(&["c", "contingent", "contingent worker", "contractor"]),
            contingent_substrings: strings(&["conting", "contract"]),
        }
    }
}

impl GatePolicy {
    /// Effective sample cap: the configured value, never above [`MAX_SAMPLE_CAP`].
    pub fn sample_cap(&self) -> usize {
        self.max_sample.min(MAX_SAMPLE_CAP)
    }

    pub fn batch_size(&self) -> usize {
        self.label_batch_size.max(1)
    }

    pub fn is_missing_email_token(&self, normalized: &str) -> bool {
        self.missing_email_tokens.iter().any(|t| t == normalized)
    }

    /// Case-insensitive contingent keyword match on one classification value.
    pub fn is_contingent_keyword(&self, value: &str) -> bool {
        let v = value.trim().to_lowercase();
        if v.is_empty() {
            return false;
        }
        self.contingent_exact_tokens.iter().any(|t| *t == v)
            || self.contingent_substrings.iter().any(|s| v.contains(s.as_str()))
    }
}

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_cap_is_clamped() {
        let p = GatePolicy {
            max_sample: 5000,
            ..GatePolicy::default()
        };
        assert_eq!(p.sample_cap(), MAX_SAMPLE_CAP);
        let p = GatePolicy {
            max_sample: 3,
            ..GatePolicy::default()
        };
        assert_eq!(p.sample_cap(), 3);
    }

    #[test]
    fn contingent_keywords() {
        let p = GatePolicy::default();
        assert!(p.is_contingent_keyword("Contractor"));
        assert!(p.is_contingent_keyword(" C "));
        assert!(p.is_contingent_keyword("Contingent Worker"));
        assert!(p.is_contingent_keyword("External Contract Staff"));
        assert!(!p.is_contingent_keyword("Regular"));
        assert!(!p.is_contingent_keyword("Consultant"));
        assert!(!p.is_contingent_keyword("  "));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let p: GatePolicy = serde_json::from_str(r#"{"max_sample": 50}"#).unwrap();
        assert_eq!(p.max_sample, 50);
        assert_eq!(p.label_batch_size, 40);
        assert!(p.is_missing_email_token("n/a"));
    }
}
