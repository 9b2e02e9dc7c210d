//! Percentages and the composite go-live risk score.

/// Defect counts feeding the risk score, all over the active population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskInputs {
    pub active: usize,
    pub missing_manager: usize,
    pub invalid_org: usize,
    pub missing_email: usize,
    pub duplicate_email: usize,
}

/// `100 * x / total`, or `0` for an empty population. Unrounded.
pub fn pct(x: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * x as f64 / total as f64
    }
}

/// Round to two decimals for reporting.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Weighted 0..=100 score: manager and org gaps weigh up to 40 each,
/// email gaps and duplicates up to 10 each.
pub fn risk_score(i: &RiskInputs) -> u32 {
    let part = |p: f64, factor: f64, cap: u32| -> u32 {
        let v = (p * factor).floor();
        if v <= 0.0 {
            0
        } else {
            (v as u32).min(cap)
        }
    };

    let risk = part(pct(i.missing_manager, i.active), 2.0, 40)
        + part(pct(i.invalid_org, i.active), 2.0, 40)
        + part(pct(i.missing_email, i.active), 1.0, 10)
        + part(pct(i.duplicate_email, i.active), 1.0, 10);
    risk.min(100)
}
