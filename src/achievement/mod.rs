//! Achievement percent and status classification.
//!
//! This is the one shared implementation of the percent formula; every
//! surface that reports progress (goal listings, tracking overview, goal
//! details) goes through it. Pure functions, no side effects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::operational::types::{PeriodProgress, TrackingMethod};

/// Raw ratios are capped here no matter how far achievement overshoots.
pub const MAX_PERCENT: f64 = 500.0;

/// Value-type names that select percentage semantics. The Arabic spelling
/// is the name legacy records carry.
const PERCENTAGE_TYPE_NAMES: [&str; 2] = ["percentage", "نسبة مئوية"];

pub fn is_percentage_type(type_name: &str) -> bool {
    PERCENTAGE_TYPE_NAMES.contains(&type_name)
}

/// Value-type name for a period: id lookup wins, legacy embedded name is
/// the fallback, unknown references resolve to "".
pub fn resolve_type_name<'a>(
    period: &'a PeriodProgress,
    names_by_id: &'a HashMap<Uuid, String>,
) -> &'a str {
    if let Some(id) = period.achieved_type_id {
        if let Some(name) = names_by_id.get(&id) {
            return name;
        }
    }
    period.achieved_type.as_deref().unwrap_or("")
}

/// The achieved value a period contributes under the given tracking method.
pub fn effective_achieved(period: &PeriodProgress, method: TrackingMethod) -> f64 {
    match method {
        TrackingMethod::Direct => period.achieved.unwrap_or(0.0),
        TrackingMethod::Weekly => period
            .weekly_total_achieved
            .or(period.achieved)
            .unwrap_or(0.0),
    }
}

/// Achievement percent for one period, in `[0, MAX_PERCENT]`, never NaN.
///
/// Percentage-type periods divide by the target, defaulting to 100 when the
/// target is unset or zero. Numeric types give full credit for a zero
/// target with non-negative achievement. Reverse goals do NOT alter this
/// value; reversal applies to classification only (see [`status_bucket`]).
pub fn calculate_percent(
    period: &PeriodProgress,
    method: TrackingMethod,
    type_name: &str,
) -> f64 {
    let achieved = effective_achieved(period, method);

    let percent = if is_percentage_type(type_name) {
        let target = if period.target == 0.0 || period.target.is_nan() {
            100.0
        } else {
            period.target
        };
        achieved / target * 100.0
    } else if period.target > 0.0 {
        achieved / period.target * 100.0
    } else if period.target == 0.0 && achieved >= 0.0 {
        100.0
    } else {
        0.0
    };

    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, MAX_PERCENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBucket {
    Red,
    Orange,
    Yellow,
    Green,
}

impl std::fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
        };
        write!(f, "{s}")
    }
}

/// Color bucket for a percent. Reverse goals classify against
/// `100 - percent` so that lower raw achievement reads as better.
pub fn status_bucket(percent: f64, is_reverse: bool) -> StatusBucket {
    let effective = if is_reverse { 100.0 - percent } else { percent };
    if effective < 50.0 {
        StatusBucket::Red
    } else if effective <= 60.0 {
        StatusBucket::Orange
    } else if effective <= 79.0 {
        StatusBucket::Yellow
    } else {
        StatusBucket::Green
    }
}

/// Unweighted mean of per-period percents (not reversed); 0 with no periods.
pub fn average_percent(
    periods: &[PeriodProgress],
    method: TrackingMethod,
    names_by_id: &HashMap<Uuid, String>,
) -> f64 {
    if periods.is_empty() {
        return 0.0;
    }
    let total: f64 = periods
        .iter()
        .map(|p| calculate_percent(p, method, resolve_type_name(p, names_by_id)))
        .sum();
    total / periods.len() as f64
}
