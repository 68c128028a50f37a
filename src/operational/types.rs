use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weeks tracked per quarter.
pub const WEEKS_PER_QUARTER: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMethod {
    Weekly,
    Direct,
}

impl Default for TrackingMethod {
    fn default() -> Self {
        Self::Weekly
    }
}

impl std::fmt::Display for TrackingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weekly => write!(f, "weekly"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for TrackingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown tracking method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Zero-based position within the year.
    pub fn index(self) -> u32 {
        match self {
            Self::Q1 => 0,
            Self::Q2 => 1,
            Self::Q3 => 2,
            Self::Q4 => 3,
        }
    }

    /// First absolute week (1..=52) covered by this quarter is offset + 1.
    pub fn week_offset(self) -> u32 {
        self.index() * WEEKS_PER_QUARTER
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Q1 => write!(f, "Q1"),
            Self::Q2 => write!(f, "Q2"),
            Self::Q3 => write!(f, "Q3"),
            Self::Q4 => write!(f, "Q4"),
        }
    }
}

impl std::str::FromStr for Quarter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Q1" => Ok(Self::Q1),
            "Q2" => Ok(Self::Q2),
            "Q3" => Ok(Self::Q3),
            "Q4" => Ok(Self::Q4),
            other => Err(format!("unknown quarter: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekProgress {
    /// 1..=13, relative to the quarter.
    pub week: u32,
    pub achieved: f64,
}

/// One (year, quarter) measurement window of an operational goal.
///
/// Field names are the persisted document shape; legacy records carry a
/// value-type *name* in `achievedType` instead of `achievedTypeId`, so both
/// fields survive round-trips and [`PeriodProgress::value_type`] is the one
/// place that arbitrates between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodProgress {
    pub year: String,
    pub quarter: Quarter,
    pub target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_total_achieved: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<Vec<WeekProgress>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_type_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_type: Option<String>,
}

/// Normalized reference to an achievement value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTypeRef<'a> {
    Id(Uuid),
    LegacyName(&'a str),
    Unset,
}

impl PeriodProgress {
    pub fn value_type(&self) -> ValueTypeRef<'_> {
        if let Some(id) = self.achieved_type_id {
            ValueTypeRef::Id(id)
        } else if let Some(name) = self.achieved_type.as_deref() {
            ValueTypeRef::LegacyName(name)
        } else {
            ValueTypeRef::Unset
        }
    }

    /// Fresh period with 13 zeroed week slots for weekly goals.
    pub fn new_weekly(year: String, quarter: Quarter, target: f64, type_id: Option<Uuid>) -> Self {
        let weeks = (1..=WEEKS_PER_QUARTER)
            .map(|week| WeekProgress {
                week,
                achieved: 0.0,
            })
            .collect();
        Self {
            year,
            quarter,
            target,
            achieved: Some(0.0),
            weekly_total_achieved: Some(0.0),
            weeks: Some(weeks),
            achieved_type_id: type_id,
            achieved_type: None,
        }
    }

    pub fn new_direct(year: String, quarter: Quarter, target: f64, type_id: Option<Uuid>) -> Self {
        Self {
            year,
            quarter,
            target,
            achieved: Some(0.0),
            weekly_total_achieved: None,
            weeks: None,
            achieved_type_id: type_id,
            achieved_type: None,
        }
    }
}

/// Append-only record of a change to a period's effective achieved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub user_id: Uuid,
    pub year: String,
    pub quarter: Quarter,
    pub old_value: f64,
    pub new_value: f64,
    pub note: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayOption {
    General,
    Operational,
}

impl std::fmt::Display for DisplayOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Operational => write!(f, "operational"),
        }
    }
}

impl std::str::FromStr for DisplayOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "operational" => Ok(Self::Operational),
            other => Err(format!("unknown display option: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalGoal {
    pub id: Uuid,
    pub goal: String,
    pub strategic_goal_id: Option<Uuid>,
    /// Denormalized copy of the strategic goal's text.
    pub strategic_goal_text: Option<String>,
    pub department_id: Option<Uuid>,
    pub indicator: Option<String>,
    pub tracking_method: TrackingMethod,
    pub weight: f64,
    pub exclude_from_calculation: bool,
    pub is_reverse: bool,
    pub calculation_method: Option<String>,
    pub display_options: Vec<DisplayOption>,
    pub icon: Option<String>,
    pub progress: Vec<PeriodProgress>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodInput {
    pub year: String,
    pub quarter: Quarter,
    pub target: f64,
    pub achieved_type_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub goal: String,
    pub strategic_goal_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub indicator: Option<String>,
    #[serde(default)]
    pub tracking_method: TrackingMethod,
    pub weight: Option<f64>,
    #[serde(default)]
    pub exclude_from_calculation: bool,
    #[serde(default)]
    pub is_reverse: bool,
    pub calculation_method: Option<String>,
    #[serde(default)]
    pub display_options: Vec<DisplayOption>,
    pub icon: Option<String>,
    #[serde(default)]
    pub periods: Vec<PeriodInput>,
}

/// Partial update: absent fields are left unchanged. Optional attributes
/// (`indicator`, `icon`, `calculationMethod`, the strategic-goal link)
/// cannot be cleared back to null through this shape, only replaced.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    pub goal: Option<String>,
    pub strategic_goal_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub indicator: Option<String>,
    pub tracking_method: Option<TrackingMethod>,
    pub weight: Option<f64>,
    pub exclude_from_calculation: Option<bool>,
    pub is_reverse: Option<bool>,
    pub calculation_method: Option<String>,
    pub display_options: Option<Vec<DisplayOption>>,
    pub icon: Option<String>,
    /// Periods to add; existing (year, quarter) pairs are kept untouched.
    #[serde(default)]
    pub add_periods: Vec<PeriodInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingQuery {
    pub search: Option<String>,
    pub department_id: Option<Uuid>,
    pub quarter: Option<Quarter>,
    pub method: Option<TrackingMethod>,
    /// Quarter-relative (1..=13) when `quarter` is set, absolute (1..=52)
    /// otherwise. Only meaningful for weekly goals.
    pub week: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRow {
    #[serde(flatten)]
    pub goal: OperationalGoal,
    pub avg_percent: f64,
    pub status: crate::achievement::StatusBucket,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_update_fields_mean_unchanged() {
        let req: UpdateGoalRequest = serde_json::from_str("{}").unwrap();
        assert!(req.goal.is_none());
        assert!(req.indicator.is_none());
        assert!(req.icon.is_none());
        assert!(req.calculation_method.is_none());
        assert!(req.strategic_goal_id.is_none());
        assert!(req.add_periods.is_empty());
    }
}
