use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::operational_goals;

use super::types::{
    DisplayOption, HistoryEntry, OperationalGoal, PeriodProgress, TrackingMethod,
};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = operational_goals)]
pub struct DbOperationalGoal {
    pub id: Uuid,
    pub goal: String,
    pub strategic_goal_id: Option<Uuid>,
    pub strategic_goal_text: Option<String>,
    pub department_id: Option<Uuid>,
    pub indicator: Option<String>,
    pub tracking_method: String,
    pub weight: f64,
    pub exclude_from_calculation: bool,
    pub is_reverse: bool,
    pub calculation_method: Option<String>,
    pub display_options: Vec<String>,
    pub icon: Option<String>,
    pub progress: serde_json::Value,
    pub history: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A document that does not deserialize reads as empty, loudly. A later
/// write through the same row persists the empty array, so the log line is
/// the trace of what was dropped and when.
fn parse_document<T>(goal_id: Uuid, field: &str, value: serde_json::Value) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    match serde_json::from_value(value) {
        Ok(items) => items,
        Err(e) => {
            warn!("goal {goal_id}: dropping malformed {field} document: {e}");
            Vec::new()
        }
    }
}

pub fn db_goal_to_goal(db: DbOperationalGoal) -> OperationalGoal {
    let tracking_method: TrackingMethod = db.tracking_method.parse().unwrap_or_default();
    let display_options: Vec<DisplayOption> = db
        .display_options
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    let progress: Vec<PeriodProgress> = parse_document(db.id, "progress", db.progress);
    let history: Vec<HistoryEntry> = parse_document(db.id, "history", db.history);

    OperationalGoal {
        id: db.id,
        goal: db.goal,
        strategic_goal_id: db.strategic_goal_id,
        strategic_goal_text: db.strategic_goal_text,
        department_id: db.department_id,
        indicator: db.indicator,
        tracking_method,
        weight: db.weight,
        exclude_from_calculation: db.exclude_from_calculation,
        is_reverse: db.is_reverse,
        calculation_method: db.calculation_method,
        display_options,
        icon: db.icon,
        progress,
        history,
        created_at: db.created_at,
        updated_at: db.updated_at,
    }
}

pub fn goal_to_db_goal(goal: &OperationalGoal) -> DbOperationalGoal {
    DbOperationalGoal {
        id: goal.id,
        goal: goal.goal.clone(),
        strategic_goal_id: goal.strategic_goal_id,
        strategic_goal_text: goal.strategic_goal_text.clone(),
        department_id: goal.department_id,
        indicator: goal.indicator.clone(),
        tracking_method: goal.tracking_method.to_string(),
        weight: goal.weight,
        exclude_from_calculation: goal.exclude_from_calculation,
        is_reverse: goal.is_reverse,
        calculation_method: goal.calculation_method.clone(),
        display_options: goal.display_options.iter().map(|o| o.to_string()).collect(),
        icon: goal.icon.clone(),
        progress: serde_json::to_value(&goal.progress).unwrap_or_default(),
        history: serde_json::to_value(&goal.history).unwrap_or_default(),
        created_at: goal.created_at,
        updated_at: goal.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_documents_read_as_empty() {
        let id = Uuid::new_v4();
        let periods: Vec<PeriodProgress> =
            parse_document(id, "progress", serde_json::json!("garbage"));
        assert!(periods.is_empty());
        let history: Vec<HistoryEntry> = parse_document(id, "history", serde_json::json!(42));
        assert!(history.is_empty());
    }

    #[test]
    fn well_formed_documents_parse() {
        let id = Uuid::new_v4();
        let periods: Vec<PeriodProgress> = parse_document(
            id,
            "progress",
            serde_json::json!([{ "year": "2025", "quarter": "Q1", "target": 10.0 }]),
        );
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].year, "2025");
    }
}
