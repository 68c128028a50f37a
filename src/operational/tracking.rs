//! Tracking overview: filter goals and attach the per-goal average percent
//! and status bucket. Pure over already-loaded collections.

use std::collections::HashMap;
use uuid::Uuid;

use crate::achievement::{average_percent, status_bucket};

use super::types::{OperationalGoal, Quarter, TrackingMethod, TrackingQuery, TrackingRow};

/// Absolute week number (1..=52) for a quarter-relative week.
pub fn absolute_week(quarter: Quarter, relative_week: u32) -> u32 {
    quarter.week_offset() + relative_week
}

fn matches_search(
    goal: &OperationalGoal,
    department_names: &HashMap<Uuid, String>,
    needle: &str,
) -> bool {
    let needle = needle.to_lowercase();
    let department_name = goal
        .department_id
        .and_then(|id| department_names.get(&id))
        .map(String::as_str)
        .unwrap_or("");
    let haystack = format!(
        "{} {} {} {}",
        goal.goal,
        goal.strategic_goal_text.as_deref().unwrap_or(""),
        goal.indicator.as_deref().unwrap_or(""),
        department_name
    );
    haystack.to_lowercase().contains(&needle)
}

fn matches_week(goal: &OperationalGoal, query: &TrackingQuery, week: u32) -> bool {
    if goal.tracking_method != TrackingMethod::Weekly {
        return false;
    }
    goal.progress.iter().any(|period| {
        if let Some(q) = query.quarter {
            if period.quarter != q {
                return false;
            }
        }
        let Some(weeks) = &period.weeks else {
            return false;
        };
        weeks.iter().any(|w| {
            if query.quarter.is_some() {
                w.week == week
            } else {
                absolute_week(period.quarter, w.week) == week
            }
        })
    })
}

pub fn matches_filters(
    goal: &OperationalGoal,
    department_names: &HashMap<Uuid, String>,
    query: &TrackingQuery,
) -> bool {
    if let Some(search) = query.search.as_deref() {
        if !search.is_empty() && !matches_search(goal, department_names, search) {
            return false;
        }
    }
    if let Some(dept) = query.department_id {
        if goal.department_id != Some(dept) {
            return false;
        }
    }
    if let Some(quarter) = query.quarter {
        if !goal.progress.iter().any(|p| p.quarter == quarter) {
            return false;
        }
    }
    if let Some(method) = query.method {
        if goal.tracking_method != method {
            return false;
        }
    }
    // Week narrowing only applies when explicitly filtering weekly goals.
    if let (Some(week), Some(TrackingMethod::Weekly)) = (query.week, query.method) {
        if !matches_week(goal, query, week) {
            return false;
        }
    }
    true
}

/// Build the overview rows: filtered goals, each with the unweighted mean
/// percent over its (quarter-filtered) periods and the resulting bucket.
pub fn tracking_rows(
    goals: Vec<OperationalGoal>,
    department_names: &HashMap<Uuid, String>,
    type_names: &HashMap<Uuid, String>,
    query: &TrackingQuery,
) -> Vec<TrackingRow> {
    goals
        .into_iter()
        .filter(|g| matches_filters(g, department_names, query))
        .map(|goal| {
            let periods: Vec<_> = goal
                .progress
                .iter()
                .filter(|p| query.quarter.map_or(true, |q| p.quarter == q))
                .cloned()
                .collect();
            let avg_percent = average_percent(&periods, goal.tracking_method, type_names);
            let status = status_bucket(avg_percent, goal.is_reverse);
            TrackingRow {
                goal,
                avg_percent,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operational::types::PeriodProgress;
    use chrono::Utc;

    fn goal(name: &str, method: TrackingMethod) -> OperationalGoal {
        let now = Utc::now();
        OperationalGoal {
            id: Uuid::new_v4(),
            goal: name.to_string(),
            strategic_goal_id: None,
            strategic_goal_text: None,
            department_id: None,
            indicator: None,
            tracking_method: method,
            weight: 1.0,
            exclude_from_calculation: false,
            is_reverse: false,
            calculation_method: None,
            display_options: vec![],
            icon: None,
            progress: vec![],
            history: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn direct_period(quarter: Quarter, target: f64, achieved: f64) -> PeriodProgress {
        let mut p = PeriodProgress::new_direct("2025".to_string(), quarter, target, None);
        p.achieved = Some(achieved);
        p
    }

    fn empty_query() -> TrackingQuery {
        TrackingQuery {
            search: None,
            department_id: None,
            quarter: None,
            method: None,
            week: None,
        }
    }

    #[test]
    fn absolute_week_spans_the_year() {
        assert_eq!(absolute_week(Quarter::Q1, 1), 1);
        assert_eq!(absolute_week(Quarter::Q1, 13), 13);
        assert_eq!(absolute_week(Quarter::Q2, 1), 14);
        assert_eq!(absolute_week(Quarter::Q4, 13), 52);
    }

    #[test]
    fn search_covers_goal_strategic_indicator_and_department_name() {
        let dept = Uuid::new_v4();
        let mut g = goal("Reduce waiting time", TrackingMethod::Direct);
        g.strategic_goal_text = Some("Service excellence".to_string());
        g.indicator = Some("Minutes per visit".to_string());
        g.department_id = Some(dept);

        let mut names = HashMap::new();
        names.insert(dept, "Emergency".to_string());

        let mut q = empty_query();
        for needle in ["waiting", "EXCELLENCE", "per visit", "emergency"] {
            q.search = Some(needle.to_string());
            assert!(matches_filters(&g, &names, &q), "needle {needle}");
        }
        q.search = Some("unrelated".to_string());
        assert!(!matches_filters(&g, &names, &q));
    }

    #[test]
    fn quarter_filter_requires_a_matching_period() {
        let mut g = goal("g", TrackingMethod::Direct);
        g.progress = vec![direct_period(Quarter::Q2, 10.0, 5.0)];

        let names = HashMap::new();
        let mut q = empty_query();
        q.quarter = Some(Quarter::Q2);
        assert!(matches_filters(&g, &names, &q));
        q.quarter = Some(Quarter::Q3);
        assert!(!matches_filters(&g, &names, &q));
    }

    #[test]
    fn week_filter_is_absolute_without_a_quarter_filter() {
        let mut g = goal("g", TrackingMethod::Weekly);
        g.progress = vec![PeriodProgress::new_weekly(
            "2025".to_string(),
            Quarter::Q2,
            10.0,
            None,
        )];

        let names = HashMap::new();
        let mut q = empty_query();
        q.method = Some(TrackingMethod::Weekly);

        // Q2 covers absolute weeks 14..=26.
        q.week = Some(14);
        assert!(matches_filters(&g, &names, &q));
        q.week = Some(1);
        assert!(!matches_filters(&g, &names, &q));

        // With a quarter filter the week becomes quarter-relative.
        q.quarter = Some(Quarter::Q2);
        q.week = Some(1);
        assert!(matches_filters(&g, &names, &q));
    }

    #[test]
    fn week_filter_excludes_direct_goals() {
        let mut g = goal("g", TrackingMethod::Direct);
        g.progress = vec![direct_period(Quarter::Q1, 10.0, 5.0)];

        let names = HashMap::new();
        let mut q = empty_query();
        q.method = Some(TrackingMethod::Weekly);
        q.week = Some(1);
        assert!(!matches_filters(&g, &names, &q));
    }

    #[test]
    fn rows_average_only_the_filtered_quarter() {
        let mut g = goal("g", TrackingMethod::Direct);
        g.progress = vec![
            direct_period(Quarter::Q1, 10.0, 10.0), // 100%
            direct_period(Quarter::Q2, 10.0, 5.0),  // 50%
        ];

        let names = HashMap::new();
        let types = HashMap::new();

        let rows = tracking_rows(vec![g.clone()], &names, &types, &empty_query());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_percent, 75.0);

        let mut q = empty_query();
        q.quarter = Some(Quarter::Q2);
        let rows = tracking_rows(vec![g], &names, &types, &q);
        assert_eq!(rows[0].avg_percent, 50.0);
        assert_eq!(
            rows[0].status,
            crate::achievement::StatusBucket::Orange
        );
    }
}
