use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::auth::require_session;
use crate::operational::progress::{diff_history, set_direct_achieved, set_weekly_achieved};
use crate::operational::storage::{db_goal_to_goal, goal_to_db_goal, DbOperationalGoal};
use crate::operational::tracking::tracking_rows;
use crate::operational::types::{
    CreateGoalRequest, OperationalGoal, PeriodInput, PeriodProgress, Quarter, TrackingMethod,
    TrackingQuery, TrackingRow, UpdateGoalRequest,
};
use crate::shared::error::KpiError;
use crate::shared::schema::{
    achievement_value_types, departments, operational_goals, strategic_goals,
};
use crate::shared::state::AppState;

type PgConn = diesel::r2d2::PooledConnection<
    diesel::r2d2::ConnectionManager<diesel::PgConnection>,
>;

fn load_type_names(conn: &mut PgConn) -> Result<HashMap<Uuid, String>, KpiError> {
    let rows: Vec<(Uuid, String)> = achievement_value_types::table
        .select((achievement_value_types::id, achievement_value_types::name))
        .load(conn)
        .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
    Ok(rows.into_iter().collect())
}

fn load_department_names(conn: &mut PgConn) -> Result<HashMap<Uuid, String>, KpiError> {
    let rows: Vec<(Uuid, String)> = departments::table
        .select((departments::id, departments::name))
        .load(conn)
        .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
    Ok(rows.into_iter().collect())
}

/// Validate and materialize period inputs: one per (year, quarter), targets
/// non-negative, years drawn from the strategic goal's year list when one
/// is set, weekly goals seeded with 13 zeroed week slots.
pub fn build_periods(
    inputs: &[PeriodInput],
    existing: &[PeriodProgress],
    method: TrackingMethod,
    allowed_years: Option<&[String]>,
) -> Result<Vec<PeriodProgress>, KpiError> {
    let mut seen: Vec<(&str, Quarter)> = existing
        .iter()
        .map(|p| (p.year.as_str(), p.quarter))
        .collect();
    let mut periods = Vec::with_capacity(inputs.len());

    for input in inputs {
        if input.target < 0.0 || input.target.is_nan() {
            return Err(KpiError::Validation(format!(
                "target must be non-negative, got {} for {} {}",
                input.target, input.year, input.quarter
            )));
        }
        if let Some(years) = allowed_years {
            if !years.is_empty() && !years.iter().any(|y| y == &input.year) {
                return Err(KpiError::Validation(format!(
                    "year {} is not covered by the strategic goal",
                    input.year
                )));
            }
        }
        if seen.contains(&(input.year.as_str(), input.quarter)) {
            return Err(KpiError::Validation(format!(
                "duplicate period {} {}",
                input.year, input.quarter
            )));
        }
        seen.push((input.year.as_str(), input.quarter));

        let period = match method {
            TrackingMethod::Weekly => PeriodProgress::new_weekly(
                input.year.clone(),
                input.quarter,
                input.target,
                input.achieved_type_id,
            ),
            TrackingMethod::Direct => PeriodProgress::new_direct(
                input.year.clone(),
                input.quarter,
                input.target,
                input.achieved_type_id,
            ),
        };
        periods.push(period);
    }
    Ok(periods)
}

/// Weight actually stored on a goal: excluded goals never carry weight,
/// an absent request value keeps the current one.
pub fn effective_weight(current: f64, requested: Option<f64>, excluded: bool) -> f64 {
    if excluded {
        0.0
    } else {
        requested.unwrap_or(current)
    }
}

fn strategic_context(
    conn: &mut PgConn,
    strategic_goal_id: Option<Uuid>,
) -> Result<(Option<String>, Option<Vec<String>>), KpiError> {
    let Some(id) = strategic_goal_id else {
        return Ok((None, None));
    };
    let row: Option<(String, Vec<String>)> = strategic_goals::table
        .find(id)
        .select((strategic_goals::goal, strategic_goals::years))
        .first(conn)
        .optional()
        .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
    let (text, years) =
        row.ok_or_else(|| KpiError::Validation("strategic goal does not exist".to_string()))?;
    Ok((Some(text), Some(years)))
}

fn ensure_department_exists(conn: &mut PgConn, id: Option<Uuid>) -> Result<(), KpiError> {
    let Some(id) = id else { return Ok(()) };
    let found: i64 = departments::table
        .find(id)
        .count()
        .get_result(conn)
        .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
    if found == 0 {
        return Err(KpiError::Validation(
            "department does not exist".to_string(),
        ));
    }
    Ok(())
}

pub async fn handle_list_goals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OperationalGoal>>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let rows: Vec<DbOperationalGoal> = operational_goals::table
            .order(operational_goals::goal.asc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Vec<OperationalGoal>, KpiError>(rows.into_iter().map(db_goal_to_goal).collect())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_get_goal(
    State(state): State<Arc<AppState>>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<OperationalGoal>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let row: DbOperationalGoal = operational_goals::table
            .find(goal_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("operational goal not found".to_string()))?;
        Ok::<OperationalGoal, KpiError>(db_goal_to_goal(row))
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_goal(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<CreateGoalRequest>,
) -> Result<Json<OperationalGoal>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    if req.goal.trim().is_empty() {
        return Err(KpiError::Validation(
            "goal text must not be empty".to_string(),
        ));
    }
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let (strategic_goal_text, allowed_years) =
            strategic_context(&mut conn, req.strategic_goal_id)?;
        ensure_department_exists(&mut conn, req.department_id)?;

        let progress = build_periods(
            &req.periods,
            &[],
            req.tracking_method,
            allowed_years.as_deref(),
        )?;

        let weight = effective_weight(0.0, req.weight, req.exclude_from_calculation);

        let now = Utc::now();
        let goal = OperationalGoal {
            id: Uuid::new_v4(),
            goal: req.goal.trim().to_string(),
            strategic_goal_id: req.strategic_goal_id,
            strategic_goal_text,
            department_id: req.department_id,
            indicator: req.indicator,
            tracking_method: req.tracking_method,
            weight,
            exclude_from_calculation: req.exclude_from_calculation,
            is_reverse: req.is_reverse,
            calculation_method: req.calculation_method,
            display_options: req.display_options,
            icon: req.icon,
            progress,
            history: vec![],
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(operational_goals::table)
            .values(&goal_to_db_goal(&goal))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<OperationalGoal, KpiError>(goal)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("created operational goal {}", result.id);
    Ok(Json(result))
}

pub async fn handle_update_goal(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<OperationalGoal>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let row: DbOperationalGoal = operational_goals::table
            .find(goal_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("operational goal not found".to_string()))?;
        let mut goal = db_goal_to_goal(row);

        if let Some(text) = req.goal {
            if text.trim().is_empty() {
                return Err(KpiError::Validation(
                    "goal text must not be empty".to_string(),
                ));
            }
            goal.goal = text.trim().to_string();
        }
        if let Some(id) = req.strategic_goal_id {
            let (text, _) = strategic_context(&mut conn, Some(id))?;
            goal.strategic_goal_id = Some(id);
            goal.strategic_goal_text = text;
        }
        if let Some(id) = req.department_id {
            ensure_department_exists(&mut conn, Some(id))?;
            goal.department_id = Some(id);
        }
        if let Some(indicator) = req.indicator {
            goal.indicator = Some(indicator);
        }
        if let Some(method) = req.tracking_method {
            goal.tracking_method = method;
        }
        if let Some(is_reverse) = req.is_reverse {
            goal.is_reverse = is_reverse;
        }
        if let Some(calculation_method) = req.calculation_method {
            goal.calculation_method = Some(calculation_method);
        }
        if let Some(display_options) = req.display_options {
            goal.display_options = display_options;
        }
        if let Some(icon) = req.icon {
            goal.icon = Some(icon);
        }
        if let Some(exclude) = req.exclude_from_calculation {
            goal.exclude_from_calculation = exclude;
        }
        goal.weight = effective_weight(goal.weight, req.weight, goal.exclude_from_calculation);

        if !req.add_periods.is_empty() {
            let (_, allowed_years) = strategic_context(&mut conn, goal.strategic_goal_id)?;
            let mut added = build_periods(
                &req.add_periods,
                &goal.progress,
                goal.tracking_method,
                allowed_years.as_deref(),
            )?;
            goal.progress.append(&mut added);
        }

        goal.updated_at = Utc::now();
        diesel::update(operational_goals::table.find(goal_id))
            .set(&goal_to_db_goal(&goal))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<OperationalGoal, KpiError>(goal)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_delete_goal(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let deleted = diesel::delete(operational_goals::table.find(goal_id))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if deleted == 0 {
            return Err(KpiError::NotFound(
                "operational goal not found".to_string(),
            ));
        }
        Ok::<(), KpiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("deleted operational goal {goal_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEdit {
    pub year: String,
    pub quarter: Quarter,
    /// Required for weekly goals, ignored for direct ones.
    pub week: Option<u32>,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct CommitProgressRequest {
    pub edits: Vec<ProgressEdit>,
}

/// Apply the edits to a working copy of the goal's periods, derive the
/// history delta, and persist both in a single row update. Concurrent
/// commits to the same goal are last-write-wins over the whole array.
pub async fn handle_commit_progress(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<CommitProgressRequest>,
) -> Result<Json<OperationalGoal>, KpiError> {
    let profile = require_session(&cookies, &state.config.session)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let row: DbOperationalGoal = operational_goals::table
            .find(goal_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("operational goal not found".to_string()))?;
        let mut goal = db_goal_to_goal(row);

        if !profile.can_edit_department(goal.department_id) {
            return Err(KpiError::Unauthorized(
                "no edit rights for this goal's department".to_string(),
            ));
        }

        let mut edited = goal.progress.clone();
        for edit in &req.edits {
            match goal.tracking_method {
                TrackingMethod::Weekly => {
                    let week = edit.week.ok_or_else(|| {
                        KpiError::Validation(format!(
                            "week is required for weekly goal edits ({} {})",
                            edit.year, edit.quarter
                        ))
                    })?;
                    set_weekly_achieved(&mut edited, &edit.year, edit.quarter, week, edit.value)?;
                }
                TrackingMethod::Direct => {
                    set_direct_achieved(&mut edited, &edit.year, edit.quarter, edit.value)?;
                }
            }
        }

        let entries = diff_history(
            &goal.progress,
            &edited,
            goal.tracking_method,
            profile.uid,
            Utc::now(),
        );

        goal.progress = edited;
        goal.history.extend(entries.iter().cloned());
        goal.updated_at = Utc::now();

        diesel::update(operational_goals::table.find(goal_id))
            .set(&goal_to_db_goal(&goal))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;

        info!(
            "progress commit on goal {goal_id}: {} period(s) changed",
            entries.len()
        );
        Ok::<OperationalGoal, KpiError>(goal)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_tracking_overview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<Vec<TrackingRow>>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let rows: Vec<DbOperationalGoal> = operational_goals::table
            .order(operational_goals::goal.asc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        let goals: Vec<OperationalGoal> = rows.into_iter().map(db_goal_to_goal).collect();

        let department_names = load_department_names(&mut conn)?;
        let type_names = load_type_names(&mut conn)?;

        Ok::<Vec<TrackingRow>, KpiError>(tracking_rows(
            goals,
            &department_names,
            &type_names,
            &query,
        ))
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(year: &str, quarter: Quarter, target: f64) -> PeriodInput {
        PeriodInput {
            year: year.to_string(),
            quarter,
            target,
            achieved_type_id: None,
        }
    }

    #[test]
    fn weekly_periods_get_thirteen_zeroed_weeks() {
        let periods = build_periods(
            &[input("2025", Quarter::Q1, 10.0)],
            &[],
            TrackingMethod::Weekly,
            None,
        )
        .unwrap();
        let weeks = periods[0].weeks.as_ref().unwrap();
        assert_eq!(weeks.len(), 13);
        assert!(weeks.iter().all(|w| w.achieved == 0.0));
        assert_eq!(periods[0].weekly_total_achieved, Some(0.0));
    }

    #[test]
    fn duplicate_year_quarter_is_rejected() {
        let err = build_periods(
            &[
                input("2025", Quarter::Q1, 10.0),
                input("2025", Quarter::Q1, 20.0),
            ],
            &[],
            TrackingMethod::Direct,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, KpiError::Validation(_)));
    }

    #[test]
    fn duplicate_against_existing_periods_is_rejected() {
        let existing = build_periods(
            &[input("2025", Quarter::Q3, 10.0)],
            &[],
            TrackingMethod::Direct,
            None,
        )
        .unwrap();
        let err = build_periods(
            &[input("2025", Quarter::Q3, 5.0)],
            &existing,
            TrackingMethod::Direct,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, KpiError::Validation(_)));
    }

    #[test]
    fn years_outside_the_strategic_goal_are_rejected() {
        let allowed = vec!["2024".to_string(), "2025".to_string()];
        assert!(build_periods(
            &[input("2025", Quarter::Q1, 10.0)],
            &[],
            TrackingMethod::Direct,
            Some(&allowed),
        )
        .is_ok());
        assert!(build_periods(
            &[input("2030", Quarter::Q1, 10.0)],
            &[],
            TrackingMethod::Direct,
            Some(&allowed),
        )
        .is_err());
        // An empty year list does not constrain.
        assert!(build_periods(
            &[input("2030", Quarter::Q1, 10.0)],
            &[],
            TrackingMethod::Direct,
            Some(&[]),
        )
        .is_ok());
    }

    #[test]
    fn excluded_goals_never_carry_weight() {
        // Create: a supplied weight on an excluded goal is discarded.
        assert_eq!(effective_weight(0.0, Some(2.5), true), 0.0);
        assert_eq!(effective_weight(0.0, Some(2.5), false), 2.5);
        assert_eq!(effective_weight(0.0, None, false), 0.0);
    }

    #[test]
    fn turning_exclusion_on_zeroes_a_stored_weight() {
        // Update: the request flips exclusion without touching the weight.
        assert_eq!(effective_weight(3.0, None, true), 0.0);
        assert_eq!(effective_weight(3.0, None, false), 3.0);
        assert_eq!(effective_weight(3.0, Some(1.5), true), 0.0);
    }

    #[test]
    fn negative_target_is_rejected() {
        assert!(build_periods(
            &[input("2025", Quarter::Q1, -1.0)],
            &[],
            TrackingMethod::Direct,
            None,
        )
        .is_err());
    }
}
