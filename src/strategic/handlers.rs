use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::auth::require_session;
use crate::shared::error::KpiError;
use crate::shared::schema::{operational_goals, strategic_goals};
use crate::shared::state::AppState;

/// Top-level goal tagged with the years it applies to. The years constrain
/// which period years operational goals under it may use.
#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = strategic_goals)]
#[serde(rename_all = "camelCase")]
pub struct StrategicGoal {
    pub id: Uuid,
    pub goal: String,
    pub years: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategicGoalRequest {
    pub goal: String,
    #[serde(default)]
    pub years: Vec<String>,
}

fn validated(req: StrategicGoalRequest) -> Result<(String, Vec<String>), KpiError> {
    let goal = req.goal.trim().to_string();
    if goal.is_empty() {
        return Err(KpiError::Validation(
            "goal text must not be empty".to_string(),
        ));
    }
    let years: Vec<String> = req
        .years
        .into_iter()
        .map(|y| y.trim().to_string())
        .filter(|y| !y.is_empty())
        .collect();
    Ok((goal, years))
}

pub async fn handle_list_strategic_goals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StrategicGoal>>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let rows: Vec<StrategicGoal> = strategic_goals::table
            .order(strategic_goals::created_at.desc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Vec<StrategicGoal>, KpiError>(rows)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_strategic_goal(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<StrategicGoalRequest>,
) -> Result<Json<StrategicGoal>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let (goal, years) = validated(req)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let now = Utc::now();
        let row = StrategicGoal {
            id: Uuid::new_v4(),
            goal,
            years,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(strategic_goals::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<StrategicGoal, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("created strategic goal {}", result.id);
    Ok(Json(result))
}

pub async fn handle_update_strategic_goal(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<StrategicGoalRequest>,
) -> Result<Json<StrategicGoal>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let (goal, years) = validated(req)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let mut row: StrategicGoal = strategic_goals::table
            .find(goal_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("strategic goal not found".to_string()))?;

        row.goal = goal.clone();
        row.years = years;
        row.updated_at = Utc::now();
        diesel::update(strategic_goals::table.find(goal_id))
            .set(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;

        // Keep the denormalized copy on operational goals in step.
        diesel::update(
            operational_goals::table.filter(operational_goals::strategic_goal_id.eq(goal_id)),
        )
        .set(operational_goals::strategic_goal_text.eq(&goal))
        .execute(&mut conn)
        .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;

        Ok::<StrategicGoal, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_delete_strategic_goal(
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

        let refs: i64 = operational_goals::table
            .filter(operational_goals::strategic_goal_id.eq(goal_id))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if refs > 0 {
            return Err(KpiError::ReferentialIntegrity(
                "strategic goal is referenced by operational goals".to_string(),
            ));
        }

        let deleted = diesel::delete(strategic_goals::table.find(goal_id))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if deleted == 0 {
            return Err(KpiError::NotFound("strategic goal not found".to_string()));
        }
        Ok::<(), KpiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("deleted strategic goal {goal_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
