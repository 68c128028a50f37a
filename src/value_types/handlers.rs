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
use crate::operational::types::PeriodProgress;
use crate::shared::error::KpiError;
use crate::shared::schema::{achievement_value_types, operational_goals};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = achievement_value_types)]
#[serde(rename_all = "camelCase")]
pub struct AchievementValueType {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ValueTypeRequest {
    pub name: String,
}

/// Scan the goals' stored `progress[]` documents for any reference to the
/// value type: by id, or for legacy periods with no id, by name.
pub fn value_type_in_use(progress_docs: &[serde_json::Value], id: Uuid, name: &str) -> bool {
    progress_docs.iter().any(|doc| {
        let periods: Vec<PeriodProgress> =
            serde_json::from_value(doc.clone()).unwrap_or_default();
        periods.iter().any(|p| {
            p.achieved_type_id == Some(id)
                || (p.achieved_type_id.is_none() && p.achieved_type.as_deref() == Some(name))
        })
    })
}

fn validated_name(raw: &str) -> Result<String, KpiError> {
    let name = raw.trim().to_string();
    if name.is_empty() {
        return Err(KpiError::Validation(
            "value type name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

pub async fn handle_list_value_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AchievementValueType>>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let rows: Vec<AchievementValueType> = achievement_value_types::table
            .order(achievement_value_types::name.asc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Vec<AchievementValueType>, KpiError>(rows)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_value_type(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<ValueTypeRequest>,
) -> Result<Json<AchievementValueType>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let name = validated_name(&req.name)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let taken: i64 = achievement_value_types::table
            .filter(achievement_value_types::name.ilike(&name))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if taken > 0 {
            return Err(KpiError::DuplicateName(format!(
                "value type '{name}' already exists"
            )));
        }

        let now = Utc::now();
        let row = AchievementValueType {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(achievement_value_types::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<AchievementValueType, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("created value type {}", result.id);
    Ok(Json(result))
}

pub async fn handle_update_value_type(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(type_id): Path<Uuid>,
    Json(req): Json<ValueTypeRequest>,
) -> Result<Json<AchievementValueType>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let name = validated_name(&req.name)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let mut row: AchievementValueType = achievement_value_types::table
            .find(type_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("value type not found".to_string()))?;

        let taken: i64 = achievement_value_types::table
            .filter(achievement_value_types::name.ilike(&name))
            .filter(achievement_value_types::id.ne(type_id))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if taken > 0 {
            return Err(KpiError::DuplicateName(format!(
                "value type '{name}' already exists"
            )));
        }

        row.name = name;
        row.updated_at = Utc::now();
        diesel::update(achievement_value_types::table.find(type_id))
            .set(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<AchievementValueType, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_delete_value_type(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(type_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let row: AchievementValueType = achievement_value_types::table
            .find(type_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("value type not found".to_string()))?;

        let progress_docs: Vec<serde_json::Value> = operational_goals::table
            .select(operational_goals::progress)
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if value_type_in_use(&progress_docs, type_id, &row.name) {
            return Err(KpiError::ReferentialIntegrity(
                "value type is referenced by operational goal periods".to_string(),
            ));
        }

        diesel::delete(achievement_value_types::table.find(type_id))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<(), KpiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("deleted value type {type_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
