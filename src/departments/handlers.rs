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
use crate::shared::schema::{departments, operational_goals, users};
use crate::shared::state::AppState;
use crate::users::types::DepartmentMembership;

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = departments)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
}

/// True when any user's stored membership document references the
/// department. Covers both the current array shape and the legacy singular
/// string via [`DepartmentMembership`] normalization.
pub fn any_membership_references(memberships: &[serde_json::Value], id: Uuid) -> bool {
    memberships.iter().any(|value| {
        serde_json::from_value::<DepartmentMembership>(value.clone())
            .map(|m| m.contains(id))
            .unwrap_or(false)
    })
}

fn validated_name(raw: &str) -> Result<String, KpiError> {
    let name = raw.trim().to_string();
    if name.is_empty() {
        return Err(KpiError::Validation(
            "department name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

pub async fn handle_list_departments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Department>>, KpiError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let rows: Vec<Department> = departments::table
            .order(departments::name.asc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Vec<Department>, KpiError>(rows)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_department(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<DepartmentRequest>,
) -> Result<Json<Department>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let name = validated_name(&req.name)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let taken: i64 = departments::table
            .filter(departments::name.ilike(&name))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if taken > 0 {
            return Err(KpiError::DuplicateName(format!(
                "department '{name}' already exists"
            )));
        }

        let now = Utc::now();
        let row = Department {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(departments::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Department, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("created department {}", result.id);
    Ok(Json(result))
}

pub async fn handle_update_department(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(department_id): Path<Uuid>,
    Json(req): Json<DepartmentRequest>,
) -> Result<Json<Department>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let name = validated_name(&req.name)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let mut row: Department = departments::table
            .find(department_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("department not found".to_string()))?;

        let taken: i64 = departments::table
            .filter(departments::name.ilike(&name))
            .filter(departments::id.ne(department_id))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if taken > 0 {
            return Err(KpiError::DuplicateName(format!(
                "department '{name}' already exists"
            )));
        }

        row.name = name;
        row.updated_at = Utc::now();
        diesel::update(departments::table.find(department_id))
            .set(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Department, KpiError>(row)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_delete_department(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(department_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let goal_refs: i64 = operational_goals::table
            .filter(operational_goals::department_id.eq(department_id))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if goal_refs > 0 {
            return Err(KpiError::ReferentialIntegrity(
                "department is referenced by operational goals".to_string(),
            ));
        }

        let memberships: Vec<serde_json::Value> = users::table
            .select(users::department_ids)
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if any_membership_references(&memberships, department_id) {
            return Err(KpiError::ReferentialIntegrity(
                "department is referenced by users".to_string(),
            ));
        }

        let deleted = diesel::delete(departments::table.find(department_id))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if deleted == 0 {
            return Err(KpiError::NotFound("department not found".to_string()));
        }
        Ok::<(), KpiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("deleted department {department_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}
