use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use std::sync::Arc;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::auth::{hash_password, require_session};
use crate::shared::error::KpiError;
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::users::storage::{db_user_to_user, DbUser};
use crate::users::types::{CreateUserRequest, UpdateUserRequest, User};

fn normalized_email(raw: &str) -> Result<String, KpiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(KpiError::Validation(format!("invalid email: {raw}")));
    }
    Ok(email)
}

pub async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Vec<User>>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let rows: Vec<DbUser> = users::table
            .order(users::name.asc())
            .load(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Vec<User>, KpiError>(rows.into_iter().map(db_user_to_user).collect())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;

    let email = normalized_email(&req.email)?;
    if req.name.trim().is_empty() {
        return Err(KpiError::Validation("name must not be empty".to_string()));
    }
    if req.password.is_empty() {
        return Err(KpiError::Validation(
            "password must not be empty".to_string(),
        ));
    }
    let password = hash_password(&req.password)?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        // Best-effort uniqueness probe before the write; not atomic.
        let taken: i64 = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if taken > 0 {
            return Err(KpiError::DuplicateName(format!(
                "a user with email {email} already exists"
            )));
        }

        let now = Utc::now();
        let row = DbUser {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            email,
            password,
            role: req.role.to_string(),
            department_ids: serde_json::json!(req
                .department_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(users::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<User, KpiError>(db_user_to_user(row))
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("created user {}", result.id);
    Ok(Json(result))
}

pub async fn handle_update_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;

    let email = req.email.as_deref().map(normalized_email).transpose()?;
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(hash_password)
        .transpose()?;
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;

        let mut row: DbUser = users::table
            .find(user_id)
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?
            .ok_or_else(|| KpiError::NotFound("user not found".to_string()))?;

        if let Some(email) = email {
            let taken: i64 = users::table
                .filter(users::email.eq(&email))
                .filter(users::id.ne(user_id))
                .count()
                .get_result(&mut conn)
                .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
            if taken > 0 {
                return Err(KpiError::DuplicateName(format!(
                    "a user with email {email} already exists"
                )));
            }
            row.email = email;
        }
        if let Some(name) = req.name {
            row.name = name.trim().to_string();
        }
        if let Some(password) = password {
            row.password = password;
        }
        if let Some(role) = req.role {
            row.role = role.to_string();
        }
        if let Some(ids) = req.department_ids {
            row.department_ids =
                serde_json::json!(ids.iter().map(|id| id.to_string()).collect::<Vec<_>>());
        }
        row.updated_at = Utc::now();

        diesel::update(users::table.find(user_id))
            .set(&row)
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<User, KpiError>(db_user_to_user(row))
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, KpiError> {
    require_session(&cookies, &state.config.session)?.require_manager()?;
    let pool = state.conn.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let deleted = diesel::delete(users::table.find(user_id))
            .execute(&mut conn)
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        if deleted == 0 {
            return Err(KpiError::NotFound("user not found".to_string()));
        }
        Ok::<(), KpiError>(())
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    info!("deleted user {user_id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(
            normalized_email("  User@Example.COM ").unwrap(),
            "user@example.com"
        );
    }

    #[test]
    fn bad_emails_are_rejected() {
        assert!(normalized_email("").is_err());
        assert!(normalized_email("   ").is_err());
        assert!(normalized_email("no-at-sign").is_err());
    }
}
