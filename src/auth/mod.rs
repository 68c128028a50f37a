pub mod session;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tower_cookies::Cookies;

use crate::shared::error::KpiError;
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::users::storage::{db_user_to_user, DbUser};

pub use session::{
    profile_from_cookies, require_session, SessionProfile, AUTH_COOKIE,
};

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/user", get(handle_current_user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

pub fn hash_password(plain: &str) -> Result<String, KpiError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    let salt = SaltString::generate(&mut OsRng);
    argon2::Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| KpiError::Internal(format!("failed to hash password: {e}")))
}

/// Stored values are argon2 PHC strings for anything written by this
/// server; records migrated from the original store still hold plaintext
/// and are compared directly.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    match PasswordHash::new(stored) {
        Ok(parsed) => argon2::Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => stored == plain,
    }
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionProfile>, KpiError> {
    let email_lower = req.email.trim().to_lowercase();
    if email_lower.is_empty() || req.password.is_empty() {
        return Err(KpiError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let pool = state.conn.clone();
    let lookup = email_lower.clone();
    let db_user = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| KpiError::NotInitialized(e.to_string()))?;
        let user: Option<DbUser> = users::table
            .filter(users::email.eq(&lookup))
            .first(&mut conn)
            .optional()
            .map_err(|e: diesel::result::Error| KpiError::Persistence(e.to_string()))?;
        Ok::<Option<DbUser>, KpiError>(user)
    })
    .await
    .map_err(|e: tokio::task::JoinError| KpiError::Internal(e.to_string()))??;

    let db_user = match db_user {
        Some(u) if verify_password(&req.password, &u.password) => u,
        _ => {
            warn!("failed login attempt for {email_lower}");
            return Err(KpiError::Unauthorized("invalid credentials".to_string()));
        }
    };

    let user = db_user_to_user(db_user);
    let profile = SessionProfile {
        uid: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        department_ids: user.department_ids.0.clone(),
    };

    let session_cfg = &state.config.session;
    let ttl = if req.remember_me {
        session_cfg.remember_ttl_seconds
    } else {
        session_cfg.ttl_seconds
    };
    let token = session::issue_token(&profile, session_cfg, ttl)?;
    cookies.add(session::session_cookie(token, ttl));

    info!("user {} signed in", profile.email);
    Ok(Json(profile))
}

pub async fn handle_logout(cookies: Cookies) -> Json<serde_json::Value> {
    cookies.add(session::clear_session_cookie());
    Json(serde_json::json!({ "success": true }))
}

pub async fn handle_current_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Json<Option<SessionProfile>> {
    Json(profile_from_cookies(&cookies, &state.config.session))
}
