//! Cookie-backed sessions.
//!
//! The session profile travels as an HS256 token in the `auth_token`
//! HTTP-only cookie. Handlers resolve the profile once per request and pass
//! it explicitly into authorization checks; nothing re-reads the cookie
//! downstream.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::shared::config::SessionConfig;
use crate::shared::error::KpiError;
use crate::users::types::Role;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProfile {
    pub uid: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department_ids: Vec<Uuid>,
}

impl SessionProfile {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    /// Managers edit everything; everyone else only goals of their own
    /// department(s). Goals without a department are manager-only.
    pub fn can_edit_department(&self, department_id: Option<Uuid>) -> bool {
        if self.is_manager() {
            return true;
        }
        department_id.is_some_and(|id| self.department_ids.contains(&id))
    }

    pub fn require_manager(&self) -> Result<(), KpiError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(KpiError::Unauthorized(
                "manager role required".to_string(),
            ))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    profile: SessionProfile,
    iat: i64,
    exp: i64,
}

pub fn issue_token(
    profile: &SessionProfile,
    config: &SessionConfig,
    ttl_seconds: i64,
) -> Result<String, KpiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        profile: profile.clone(),
        iat: now,
        exp: now + ttl_seconds,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| KpiError::Internal(format!("failed to sign session token: {e}")))
}

pub fn decode_token(token: &str, config: &SessionConfig) -> Result<SessionProfile, KpiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.profile)
    .map_err(|e| KpiError::Unauthorized(format!("invalid session token: {e}")))
}

pub fn session_cookie(token: String, ttl_seconds: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(ttl_seconds));
    cookie
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, "");
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Profile from the request cookies, if a valid session is present.
pub fn profile_from_cookies(cookies: &Cookies, config: &SessionConfig) -> Option<SessionProfile> {
    let cookie = cookies.get(AUTH_COOKIE)?;
    decode_token(cookie.value(), config).ok()
}

/// Same as [`profile_from_cookies`] but an error when no session exists.
pub fn require_session(
    cookies: &Cookies,
    config: &SessionConfig,
) -> Result<SessionProfile, KpiError> {
    profile_from_cookies(cookies, config)
        .ok_or_else(|| KpiError::Unauthorized("not signed in".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "test-secret".to_string(),
            ttl_seconds: 86400,
            remember_ttl_seconds: 2_592_000,
        }
    }

    fn profile() -> SessionProfile {
        SessionProfile {
            uid: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            name: "Test User".to_string(),
            role: Role::User,
            department_ids: vec![Uuid::new_v4()],
        }
    }

    #[test]
    fn token_round_trips() {
        let cfg = config();
        let profile = profile();
        let token = issue_token(&profile, &cfg, cfg.ttl_seconds).unwrap();
        let decoded = decode_token(&token, &cfg).unwrap();
        assert_eq!(decoded.uid, profile.uid);
        assert_eq!(decoded.email, profile.email);
        assert_eq!(decoded.role, profile.role);
        assert_eq!(decoded.department_ids, profile.department_ids);
    }

    #[test]
    fn tampered_or_foreign_token_is_rejected() {
        let cfg = config();
        let token = issue_token(&profile(), &cfg, cfg.ttl_seconds).unwrap();

        let other = SessionConfig {
            secret: "other-secret".to_string(),
            ..config()
        };
        assert!(decode_token(&token, &other).is_err());
        assert!(decode_token("garbage", &cfg).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = config();
        let token = issue_token(&profile(), &cfg, -3600).unwrap();
        assert!(decode_token(&token, &cfg).is_err());
    }

    #[test]
    fn regular_user_fails_the_manager_gate() {
        let p = profile();
        assert!(matches!(
            p.require_manager(),
            Err(KpiError::Unauthorized(_))
        ));
    }

    #[test]
    fn department_edit_rights() {
        let mut p = profile();
        let dept = p.department_ids[0];
        assert!(p.can_edit_department(Some(dept)));
        assert!(!p.can_edit_department(Some(Uuid::new_v4())));
        assert!(!p.can_edit_department(None));

        p.role = Role::Manager;
        assert!(p.can_edit_department(Some(Uuid::new_v4())));
        assert!(p.can_edit_department(None));
        assert!(p.require_manager().is_ok());
    }
}
