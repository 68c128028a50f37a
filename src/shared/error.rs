use axum::{response::IntoResponse, Json};

#[derive(Debug, thiserror::Error)]
pub enum KpiError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),
    #[error("Store not initialized: {0}")]
    NotInitialized(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for KpiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::DuplicateName(msg) | Self::ReferentialIntegrity(msg) => {
                (StatusCode::CONFLICT, msg.clone())
            }
            Self::NotInitialized(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Persistence(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
