pub mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use handlers::*;

pub fn configure_departments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/departments", get(handle_list_departments))
        .route("/api/departments", post(handle_create_department))
        .route("/api/departments/:id", put(handle_update_department))
        .route("/api/departments/:id", delete(handle_delete_department))
}
