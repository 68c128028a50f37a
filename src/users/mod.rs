pub mod handlers;
pub mod storage;
pub mod types;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use handlers::*;

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(handle_list_users))
        .route("/api/users", post(handle_create_user))
        .route("/api/users/:id", put(handle_update_user))
        .route("/api/users/:id", delete(handle_delete_user))
}
