pub mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use handlers::*;

pub fn configure_value_types_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/value-types", get(handle_list_value_types))
        .route("/api/value-types", post(handle_create_value_type))
        .route("/api/value-types/:id", put(handle_update_value_type))
        .route("/api/value-types/:id", delete(handle_delete_value_type))
}
