pub mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use handlers::*;

pub fn configure_strategic_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/strategic-goals", get(handle_list_strategic_goals))
        .route("/api/strategic-goals", post(handle_create_strategic_goal))
        .route("/api/strategic-goals/:id", put(handle_update_strategic_goal))
        .route(
            "/api/strategic-goals/:id",
            delete(handle_delete_strategic_goal),
        )
}
