pub mod handlers;
pub mod progress;
pub mod storage;
pub mod tracking;
pub mod types;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use handlers::*;
pub use types::*;

pub fn configure_operational_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/goals", get(handle_list_goals))
        .route("/api/goals", post(handle_create_goal))
        .route("/api/goals/tracking", get(handle_tracking_overview))
        .route("/api/goals/:id", get(handle_get_goal))
        .route("/api/goals/:id", put(handle_update_goal))
        .route("/api/goals/:id", delete(handle_delete_goal))
        .route("/api/goals/:id/progress", post(handle_commit_progress))
}
