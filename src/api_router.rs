//! API Router
//!
//! Combines the route tables of all domain modules into a single router.

use axum::Router;
use std::sync::Arc;

use crate::shared::state::AppState;

/// Configure all API routes from all modules
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::departments::configure_departments_routes())
        .merge(crate::users::configure_users_routes())
        .merge(crate::value_types::configure_value_types_routes())
        .merge(crate::strategic::configure_strategic_routes())
        .merge(crate::operational::configure_operational_routes())
}
