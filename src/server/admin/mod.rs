mod access_rules;
mod roles;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};

use crate::server::response::ApiError;
use crate::server::{AppState, require_capability};
use crate::types::Capability;

/// Route prefix whose access rules gate administration.
const USER_MANAGEMENT_ROUTE: &str = "/usermanagement";

fn require_admin(state: &AppState, external_id: &str) -> Result<(), ApiError> {
    require_capability(state, external_id, USER_MANAGEMENT_ROUTE, Capability::Admin).map(|_| ())
}

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Access rule routes
        .route(
            "/access-rules",
            get(access_rules::list_access_rules)
                .put(access_rules::upsert_access_rule)
                .delete(access_rules::delete_access_rule),
        )
        // Role routes
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        // User routes
        .route("/users", get(users::list_users))
        .route("/users/{id}/role", put(users::set_user_role))
}
