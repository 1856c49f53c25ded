pub mod access;
mod profile;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

pub use access::require_capability;

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", get(profile::get_me))
        .route("/users/oauth/sync", post(profile::sync_from_oauth))
}

pub fn access_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/role-check", post(access::check_role_access))
        .route("/users/role-check/init", post(access::init_access_rules))
}
