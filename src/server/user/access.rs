use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::access::{AccessDecision, upsert_defaults};
use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{MessageResponse, RoleCheckRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::Capability;

/// Checks that the subject's role grants `capability` on `path`.
pub fn require_capability(
    state: &AppState,
    external_id: &str,
    path: &str,
    capability: Capability,
) -> Result<AccessDecision, ApiError> {
    let decision = state.access.check_access(Some(external_id), path)?;

    if !decision.allows(capability) {
        tracing::info!(
            "Denied {capability} on {path} for role {}",
            decision.role_name
        );
        return Err(ApiError::forbidden(format!(
            "{capability} access to {path} required"
        )));
    }
    Ok(decision)
}

pub async fn check_role_access(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RoleCheckRequest>,
) -> impl IntoResponse {
    tracing::info!("Role check requested: path={}", req.path);

    let decision = state.access.check_access(Some(&external_id), &req.path)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(decision)))
}

pub async fn init_access_rules(
    _identity: RequireIdentity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let inserted =
        upsert_defaults(state.store.as_ref()).api_err("Failed to initialize access rules")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(MessageResponse {
        message: format!("Default access rules initialized ({inserted} added)"),
    })))
}
