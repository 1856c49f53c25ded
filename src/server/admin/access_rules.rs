use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use super::require_admin;
use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{DeleteAccessRuleParams, ListAccessRulesParams, UpsertAccessRuleRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_endpoint, validate_role_name};
use crate::types::AccessRule;

pub async fn list_access_rules(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAccessRulesParams>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;

    let rules = match params.role.as_deref().filter(|r| !r.is_empty()) {
        Some(role) => state.store.list_access_rules(role),
        None => state.store.list_all_access_rules(),
    }
    .api_err("Failed to list access rules")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(rules)))
}

/// Creates the rule or overwrites the capabilities of an existing one.
pub async fn upsert_access_rule(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertAccessRuleRequest>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;
    validate_role_name(&req.role)?;
    validate_endpoint(&req.endpoint)?;

    let rule = AccessRule {
        role: req.role,
        endpoint: req.endpoint,
        capabilities: req.capabilities,
        created_at: Utc::now(),
    };

    state
        .store
        .upsert_access_rule(&rule)
        .api_err("Failed to save access rule")?;

    tracing::info!(
        "Access rule set: role={} endpoint={} capabilities=[{}]",
        rule.role,
        rule.endpoint,
        rule.capabilities
    );

    let saved = state
        .store
        .get_access_rule(&rule.role, &rule.endpoint)
        .api_err("Failed to get access rule")?
        .or_not_found("Access rule not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(saved)))
}

pub async fn delete_access_rule(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteAccessRuleParams>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;

    let deleted = state
        .store
        .delete_access_rule(&params.role, &params.endpoint)
        .api_err("Failed to delete access rule")?;

    if !deleted {
        return Err(ApiError::not_found("Access rule not found"));
    }

    tracing::info!(
        "Access rule deleted: role={} endpoint={}",
        params.role,
        params.endpoint
    );

    Ok(Json(ApiResponse::success(())))
}
