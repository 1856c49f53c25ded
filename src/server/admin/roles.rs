use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use super::require_admin;
use crate::auth::RequireIdentity;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::CreateRoleRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::validate_role_name;
use crate::types::Role;

pub async fn list_roles(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;

    let roles = state.store.list_roles().api_err("Failed to list roles")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(roles)))
}

pub async fn create_role(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoleRequest>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;
    validate_role_name(&req.name)?;

    let now = Utc::now();
    let role = Role {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        description: req.description,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    match state.store.create_role(&role) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Role already exists")),
        Err(_) => return Err(ApiError::internal("Failed to create role")),
    }

    tracing::info!("Created role {}", role.name);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(role))))
}
