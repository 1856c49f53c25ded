use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use super::require_admin;
use crate::auth::{RequireIdentity, set_user_role as assign_role};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{PaginationParams, SetUserRoleRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate,
};

pub async fn list_users(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;

    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state
        .store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .map_err(|_| ApiError::internal("Failed to list users"))?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn set_user_role(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetUserRoleRequest>,
) -> impl IntoResponse {
    require_admin(&state, &external_id)?;

    let user = assign_role(state.store.as_ref(), &id, &req.role).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("User or role not found"),
        _ => ApiError::internal("Failed to set user role"),
    })?;

    tracing::info!("User {} assigned role {}", user.id, req.role);

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}
