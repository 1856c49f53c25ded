use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::access::resolve_role;
use crate::auth::{RequireIdentity, RequireUser, find_or_create_user_from_oauth};
use crate::server::AppState;
use crate::server::dto::{SyncUserResponse, UserResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::OAuthProfile;

pub async fn get_me(
    RequireUser { user, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let role_name = resolve_role(state.store.as_ref(), &user).role_name().to_string();

    Json(ApiResponse::success(UserResponse { user, role_name }))
}

/// Called after sign-in; creates the local user on first contact.
pub async fn sync_from_oauth(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(profile): Json<OAuthProfile>,
) -> impl IntoResponse {
    let (user, created) =
        find_or_create_user_from_oauth(state.store.as_ref(), &external_id, &profile)?;

    let status = if created {
        tracing::info!("Provisioned user {} ({})", user.id, user.display_name());
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok::<_, ApiError>((
        status,
        Json(ApiResponse::success(SyncUserResponse { user, created })),
    ))
}
