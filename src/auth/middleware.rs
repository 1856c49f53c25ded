use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::extract_bearer_token;
use crate::server::AppState;
use crate::types::User;

/// Extractor that requires a bearer credential the identity provider
/// accepts. Holds the provider's subject id.
pub struct RequireIdentity(pub String);

/// Extractor that additionally requires a local user for the subject.
pub struct RequireUser {
    pub user: User,
    pub external_id: String,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidToken,
    UnknownUser,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::UnknownUser => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"warehouse\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let external_id = extract_and_verify(parts, state).await?;
        Ok(RequireIdentity(external_id))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let external_id = extract_and_verify(parts, state).await?;

        let user = state
            .store
            .get_user_by_external_id(&external_id)
            .map_err(|_| AuthError::InternalError)?
            .ok_or(AuthError::UnknownUser)?;

        Ok(RequireUser { user, external_id })
    }
}

async fn extract_and_verify(parts: &Parts, state: &Arc<AppState>) -> Result<String, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .map(|h| h.to_str().map_err(|_| AuthError::InvalidToken))
        .transpose()?
        .ok_or(AuthError::MissingAuth)?;

    let token = extract_bearer_token(Some(auth_header)).map_err(|_| AuthError::InvalidToken)?;

    state
        .verifier
        .verify(token)
        .await
        .map_err(|_| AuthError::InvalidToken)
}
