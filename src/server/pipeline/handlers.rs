use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::PIPELINE_ROUTE;
use crate::auth::{RequireIdentity, RequireUser};
use crate::error::Error;
use crate::pipeline::RunRequest;
use crate::server::AppState;
use crate::server::dto::{
    ListPipelinesParams, PipelineStatusResponse, RunPipelineRequest, SetPipelineEnabledRequest,
};
use crate::server::require_capability;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::parse_since;
use crate::types::Capability;

pub async fn run_pipeline(
    RequireUser { user, external_id }: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunPipelineRequest>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, PIPELINE_ROUTE, Capability::Viewer)?;

    let request = RunRequest {
        dataset_id: req.pipeline_id.clone(),
        dataset_name: req.pipeline_name,
        user_id: req.user_id.filter(|id| !id.is_empty()).unwrap_or(user.id),
        pipeline_id: Some(req.pipeline_id),
    };

    let submission = state.executor.submit(request)?;

    Ok::<_, ApiError>((StatusCode::ACCEPTED, Json(ApiResponse::success(submission))))
}

pub async fn get_execution_status(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path((pipeline_id, execution_id)): Path<(String, String)>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, PIPELINE_ROUTE, Capability::Viewer)?;

    let status = state
        .executor
        .get_status(&pipeline_id, &execution_id)
        .map_err(|e| match e {
            Error::NotFound => {
                ApiError::not_found("No execution with this id for the pipeline")
            }
            other => other.into(),
        })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(PipelineStatusResponse { status })))
}

pub async fn list_pipelines(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPipelinesParams>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, PIPELINE_ROUTE, Capability::Viewer)?;

    let since = params
        .since
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_since)
        .transpose()?;
    let name = params.name.as_deref().filter(|s| !s.is_empty());

    let pipelines = state
        .executor
        .list_pipelines(name, since)
        .api_err("Failed to list pipelines")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(pipelines)))
}

pub async fn set_pipeline_enabled(
    RequireIdentity(external_id): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetPipelineEnabledRequest>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, PIPELINE_ROUTE, Capability::Admin)?;

    state.executor.set_enabled(&id, req.enabled)?;

    let pipeline = state
        .store
        .get_pipeline(&id)
        .api_err("Failed to get pipeline")?
        .or_not_found("Pipeline not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(pipeline)))
}
