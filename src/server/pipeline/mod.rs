mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::server::AppState;

/// Route prefix whose access rules gate the pipeline API.
const PIPELINE_ROUTE: &str = "/pipeline";

pub fn pipeline_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pipelines", get(handlers::list_pipelines))
        .route("/pipelines/run", post(handlers::run_pipeline))
        .route("/pipelines/{id}", patch(handlers::set_pipeline_enabled))
        .route(
            "/pipelines/{pipeline_id}/executions/{execution_id}",
            get(handlers::get_execution_status),
        )
}
