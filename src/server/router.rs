use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::dataset::dataset_router;
use super::pipeline::pipeline_router;
use super::user::{access_router, user_router};
use crate::access::AccessDecisionEngine;
use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::pipeline::TaskExecutor;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub executor: Arc<TaskExecutor>,
    pub verifier: IdentityVerifier,
    pub access: AccessDecisionEngine,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<TaskExecutor>,
        verifier: IdentityVerifier,
        config: Config,
    ) -> Self {
        let access = AccessDecisionEngine::new(Arc::clone(&store));
        Self {
            store,
            executor,
            verifier,
            access,
            config,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest(
            "/api/v1",
            user_router()
                .merge(access_router())
                .merge(pipeline_router())
                .merge(dataset_router()),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
