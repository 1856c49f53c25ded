//! In-process harness: the full router over a temp database, with identity
//! taken from unsigned JWTs and a scripted dataset source.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use warehouse::auth::{IdentityVerifier, bootstrap_roles, find_or_create_user_from_oauth, set_user_role};
use warehouse::config::{AuthMode, Config};
use warehouse::error::Error;
use warehouse::pipeline::{DatasetSource, PullFuture, TabularRows, TaskExecutor};
use warehouse::server::{AppState, create_router};
use warehouse::store::{SqliteStore, Store};
use warehouse::types::{OAuthProfile, User};

/// Serves fixed rows for every name except those starting with `missing`.
pub struct ScriptedSource;

impl DatasetSource for ScriptedSource {
    fn pull_dataset<'a>(&'a self, name: &'a str) -> PullFuture<'a> {
        Box::pin(async move {
            if name.starts_with("missing") {
                return Err(Error::Upstream(format!("no dataset named {name}")));
            }
            Ok(TabularRows {
                columns: vec!["region".to_string(), "sales".to_string()],
                rows: vec![
                    vec![json!("north"), json!(120)],
                    vec![json!("south"), json!(80)],
                ],
            })
        })
    }
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub executor: Arc<TaskExecutor>,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("warehouse.db")).expect("open store"));
        store.initialize().expect("initialize store");
        bootstrap_roles(store.as_ref()).expect("bootstrap roles");

        let mut config = Config::default();
        config.auth.mode = AuthMode::JwtClaims;
        config.server.data_dir = temp_dir.path().to_path_buf();

        let executor = Arc::new(TaskExecutor::new(store.clone(), Arc::new(ScriptedSource), 4));
        let verifier = IdentityVerifier::from_config(&config.auth).expect("verifier");
        let state = Arc::new(AppState::new(store.clone(), executor.clone(), verifier, config));

        Self {
            temp_dir,
            store,
            executor,
            router: create_router(state),
        }
    }

    /// An unsigned JWT whose subject is `sub`.
    pub fn token(sub: &str) -> String {
        format!(
            "{}.{}.unsigned",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(json!({ "sub": sub }).to_string())
        )
    }

    /// Creates a user for `sub` holding `role`.
    pub fn user(&self, sub: &str, role: &str) -> User {
        let (user, _) = find_or_create_user_from_oauth(self.store.as_ref(), sub, &OAuthProfile::default())
            .expect("create user");
        set_user_role(self.store.as_ref(), &user.id, role).expect("set role")
    }

    /// Record id of the pipeline named `name`.
    pub fn pipeline_id(&self, name: &str) -> String {
        self.store
            .get_pipeline_by_name(name)
            .expect("read pipeline")
            .expect("pipeline exists")
            .id
    }

    pub async fn request(&self, method: Method, uri: &str, sub: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sub) = sub {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", Self::token(sub)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    /// Sends a bodiless request carrying a raw `Authorization` value.
    pub async fn request_with_authorization(&self, method: Method, uri: &str, authorization: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, authorization)
            .body(Body::empty())
            .expect("build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("call router");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, sub: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, sub, None).await
    }

    pub async fn post(&self, uri: &str, sub: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, sub, Some(body)).await
    }

    /// Polls an execution until it leaves `running`, returning every
    /// distinct status observed in order.
    pub async fn wait_for_execution(&self, sub: &str, pipeline_id: &str, execution_id: &str) -> Vec<String> {
        let uri = format!("/api/v1/pipelines/{pipeline_id}/executions/{execution_id}");
        let mut seen: Vec<String> = Vec::new();
        for _ in 0..500 {
            let resp = self.get(&uri, Some(sub)).await;
            assert_eq!(resp.status, StatusCode::OK, "{:?}", resp.body);
            let status = resp.body["data"]["status"].as_str().expect("status").to_string();
            if seen.last() != Some(&status) {
                seen.push(status.clone());
            }
            if status != "running" {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} never finished");
    }
}
