//! # Warehouse
//!
//! A data-cataloguing backend: role-gated UI routes and asynchronous
//! pipeline runs that re-pull datasets from an ERP source. Usable both as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! warehouse = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warehouse::auth::IdentityVerifier;
//! use warehouse::config::Config;
//! use warehouse::pipeline::{HttpErpSource, TaskExecutor};
//! use warehouse::server::{AppState, create_router};
//! use warehouse::store::{SqliteStore, Store};
//!
//! let config = Config::default();
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::new(config.server.db_path()).unwrap());
//! store.initialize().unwrap();
//!
//! let source = Arc::new(HttpErpSource::from_config(&config.erp).unwrap());
//! let executor = Arc::new(TaskExecutor::new(store.clone(), source, 8));
//! let verifier = IdentityVerifier::from_config(&config.auth).unwrap();
//!
//! let state = Arc::new(AppState::new(store, executor, verifier, config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `warehouse` binary. Disable with `default-features = false`.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod types;
