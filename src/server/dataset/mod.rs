mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

const BROWSE_ROUTE: &str = "/datastore/browse";
const CREATE_ROUTE: &str = "/datastore/create";

/// Preview size of the dataset detail view.
const PREVIEW_ROWS: usize = 10;
const PREVIEW_COLUMNS: usize = 10;
/// Most columns a column search returns.
const COLUMN_MATCHES: usize = 10;

pub fn dataset_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/datasets", get(handlers::list_datasets))
        .route("/datasets/create", post(handlers::create_dataset))
        .route("/datasets/columns", get(handlers::get_dataset_columns))
        .route("/datasets/{dataset_id}", get(handlers::get_dataset))
}
