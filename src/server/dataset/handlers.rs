use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Map;
use uuid::Uuid;

use super::{BROWSE_ROUTE, COLUMN_MATCHES, CREATE_ROUTE, PREVIEW_COLUMNS, PREVIEW_ROWS};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateDatasetRequest, DatasetColumnsParams, DatasetColumnsResponse, DatasetDetailResponse,
    DatasetPreview, ListDatasetsParams,
};
use crate::server::require_capability;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{Capability, DataDocument, DatasetInformation};

pub async fn list_datasets(
    RequireUser { user, external_id }: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDatasetsParams>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, BROWSE_ROUTE, Capability::Viewer)?;

    let search = params.search.as_deref().filter(|s| !s.is_empty());
    let owner = params.mine.then_some(user.id.as_str());

    let datasets = state
        .store
        .list_dataset_info(search, owner)
        .api_err("Failed to list datasets")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(datasets)))
}

pub async fn get_dataset(
    RequireUser { external_id, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, BROWSE_ROUTE, Capability::Viewer)?;

    let information = state
        .store
        .get_dataset_info_by_dataset_id(&dataset_id)
        .api_err("Failed to get dataset")?
        .or_not_found("Dataset not found")?;

    let preview = state
        .store
        .get_data_document(&information.dataset_id)
        .api_err("Failed to get dataset rows")?
        .map(preview_of);

    Ok::<_, ApiError>(Json(ApiResponse::success(DatasetDetailResponse {
        information,
        preview,
    })))
}

/// Attaches catalogue metadata to an uploaded data document.
pub async fn create_dataset(
    RequireUser { user, external_id }: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDatasetRequest>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, CREATE_ROUTE, Capability::Contributor)?;

    if req.dataset_name.trim().is_empty() {
        return Err(ApiError::bad_request("Dataset name must not be empty"));
    }

    state
        .store
        .get_data_document(&req.dataset_id)
        .api_err("Failed to get dataset rows")?
        .or_not_found("Dataset not found")?;

    let existing = state
        .store
        .get_dataset_info_by_dataset_id(&req.dataset_id)
        .api_err("Failed to get dataset")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Dataset already has catalogue information"));
    }

    let now = Utc::now();
    let info = DatasetInformation {
        id: Uuid::new_v4().to_string(),
        dataset_id: req.dataset_id,
        dataset_name: req.dataset_name,
        file_id: req.file_id.filter(|f| !f.is_empty()),
        description: req.description.unwrap_or_default(),
        tags: req.tags,
        dataset_type: req.dataset_type,
        permissions: req.permission,
        is_spatial: req.is_spatial,
        is_temporal: req.is_temporal,
        temporal_granularities: req.temporal_granularities,
        spatial_granularities: req.spatial_granularities,
        location_columns: req.location_columns,
        time_columns: req.time_columns,
        pulled_from_pipeline: false,
        pipeline_id: None,
        owner_ids: vec![user.id],
        created_at: now,
        updated_at: now,
    };

    state
        .store
        .insert_dataset_info(&info)
        .api_err("Failed to create dataset information")?;

    tracing::info!("Catalogued dataset {} as '{}'", info.dataset_id, info.dataset_name);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(info))))
}

pub async fn get_dataset_columns(
    RequireUser { external_id, .. }: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DatasetColumnsParams>,
) -> impl IntoResponse {
    require_capability(&state, &external_id, BROWSE_ROUTE, Capability::Viewer)?;

    let doc = state
        .store
        .get_data_document(&params.dataset_id)
        .api_err("Failed to get dataset rows")?
        .or_not_found("Dataset not found")?;

    let columns = matching_columns(doc.columns, params.search.as_deref(), COLUMN_MATCHES);

    Ok::<_, ApiError>(Json(ApiResponse::success(DatasetColumnsResponse { columns })))
}

/// Columns containing `search`, ignoring case, up to `limit`.
fn matching_columns(columns: Vec<String>, search: Option<&str>, limit: usize) -> Vec<String> {
    let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);
    columns
        .into_iter()
        .filter(|c| needle.as_ref().is_none_or(|n| c.to_lowercase().contains(n.as_str())))
        .take(limit)
        .collect()
}

/// The first rows and columns of a data document.
fn preview_of(doc: DataDocument) -> DatasetPreview {
    let columns: Vec<String> = doc.columns.into_iter().take(PREVIEW_COLUMNS).collect();
    let rows = doc
        .rows
        .into_iter()
        .take(PREVIEW_ROWS)
        .map(|mut row| {
            columns
                .iter()
                .filter_map(|c| row.remove_entry(c))
                .collect::<Map<_, _>>()
        })
        .collect();

    DatasetPreview {
        columns,
        rows,
        record_count: doc.record_count,
        updated_at: doc.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_preview_is_capped() {
        let columns: Vec<String> = (0..12).map(|i| format!("c{i}")).collect();
        let rows: Vec<Map<String, Value>> = (0..15)
            .map(|r| columns.iter().map(|c| (c.clone(), json!(r))).collect())
            .collect();
        let now = Utc::now();

        let preview = preview_of(DataDocument {
            id: "d1".to_string(),
            record_count: rows.len() as i64,
            rows,
            columns,
            created_at: now,
            updated_at: now,
        });

        assert_eq!(preview.columns.len(), 10);
        assert_eq!(preview.rows.len(), 10);
        assert!(preview.rows.iter().all(|r| r.len() == 10));
        assert!(!preview.rows[0].contains_key("c11"));
        assert_eq!(preview.record_count, 15);
    }

    #[test]
    fn test_matching_columns() {
        let columns: Vec<String> = ["Region", "sub_region", "sales", "REGION_CODE"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        assert_eq!(
            matching_columns(columns.clone(), Some("region"), 10),
            vec!["Region", "sub_region", "REGION_CODE"]
        );
        assert_eq!(matching_columns(columns.clone(), Some("REG"), 2), vec!["Region", "sub_region"]);
        assert_eq!(matching_columns(columns.clone(), Some(""), 10).len(), 4);
        assert!(matching_columns(columns, Some("missing"), 10).is_empty());

        let many: Vec<String> = (0..25).map(|i| format!("c{i}")).collect();
        assert_eq!(matching_columns(many, None, 10).len(), 10);
    }
}
