use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{
    Capabilities, DatasetInformation, ExecutionStatus, SpatialGranularity, TemporalGranularity, User,
};

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleCheckRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RunPipelineRequest {
    pub pipeline_id: String,
    pub pipeline_name: String,
    /// Acting user; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PipelineStatusResponse {
    pub status: ExecutionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPipelinesParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPipelineEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub role_name: String,
}

#[derive(Debug, Serialize)]
pub struct SyncUserResponse {
    #[serde(flatten)]
    pub user: User,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpsertAccessRuleRequest {
    pub role: String,
    pub endpoint: String,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccessRulesParams {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccessRuleParams {
    pub role: String,
    pub endpoint: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetUserRoleRequest {
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDatasetsParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

/// Catalogue metadata for a data document that has no information record.
#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub dataset_id: String,
    #[serde(default)]
    pub file_id: Option<String>,
    pub dataset_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub dataset_type: String,
    pub permission: String,
    #[serde(default)]
    pub is_spatial: bool,
    #[serde(default)]
    pub is_temporal: bool,
    #[serde(default)]
    pub temporal_granularities: Vec<TemporalGranularity>,
    #[serde(default)]
    pub spatial_granularities: Vec<SpatialGranularity>,
    #[serde(default)]
    pub location_columns: Vec<String>,
    #[serde(default)]
    pub time_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetColumnsParams {
    pub dataset_id: String,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetColumnsResponse {
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub record_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DatasetDetailResponse {
    pub information: DatasetInformation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<DatasetPreview>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
