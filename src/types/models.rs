use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Capabilities, ExecutionStatus};

/// Name of the role every user falls back to.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Subject issued by the identity provider. Unique and immutable.
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Profile fields supplied by the identity provider on sign-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Capabilities a role holds on every route under `endpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub role: String,
    pub endpoint: String,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Execution ids of this pipeline's runs, oldest first.
    pub history: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub execution_id: String,
    pub pipeline_id: String,
    /// Dataset the run was submitted against.
    pub dataset_id: String,
    pub status: ExecutionStatus,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw rows of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDocument {
    pub id: String,
    pub rows: Vec<Map<String, Value>>,
    pub columns: Vec<String>,
    pub record_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalGranularity {
    Year,
    Month,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialGranularity {
    Country,
    State,
    District,
    Village,
    LatLong,
}

/// Catalogue metadata describing a data document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInformation {
    pub id: String,
    pub dataset_id: String,
    pub dataset_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub dataset_type: String,
    pub permissions: String,
    pub is_spatial: bool,
    pub is_temporal: bool,
    pub temporal_granularities: Vec<TemporalGranularity>,
    pub spatial_granularities: Vec<SpatialGranularity>,
    pub location_columns: Vec<String>,
    pub time_columns: Vec<String>,
    pub pulled_from_pipeline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    /// Owner set; never holds the same user id twice.
    pub owner_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetInformation {
    /// A fresh record for a dataset produced by a pipeline pull.
    #[must_use]
    pub fn for_pipeline(
        id: String,
        dataset_id: &str,
        dataset_name: &str,
        pipeline_id: Option<&str>,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            dataset_id: dataset_id.to_string(),
            dataset_name: dataset_name.to_string(),
            file_id: None,
            description: String::new(),
            tags: Vec::new(),
            dataset_type: String::new(),
            permissions: "public".to_string(),
            is_spatial: false,
            is_temporal: false,
            temporal_granularities: Vec::new(),
            spatial_granularities: Vec::new(),
            location_columns: Vec::new(),
            time_columns: Vec::new(),
            pulled_from_pipeline: true,
            pipeline_id: pipeline_id.map(str::to_string),
            owner_ids: vec![owner_id.to_string()],
            created_at: now,
            updated_at: now,
        }
    }
}
