mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Each method is atomic on its own. Callers composing several calls get no
/// multi-statement transaction.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user_role(&self, id: &str, role_id: &str) -> Result<()>;

    // Role operations
    fn create_role(&self, role: &Role) -> Result<()>;
    fn get_role(&self, id: &str) -> Result<Option<Role>>;
    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    fn list_roles(&self) -> Result<Vec<Role>>;

    // Access rule operations
    /// Inserts the rule unless one already exists for (role, endpoint).
    /// Returns true if it was inserted.
    fn insert_access_rule_if_absent(&self, rule: &AccessRule) -> Result<bool>;
    fn get_access_rule(&self, role: &str, endpoint: &str) -> Result<Option<AccessRule>>;
    /// Rules of one role in insertion order.
    fn list_access_rules(&self, role: &str) -> Result<Vec<AccessRule>>;
    fn list_all_access_rules(&self) -> Result<Vec<AccessRule>>;
    fn upsert_access_rule(&self, rule: &AccessRule) -> Result<()>;
    fn delete_access_rule(&self, role: &str, endpoint: &str) -> Result<bool>;

    // Pipeline operations
    fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()>;
    fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>>;
    fn get_pipeline_by_name(&self, name: &str) -> Result<Option<Pipeline>>;
    /// Pipelines whose name contains `name_filter`, ignoring ASCII case.
    fn list_pipelines(&self, name_filter: Option<&str>) -> Result<Vec<Pipeline>>;
    fn set_pipeline_enabled(&self, id: &str, enabled: bool) -> Result<()>;

    // Execution history operations
    fn create_history_entry(&self, entry: &ExecutionHistoryEntry) -> Result<()>;
    fn append_pipeline_history(&self, pipeline_id: &str, execution_id: &str) -> Result<()>;
    fn get_history_entry(&self, execution_id: &str) -> Result<Option<ExecutionHistoryEntry>>;
    /// Applies the status if it is a legal transition from the stored one.
    /// Returns false when the stored status was left untouched.
    fn update_history_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        updated_at: &DateTime<Utc>,
    ) -> Result<bool>;
    fn list_pipeline_history(
        &self,
        pipeline_id: &str,
        since: Option<&DateTime<Utc>>,
    ) -> Result<Vec<ExecutionHistoryEntry>>;

    // Dataset operations
    fn get_data_document(&self, id: &str) -> Result<Option<DataDocument>>;
    fn insert_data_document(&self, doc: &DataDocument) -> Result<()>;
    /// Overwrites rows, columns and count in place. Returns false if no
    /// document exists under `id`.
    fn replace_data_rows(
        &self,
        id: &str,
        rows: &[Map<String, Value>],
        columns: &[String],
        updated_at: &DateTime<Utc>,
    ) -> Result<bool>;

    // Dataset information operations
    fn get_dataset_info_by_dataset_id(&self, dataset_id: &str) -> Result<Option<DatasetInformation>>;
    fn get_dataset_info_by_name(&self, dataset_name: &str) -> Result<Option<DatasetInformation>>;
    fn insert_dataset_info(&self, info: &DatasetInformation) -> Result<()>;
    fn mark_dataset_info_pulled(&self, info_id: &str, updated_at: &DateTime<Utc>) -> Result<()>;
    /// Adds `user_id` to the owner set. Returns false if it was already there.
    fn add_dataset_owner(&self, info_id: &str, user_id: &str) -> Result<bool>;
    fn list_dataset_info(
        &self,
        search: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<Vec<DatasetInformation>>;
}
