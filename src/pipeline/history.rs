use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{ExecutionHistoryEntry, ExecutionStatus, Pipeline};

/// Finds the pipeline by name, creating an enabled one with empty history
/// if it does not exist yet.
pub fn find_or_create_pipeline(store: &dyn Store, name: &str) -> Result<Pipeline> {
    if let Some(pipeline) = store.get_pipeline_by_name(name)? {
        return Ok(pipeline);
    }

    let pipeline = Pipeline {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        enabled: true,
        history: Vec::new(),
        created_at: Utc::now(),
    };

    match store.create_pipeline(&pipeline) {
        Ok(()) => {
            tracing::info!("Created pipeline {name} ({})", pipeline.id);
            Ok(pipeline)
        }
        Err(Error::AlreadyExists) => store.get_pipeline_by_name(name)?.ok_or(Error::NotFound),
        Err(e) => Err(e),
    }
}

/// A run's identity as recorded in history.
#[derive(Debug, Clone, Copy)]
pub struct HistoryKey<'a> {
    pub pipeline_name: &'a str,
    pub execution_id: &'a str,
    pub dataset_id: &'a str,
    pub user_id: &'a str,
}

/// Records `status` for an execution, creating the pipeline and the entry
/// as needed. Repeating a call with the same status changes nothing but
/// the timestamp; a terminal status is never overwritten.
pub fn record_history_entry(
    store: &dyn Store,
    key: HistoryKey<'_>,
    status: ExecutionStatus,
) -> Result<Pipeline> {
    let pipeline = find_or_create_pipeline(store, key.pipeline_name)?;
    let now = Utc::now();

    if store.get_history_entry(key.execution_id)?.is_none() {
        let entry = ExecutionHistoryEntry {
            execution_id: key.execution_id.to_string(),
            pipeline_id: pipeline.id.clone(),
            dataset_id: key.dataset_id.to_string(),
            status,
            user_id: key.user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        match store.create_history_entry(&entry) {
            Ok(()) => {
                store.append_pipeline_history(&pipeline.id, key.execution_id)?;
                return Ok(pipeline);
            }
            Err(Error::AlreadyExists) => {}
            Err(e) => return Err(e),
        }
    }

    if !store.update_history_status(key.execution_id, status, &now)? {
        tracing::warn!(
            "Ignored status {status} for execution {}: already terminal",
            key.execution_id
        );
    }
    store.append_pipeline_history(&pipeline.id, key.execution_id)?;
    Ok(pipeline)
}
