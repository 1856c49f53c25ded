use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{DataDocument, DatasetInformation};

/// Which branch of the dataset upsert applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Rows replaced under the requested id. `info_created` is set when the
    /// data had no information record yet.
    UpdatedById { info_created: bool },
    /// No data under the requested id, but a dataset with the same name
    /// exists under `target_id`; rows were written there instead.
    MergedByName { target_id: String },
    /// Fresh data and information records.
    Created,
}

/// Where pulled rows land and who pulled them.
#[derive(Debug, Clone, Copy)]
pub struct UpsertTarget<'a> {
    pub dataset_id: &'a str,
    pub dataset_name: &'a str,
    pub pipeline_id: Option<&'a str>,
    pub user_id: &'a str,
}

/// Stores pulled rows without ever creating a second copy of a dataset that
/// is already known by id or by name.
pub fn upsert_dataset(
    store: &dyn Store,
    target: UpsertTarget<'_>,
    rows: &[Map<String, Value>],
    columns: &[String],
) -> Result<UpsertOutcome> {
    let now = Utc::now();

    if store.get_data_document(target.dataset_id)?.is_some() {
        store.replace_data_rows(target.dataset_id, rows, columns, &now)?;

        let info_created = match store.get_dataset_info_by_dataset_id(target.dataset_id)? {
            Some(info) => {
                store.mark_dataset_info_pulled(&info.id, &now)?;
                store.add_dataset_owner(&info.id, target.user_id)?;
                false
            }
            None => {
                store.insert_dataset_info(&DatasetInformation::for_pipeline(
                    Uuid::new_v4().to_string(),
                    target.dataset_id,
                    target.dataset_name,
                    target.pipeline_id,
                    target.user_id,
                    now,
                ))?;
                true
            }
        };
        return Ok(UpsertOutcome::UpdatedById { info_created });
    }

    let by_name = store.get_dataset_info_by_name(target.dataset_name)?;

    if let Some(info) = by_name.as_ref().filter(|i| i.dataset_id != target.dataset_id) {
        if !store.replace_data_rows(&info.dataset_id, rows, columns, &now)? {
            tracing::warn!(
                "Dataset {} has no data under {}; rows for {} were not stored",
                target.dataset_name,
                info.dataset_id,
                target.dataset_id
            );
        }
        store.mark_dataset_info_pulled(&info.id, &now)?;
        store.add_dataset_owner(&info.id, target.user_id)?;
        return Ok(UpsertOutcome::MergedByName {
            target_id: info.dataset_id.clone(),
        });
    }

    create_dataset(store, target, rows, columns, &now)?;
    Ok(UpsertOutcome::Created)
}

/// Writes a new data document. A run that loses the race to create the same
/// id overwrites the winner's rows instead of failing.
fn create_dataset(
    store: &dyn Store,
    target: UpsertTarget<'_>,
    rows: &[Map<String, Value>],
    columns: &[String],
    now: &DateTime<Utc>,
) -> Result<()> {
    let record_count = i64::try_from(rows.len()).map_err(|e| Error::Internal(e.to_string()))?;
    let inserted = store.insert_data_document(&DataDocument {
        id: target.dataset_id.to_string(),
        rows: rows.to_vec(),
        columns: columns.to_vec(),
        record_count,
        created_at: *now,
        updated_at: *now,
    });
    match inserted {
        Ok(()) => {}
        Err(Error::AlreadyExists) => {
            tracing::debug!("Dataset {} created concurrently; replacing rows", target.dataset_id);
            store.replace_data_rows(target.dataset_id, rows, columns, now)?;
        }
        Err(e) => return Err(e),
    }

    // An information record left behind without its data is reused.
    match store.get_dataset_info_by_dataset_id(target.dataset_id)? {
        Some(info) => {
            store.mark_dataset_info_pulled(&info.id, now)?;
            store.add_dataset_owner(&info.id, target.user_id)?;
        }
        None => {
            store.insert_dataset_info(&DatasetInformation::for_pipeline(
                Uuid::new_v4().to_string(),
                target.dataset_id,
                target.dataset_name,
                target.pipeline_id,
                target.user_id,
                *now,
            ))?;
        }
    }
    Ok(())
}
