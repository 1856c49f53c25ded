use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::dataset::{UpsertOutcome, UpsertTarget, upsert_dataset};
use super::history::{HistoryKey, record_history_entry};
use super::source::DatasetSource;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{ExecutionHistoryEntry, ExecutionStatus};

/// What to pull and on whose behalf.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Dataset the pulled rows are stored under.
    pub dataset_id: String,
    /// Name pulled from the ERP; also names the pipeline in history.
    pub dataset_name: String,
    pub user_id: String,
    /// Recorded on newly created dataset information.
    pub pipeline_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub status: ExecutionStatus,
    pub executed_at: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub execution_id: String,
    #[serde(flatten)]
    pub snapshot: TaskSnapshot,
}

/// A pipeline with its history entries resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineView {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub history: Vec<ExecutionHistoryEntry>,
}

struct TaskEntry {
    snapshot: TaskSnapshot,
    pipeline_id: String,
    dataset_id: String,
}

impl TaskEntry {
    fn belongs_to(&self, pipeline_id: &str) -> bool {
        self.pipeline_id == pipeline_id || self.dataset_id == pipeline_id
    }
}

/// Runs pipeline pulls in the background and answers status queries.
///
/// The in-memory task table answers for runs started by this process; the
/// store answers for everything else, so status survives restarts.
pub struct TaskExecutor {
    store: Arc<dyn Store>,
    source: Arc<dyn DatasetSource>,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    permits: Arc<Semaphore>,
    running: Mutex<JoinSet<()>>,
}

impl TaskExecutor {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn DatasetSource>, max_concurrent_runs: usize) -> Self {
        Self {
            store,
            source,
            tasks: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            running: Mutex::new(JoinSet::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handles of spawned runs, with finished ones already reaped.
    fn running(&self) -> MutexGuard<'_, JoinSet<()>> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        while running.try_join_next().is_some() {}
        running
    }

    /// Starts a run and returns without waiting for the pull.
    ///
    /// The `running` history entry is written before returning, so a status
    /// query issued right after never misses the run.
    pub fn submit(self: &Arc<Self>, request: RunRequest) -> Result<Submission> {
        if request.dataset_id.trim().is_empty() || request.dataset_name.trim().is_empty() {
            return Err(Error::Validation(
                "pipeline id and name must not be empty".to_string(),
            ));
        }
        if request.user_id.trim().is_empty() {
            return Err(Error::Validation("user id must not be empty".to_string()));
        }
        if let Some(pipeline) = self.store.get_pipeline_by_name(&request.dataset_name)? {
            if !pipeline.enabled {
                return Err(Error::Validation(format!(
                    "pipeline '{}' is disabled",
                    pipeline.name
                )));
            }
        }

        let execution_id = Uuid::new_v4().to_string();
        let pipeline = record_history_entry(
            self.store.as_ref(),
            history_key(&execution_id, &request),
            ExecutionStatus::Running,
        )?;

        let snapshot = TaskSnapshot {
            status: ExecutionStatus::Running,
            executed_at: Utc::now(),
            user_id: request.user_id.clone(),
        };
        self.tasks().insert(
            execution_id.clone(),
            TaskEntry {
                snapshot: snapshot.clone(),
                pipeline_id: pipeline.id.clone(),
                dataset_id: request.dataset_id.clone(),
            },
        );

        let span = tracing::info_span!(
            "pipeline_run",
            execution_id = %execution_id,
            pipeline = %request.dataset_name
        );
        let executor = Arc::clone(self);
        let id = execution_id.clone();
        self.running()
            .spawn(async move { executor.run(id, request).await }.instrument(span));

        tracing::info!(
            "Submitted run {execution_id} of pipeline {} ({})",
            pipeline.name,
            pipeline.id
        );
        Ok(Submission {
            execution_id,
            snapshot,
        })
    }

    async fn run(self: Arc<Self>, execution_id: String, request: RunRequest) {
        let status = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(_permit) => {
                tracing::info!("Starting pull for dataset {}", request.dataset_id);
                match self.pull_and_store(&request).await {
                    Ok((count, outcome)) => {
                        tracing::info!("Stored {count} records ({outcome:?})");
                        ExecutionStatus::Completed
                    }
                    Err(e) => {
                        tracing::error!("Pipeline run failed: {e}");
                        ExecutionStatus::Error
                    }
                }
            }
            Err(_) => {
                tracing::error!("Executor closed before the run could start");
                ExecutionStatus::Error
            }
        };

        self.set_status(&execution_id, status);
        match record_history_entry(
            self.store.as_ref(),
            history_key(&execution_id, &request),
            status,
        ) {
            // The store answers for the run from here on.
            Ok(_) => {
                self.tasks().remove(&execution_id);
            }
            Err(e) => tracing::error!("Failed to record {status} status: {e}"),
        }
    }

    async fn pull_and_store(&self, request: &RunRequest) -> Result<(usize, UpsertOutcome)> {
        let pulled = self.source.pull_dataset(&request.dataset_name).await?;
        tracing::info!("Pulled {} records", pulled.len());

        let columns = pulled.columns.clone();
        let records = pulled.into_records();
        let count = records.len();

        let store = Arc::clone(&self.store);
        let request = request.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let target = UpsertTarget {
                dataset_id: &request.dataset_id,
                dataset_name: &request.dataset_name,
                pipeline_id: request.pipeline_id.as_deref(),
                user_id: &request.user_id,
            };
            upsert_dataset(store.as_ref(), target, &records, &columns)
        })
        .await
        .map_err(|e| Error::Internal(format!("dataset upsert task failed: {e}")))??;

        Ok((count, outcome))
    }

    fn set_status(&self, execution_id: &str, status: ExecutionStatus) {
        let mut tasks = self.tasks();
        let Some(entry) = tasks.get_mut(execution_id) else {
            return;
        };
        if entry.snapshot.status.can_transition_to(status) {
            entry.snapshot.status = status;
        } else {
            tracing::warn!(
                "Refused status change {} -> {status} for {execution_id}",
                entry.snapshot.status
            );
        }
    }

    /// In-memory view of a run started by this process. Finished runs leave
    /// the table once their final status is persisted.
    pub fn snapshot(&self, execution_id: &str) -> Option<TaskSnapshot> {
        self.tasks().get(execution_id).map(|e| e.snapshot.clone())
    }

    /// Status of `execution_id`, which must belong to `pipeline_id`. The
    /// pipeline may be named by its record id or by the dataset id the run
    /// was submitted with.
    pub fn get_status(&self, pipeline_id: &str, execution_id: &str) -> Result<ExecutionStatus> {
        Uuid::parse_str(execution_id)
            .map_err(|_| Error::Validation(format!("invalid execution id '{execution_id}'")))?;

        if let Some(entry) = self.tasks().get(execution_id) {
            return if entry.belongs_to(pipeline_id) {
                Ok(entry.snapshot.status)
            } else {
                Err(Error::NotFound)
            };
        }

        let entry = self
            .store
            .get_history_entry(execution_id)?
            .ok_or(Error::NotFound)?;
        if entry.pipeline_id == pipeline_id || entry.dataset_id == pipeline_id {
            Ok(entry.status)
        } else {
            Err(Error::NotFound)
        }
    }

    /// Pipelines whose name contains `name`, each with the history entries
    /// created at or after `since`.
    pub fn list_pipelines(
        &self,
        name: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PipelineView>> {
        self.store
            .list_pipelines(name)?
            .into_iter()
            .map(|p| {
                let history = self.store.list_pipeline_history(&p.id, since.as_ref())?;
                Ok(PipelineView {
                    id: p.id,
                    name: p.name,
                    enabled: p.enabled,
                    created_at: p.created_at,
                    history,
                })
            })
            .collect()
    }

    pub fn set_enabled(&self, pipeline_id: &str, enabled: bool) -> Result<()> {
        self.store.set_pipeline_enabled(pipeline_id, enabled)?;
        tracing::info!("Pipeline {pipeline_id} enabled={enabled}");
        Ok(())
    }

    /// Number of runs still in flight.
    pub fn in_flight(&self) -> usize {
        self.running().len()
    }

    /// Waits up to `grace` for in-flight runs and returns how many were
    /// still going when it gave up. Those are aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let mut running = std::mem::take(&mut *self.running());

        if !running.is_empty() {
            tracing::info!(
                "Waiting up to {}s for {} pipeline runs",
                grace.as_secs(),
                running.len()
            );
        }
        let drained = tokio::time::timeout(grace, async {
            while running.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => 0,
            Err(_) => running.len(),
        }
    }
}

fn history_key<'a>(execution_id: &'a str, request: &'a RunRequest) -> HistoryKey<'a> {
    HistoryKey {
        pipeline_name: &request.dataset_name,
        execution_id,
        dataset_id: &request.dataset_id,
        user_id: &request.user_id,
    }
}
