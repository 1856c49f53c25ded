//! Asynchronous pipeline runs that re-pull datasets from the ERP source.

mod dataset;
mod executor;
mod history;
mod source;

pub use dataset::{UpsertOutcome, UpsertTarget, upsert_dataset};
pub use executor::{PipelineView, RunRequest, Submission, TaskExecutor, TaskSnapshot};
pub use history::{HistoryKey, find_or_create_pipeline, record_history_entry};
pub use source::{DatasetSource, HttpErpSource, PullFuture, TabularRows};
