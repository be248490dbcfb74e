//! Report generation: estimate every store, write the CSV artifact and move
//! the job to its terminal state.

use crate::estimation::{self, DEFAULT_TIMEZONE};
use crate::model::{JobStatus, ReportRow, StoreId};
use crate::store::{JobRegistry, ObservationStore, StoreError};
use jiff::Timestamp;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod artifact;
pub mod queue;
pub mod service;

pub use queue::{ReportQueue, ReportTask, spawn_report_worker};
pub use service::{PollOutcome, ReportService};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_OUTPUT_DIR: &str = "reports";

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    /// Stores per progress log line; has no effect on the result.
    pub batch_size: usize,
    pub default_timezone: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Everything a report run needs, shared by all jobs.
#[derive(Clone)]
pub struct ReportContext {
    pub store: Arc<dyn ObservationStore>,
    pub registry: Arc<dyn JobRegistry>,
    pub settings: Arc<ReportSettings>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to enumerate stores: {0}")]
    Enumerate(#[source] StoreError),
    #[error("failed to write report artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to mark report complete: {0}")]
    Complete(#[source] StoreError),
}

/// Run one report job to its terminal state and return that state.
///
/// Per-store failures become zero rows; anything else marks the job `Error`.
pub fn run_report(ctx: &ReportContext, report_id: &str) -> JobStatus {
    info!(report_id, "Starting report generation");
    match generate_report(ctx, report_id) {
        Ok(path) => {
            info!(report_id, path = %path.display(), "Report generation completed");
            JobStatus::Complete
        }
        Err(err) => {
            error!(report_id, error = %err, "Report generation failed");
            mark_error(ctx.registry.as_ref(), report_id);
            JobStatus::Error
        }
    }
}

fn generate_report(ctx: &ReportContext, report_id: &str) -> Result<PathBuf, ReportError> {
    let store = ctx.store.as_ref();
    let now = report_time(store);
    info!(report_id, now = %now, "Using latest observation as report time");

    let store_ids = store.all_store_ids().map_err(ReportError::Enumerate)?;
    let rows = generate_rows(store, &store_ids, now, &ctx.settings, report_id);

    let path = artifact::artifact_path(&ctx.settings.output_dir, report_id);
    info!(report_id, path = %path.display(), rows = rows.len(), "Writing report");
    artifact::write_artifact(&path, &rows).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;

    ctx.registry
        .set_job_complete(report_id)
        .map_err(ReportError::Complete)?;
    Ok(path)
}

/// The latest stored observation time, or the wall clock when there is none.
pub fn report_time(store: &dyn ObservationStore) -> Timestamp {
    match store.max_observation_timestamp() {
        Ok(Some(latest)) => latest,
        Ok(None) => Timestamp::now(),
        Err(err) => {
            warn!(error = %err, "Failed to read latest observation time, using current time");
            Timestamp::now()
        }
    }
}

/// One row per store id, in the order given.
pub fn generate_rows(
    store: &dyn ObservationStore,
    store_ids: &[StoreId],
    now: Timestamp,
    settings: &ReportSettings,
    report_id: &str,
) -> Vec<ReportRow> {
    let batch_size = settings.batch_size.max(1);
    let batches = store_ids.len().div_ceil(batch_size);
    info!(report_id, stores = store_ids.len(), batches, "Processing stores");

    let mut rows = Vec::with_capacity(store_ids.len());
    for (index, batch) in store_ids.chunks(batch_size).enumerate() {
        info!(report_id, batch = index + 1, batches, "Processing batch");
        for store_id in batch {
            let summary =
                estimation::estimate_or_zero(store, store_id, now, &settings.default_timezone);
            rows.push(ReportRow {
                store_id: store_id.clone(),
                summary,
            });
        }
        let progress_percent = (rows.len() * 100 / store_ids.len()).min(100);
        info!(report_id, progress_percent, "Report progress");
    }
    rows
}

/// Best-effort transition to `Error`; a missing record is only logged.
pub(crate) fn mark_error(registry: &dyn JobRegistry, report_id: &str) {
    match registry.set_job_error(report_id) {
        Ok(_) => {}
        Err(StoreError::JobNotFound(_)) => {
            error!(report_id, "Report record missing, cannot record failure");
        }
        Err(err) => {
            error!(report_id, error = %err, "Failed to update report status");
        }
    }
}
