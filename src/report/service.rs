use crate::error::AppError;
use crate::model::JobStatus;
use crate::report::artifact::artifact_path;
use crate::report::queue::{ReportQueue, ReportTask};
use crate::report::mark_error;
use crate::store::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What a client learns when polling a report token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Running,
    Ready(PathBuf),
    Failed,
    NotFound,
    /// The job completed but its artifact is gone.
    ArtifactMissing(PathBuf),
}

/// Entry point for the request layer: start reports and poll their status.
pub struct ReportService {
    registry: Arc<dyn JobRegistry>,
    queue: ReportQueue,
    output_dir: PathBuf,
}

impl ReportService {
    pub fn new(registry: Arc<dyn JobRegistry>, queue: ReportQueue, output_dir: PathBuf) -> Self {
        Self {
            registry,
            queue,
            output_dir,
        }
    }

    /// Create a `Running` job and queue it. Never waits for the report itself.
    pub fn trigger(&self) -> Result<String, AppError> {
        let report_id = Uuid::new_v4().to_string();
        self.registry.create_job(&report_id)?;
        info!(report_id = %report_id, "Triggered new report");

        let task = ReportTask {
            report_id: report_id.clone(),
        };
        if self.queue.enqueue(task).is_err() {
            error!(report_id = %report_id, "Report queue closed, job cannot run");
            mark_error(self.registry.as_ref(), &report_id);
            return Err(AppError::QueueClosed);
        }
        Ok(report_id)
    }

    pub fn poll(&self, report_id: &str) -> PollOutcome {
        let job = match self.registry.get_job(report_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(report_id, "Report not found");
                return PollOutcome::NotFound;
            }
            Err(err) => {
                error!(report_id, error = %err, "Failed to read report status");
                return PollOutcome::Failed;
            }
        };

        match job.status {
            JobStatus::Running => PollOutcome::Running,
            JobStatus::Error => PollOutcome::Failed,
            JobStatus::Complete => {
                let path = artifact_path(&self.output_dir, report_id);
                if path.is_file() {
                    PollOutcome::Ready(path)
                } else {
                    error!(report_id, path = %path.display(), "Report artifact missing");
                    PollOutcome::ArtifactMissing(path)
                }
            }
        }
    }
}
