use crate::report::{ReportContext, mark_error, run_report};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A queued report run, identified by its job token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTask {
    pub report_id: String,
}

#[derive(Debug, Clone)]
pub struct ReportQueue {
    tx: mpsc::UnboundedSender<ReportTask>,
}

impl ReportQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReportTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hands the task to the worker. Fails only once the worker has stopped.
    pub fn enqueue(&self, task: ReportTask) -> Result<(), ReportTask> {
        self.tx.send(task).map_err(|err| err.0)
    }
}

/// Spawn the worker that runs queued reports.
///
/// Every task runs independently on the blocking pool, so concurrent reports
/// do not wait on each other. There is no retry: a task lost to a crash
/// leaves its job `Running`.
pub fn spawn_report_worker(
    mut rx: mpsc::UnboundedReceiver<ReportTask>,
    ctx: ReportContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let registry = ctx.registry.clone();
                let report_id = task.report_id;
                let run_id = report_id.clone();
                match tokio::task::spawn_blocking(move || run_report(&ctx, &run_id)).await {
                    Ok(status) => info!(report_id = %report_id, status = %status, "Report task finished"),
                    Err(err) => {
                        error!(report_id = %report_id, error = %err, "Report task aborted");
                        mark_error(registry.as_ref(), &report_id);
                    }
                }
            });
        }
        info!("Report queue closed, worker stopping");
    })
}
