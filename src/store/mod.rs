//! Storage seams consumed by the estimator and the report job.
//!
//! Both traits are synchronous: implementations are expected to be cheap to
//! call from the blocking pool and never hold a lock across calls.

use crate::model::{BusinessInterval, JobStatus, Observation, ReportJob, StoreId};
use jiff::Timestamp;
use thiserror::Error;

pub mod memory;

pub use memory::{MemoryJobRegistry, MemoryStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("report job already exists: {0}")]
    JobAlreadyExists(String),
    #[error("report job not found: {0}")]
    JobNotFound(String),
    #[error("report job {report_id} already finished with status {status}")]
    JobAlreadyTerminal { report_id: String, status: JobStatus },
}

/// Read-only access to polls, business hours and timezones.
pub trait ObservationStore: Send + Sync {
    /// Observations for `store_id` with `start <= timestamp <= end`, oldest first.
    fn observations_in_range(
        &self,
        store_id: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Distinct store ids seen in the observation data, in a stable order.
    fn all_store_ids(&self) -> Result<Vec<StoreId>, StoreError>;

    fn business_intervals(&self, store_id: &str) -> Result<Vec<BusinessInterval>, StoreError>;

    fn timezone(&self, store_id: &str) -> Result<Option<String>, StoreError>;

    fn max_observation_timestamp(&self) -> Result<Option<Timestamp>, StoreError>;
}

/// Report job records.
///
/// Implementations own the state machine: a job is created `Running` and can
/// move to `Complete` or `Error` exactly once. Each transition must be a
/// single atomic update so readers never see a half-written record.
pub trait JobRegistry: Send + Sync {
    fn create_job(&self, report_id: &str) -> Result<ReportJob, StoreError>;

    fn get_job(&self, report_id: &str) -> Result<Option<ReportJob>, StoreError>;

    fn set_job_complete(&self, report_id: &str) -> Result<ReportJob, StoreError>;

    fn set_job_error(&self, report_id: &str) -> Result<ReportJob, StoreError>;
}
