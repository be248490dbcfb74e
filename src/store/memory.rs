use crate::model::{BusinessInterval, JobStatus, Observation, ReportJob, StoreId};
use crate::store::{JobRegistry, ObservationStore, StoreError};
use jiff::Timestamp;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct StoreData {
    observations: BTreeMap<StoreId, Vec<Observation>>,
    business_hours: HashMap<StoreId, Vec<BusinessInterval>>,
    timezones: HashMap<StoreId, String>,
}

/// In-process observation store, filled by the CSV loader or by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_observations(
        &self,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<(), StoreError> {
        let mut guard = self.data.write().map_err(|_| poisoned())?;
        let mut touched = HashSet::new();
        for observation in observations {
            if !touched.contains(&observation.store_id) {
                touched.insert(observation.store_id.clone());
            }
            guard
                .observations
                .entry(observation.store_id.clone())
                .or_default()
                .push(observation);
        }
        for store_id in touched {
            if let Some(series) = guard.observations.get_mut(&store_id) {
                series.sort_by_key(|observation| observation.timestamp);
            }
        }
        Ok(())
    }

    pub fn insert_business_intervals(
        &self,
        intervals: impl IntoIterator<Item = BusinessInterval>,
    ) -> Result<(), StoreError> {
        let mut guard = self.data.write().map_err(|_| poisoned())?;
        for interval in intervals {
            guard
                .business_hours
                .entry(interval.store_id.clone())
                .or_default()
                .push(interval);
        }
        Ok(())
    }

    /// Records a zone for a store. The first zone recorded for a store wins.
    pub fn insert_timezone(
        &self,
        store_id: impl Into<StoreId>,
        zone: impl Into<String>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.data.write().map_err(|_| poisoned())?;
        let store_id = store_id.into();
        if guard.timezones.contains_key(&store_id) {
            return Ok(false);
        }
        guard.timezones.insert(store_id, zone.into());
        Ok(true)
    }

    pub fn observation_count(&self) -> Result<usize, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard.observations.values().map(Vec::len).sum())
    }

    pub fn business_interval_count(&self) -> Result<usize, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard.business_hours.values().map(Vec::len).sum())
    }

    pub fn timezone_count(&self) -> Result<usize, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard.timezones.len())
    }
}

impl ObservationStore for MemoryStore {
    fn observations_in_range(
        &self,
        store_id: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Observation>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        let Some(series) = guard.observations.get(store_id) else {
            return Ok(Vec::new());
        };
        let first = series.partition_point(|observation| observation.timestamp < start);
        Ok(series[first..]
            .iter()
            .take_while(|observation| observation.timestamp <= end)
            .cloned()
            .collect())
    }

    fn all_store_ids(&self) -> Result<Vec<StoreId>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard.observations.keys().cloned().collect())
    }

    fn business_intervals(&self, store_id: &str) -> Result<Vec<BusinessInterval>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard
            .business_hours
            .get(store_id)
            .cloned()
            .unwrap_or_default())
    }

    fn timezone(&self, store_id: &str) -> Result<Option<String>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard.timezones.get(store_id).cloned())
    }

    fn max_observation_timestamp(&self) -> Result<Option<Timestamp>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned())?;
        Ok(guard
            .observations
            .values()
            .filter_map(|series| series.last())
            .map(|observation| observation.timestamp)
            .max())
    }
}

/// In-process job table. Every mutation happens under one write lock.
#[derive(Debug, Default)]
pub struct MemoryJobRegistry {
    jobs: RwLock<HashMap<String, ReportJob>>,
}

impl MemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&self, report_id: &str, status: JobStatus) -> Result<ReportJob, StoreError> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| StoreError::Unavailable("job registry lock poisoned".to_string()))?;
        let job = guard
            .get_mut(report_id)
            .ok_or_else(|| StoreError::JobNotFound(report_id.to_string()))?;
        if job.status.is_terminal() {
            return Err(StoreError::JobAlreadyTerminal {
                report_id: report_id.to_string(),
                status: job.status,
            });
        }
        job.status = status;
        job.completed_at = Some(Timestamp::now());
        Ok(job.clone())
    }
}

impl JobRegistry for MemoryJobRegistry {
    fn create_job(&self, report_id: &str) -> Result<ReportJob, StoreError> {
        let mut guard = self
            .jobs
            .write()
            .map_err(|_| StoreError::Unavailable("job registry lock poisoned".to_string()))?;
        if guard.contains_key(report_id) {
            return Err(StoreError::JobAlreadyExists(report_id.to_string()));
        }
        let job = ReportJob {
            report_id: report_id.to_string(),
            status: JobStatus::Running,
            created_at: Timestamp::now(),
            completed_at: None,
        };
        guard.insert(report_id.to_string(), job.clone());
        Ok(job)
    }

    fn get_job(&self, report_id: &str) -> Result<Option<ReportJob>, StoreError> {
        let guard = self
            .jobs
            .read()
            .map_err(|_| StoreError::Unavailable("job registry lock poisoned".to_string()))?;
        Ok(guard.get(report_id).cloned())
    }

    fn set_job_complete(&self, report_id: &str) -> Result<ReportJob, StoreError> {
        self.finish(report_id, JobStatus::Complete)
    }

    fn set_job_error(&self, report_id: &str) -> Result<ReportJob, StoreError> {
        self.finish(report_id, JobStatus::Error)
    }
}
