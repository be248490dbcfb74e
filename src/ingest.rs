//! CSV loading for polls, business hours and timezones.
//!
//! Row problems never abort a load: each row parses to a [`RowOutcome`], and
//! skipped rows are logged with their reason. A loader does nothing when the
//! store already holds records of its kind.

use crate::model::{BusinessInterval, Observation, StoreStatus};
use crate::store::{MemoryStore, StoreError};
use jiff::Timestamp;
use jiff::civil::{DateTime, Time};
use jiff::tz::TimeZone;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const STORE_STATUS_FILE: &str = "store_status.csv";
pub const BUSINESS_HOURS_FILE: &str = "menu_hours.csv";
pub const TIMEZONES_FILE: &str = "timezones.csv";

const DAY_COLUMNS: &[&str] = &["day_of_week", "day", "dayOfWeek"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("required file not found: {0}")]
    MissingFile(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{file} is missing column {column}")]
    MissingColumn { file: String, column: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    FieldCount { expected: usize, found: usize },
    EmptyStoreId,
    InvalidTimestamp(String),
    InvalidStatus(String),
    InvalidDay(String),
    InvalidTime(String),
    EmptyZone,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            SkipReason::EmptyStoreId => write!(f, "empty store id"),
            SkipReason::InvalidTimestamp(raw) => write!(f, "could not parse timestamp {raw:?}"),
            SkipReason::InvalidStatus(raw) => write!(f, "unknown status {raw:?}"),
            SkipReason::InvalidDay(raw) => write!(f, "invalid day of week {raw:?}"),
            SkipReason::InvalidTime(raw) => write!(f, "invalid local time {raw:?}"),
            SkipReason::EmptyZone => write!(f, "empty timezone"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<T> {
    Loaded(T),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub already_loaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    pub observations: LoadSummary,
    pub business_hours: LoadSummary,
    pub timezones: LoadSummary,
}

/// Load all three CSV files from `dir` into `store`.
pub fn load_dataset(dir: &Path, store: &MemoryStore) -> Result<DatasetSummary, IngestError> {
    for file in [STORE_STATUS_FILE, BUSINESS_HOURS_FILE, TIMEZONES_FILE] {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(IngestError::MissingFile(path));
        }
    }

    info!(dir = %dir.display(), "Loading dataset");
    let summary = DatasetSummary {
        observations: load_store_status(&dir.join(STORE_STATUS_FILE), store)?,
        business_hours: load_business_hours(&dir.join(BUSINESS_HOURS_FILE), store)?,
        timezones: load_timezones(&dir.join(TIMEZONES_FILE), store)?,
    };
    info!(
        observations = summary.observations.loaded,
        business_hours = summary.business_hours.loaded,
        timezones = summary.timezones.loaded,
        "Dataset loaded"
    );
    Ok(summary)
}

pub fn load_store_status(path: &Path, store: &MemoryStore) -> Result<LoadSummary, IngestError> {
    if store.observation_count()? > 0 {
        info!("Store status data already loaded, skipping");
        return Ok(already_loaded());
    }
    let table = CsvTable::read(path)?;
    let store_col = table.require(&["store_id"])?;
    let status_col = table.require(&["status"])?;
    let timestamp_col = table.require(&["timestamp_utc"])?;

    let mut summary = LoadSummary::default();
    let mut observations = Vec::new();
    for (line, fields) in table.rows() {
        let outcome = table.check_width(fields).unwrap_or_else(|| {
            parse_observation(&fields[store_col], &fields[status_col], &fields[timestamp_col])
        });
        match outcome {
            RowOutcome::Loaded(observation) => observations.push(observation),
            RowOutcome::Skipped(reason) => record_skip(&mut summary, &table, line, &reason),
        }
    }
    summary.loaded = observations.len();
    store.insert_observations(observations)?;
    info!(loaded = summary.loaded, skipped = summary.skipped, "Loaded store status records");
    Ok(summary)
}

pub fn load_business_hours(path: &Path, store: &MemoryStore) -> Result<LoadSummary, IngestError> {
    if store.business_interval_count()? > 0 {
        info!("Business hours data already loaded, skipping");
        return Ok(already_loaded());
    }
    let table = CsvTable::read(path)?;
    let store_col = table.require(&["store_id"])?;
    let day_col = table.require(DAY_COLUMNS)?;
    let start_col = table.require(&["start_time_local"])?;
    let end_col = table.require(&["end_time_local"])?;

    let mut summary = LoadSummary::default();
    let mut intervals = Vec::new();
    for (line, fields) in table.rows() {
        let outcome = table.check_width(fields).unwrap_or_else(|| {
            parse_business_interval(
                &fields[store_col],
                &fields[day_col],
                &fields[start_col],
                &fields[end_col],
            )
        });
        match outcome {
            RowOutcome::Loaded(interval) => intervals.push(interval),
            RowOutcome::Skipped(reason) => record_skip(&mut summary, &table, line, &reason),
        }
    }
    summary.loaded = intervals.len();
    store.insert_business_intervals(intervals)?;
    info!(loaded = summary.loaded, skipped = summary.skipped, "Loaded business hours records");
    Ok(summary)
}

pub fn load_timezones(path: &Path, store: &MemoryStore) -> Result<LoadSummary, IngestError> {
    if store.timezone_count()? > 0 {
        info!("Timezone data already loaded, skipping");
        return Ok(already_loaded());
    }
    let table = CsvTable::read(path)?;
    let store_col = table.require(&["store_id"])?;
    let zone_col = table.require(&["timezone_str"])?;

    let mut summary = LoadSummary::default();
    for (line, fields) in table.rows() {
        let outcome = table
            .check_width(fields)
            .unwrap_or_else(|| parse_timezone(&fields[store_col], &fields[zone_col]));
        match outcome {
            RowOutcome::Loaded((store_id, zone)) => {
                if store.insert_timezone(store_id, zone)? {
                    summary.loaded += 1;
                }
            }
            RowOutcome::Skipped(reason) => record_skip(&mut summary, &table, line, &reason),
        }
    }
    info!(loaded = summary.loaded, skipped = summary.skipped, "Loaded timezone records");
    Ok(summary)
}

pub fn parse_observation(store_id: &str, status: &str, timestamp: &str) -> RowOutcome<Observation> {
    let store_id = store_id.trim();
    if store_id.is_empty() {
        return RowOutcome::Skipped(SkipReason::EmptyStoreId);
    }
    let Some(status) = StoreStatus::from_label(status) else {
        return RowOutcome::Skipped(SkipReason::InvalidStatus(status.to_string()));
    };
    let Some(timestamp) = parse_timestamp(timestamp) else {
        return RowOutcome::Skipped(SkipReason::InvalidTimestamp(timestamp.to_string()));
    };
    RowOutcome::Loaded(Observation {
        store_id: store_id.to_string(),
        timestamp,
        status,
    })
}

pub fn parse_business_interval(
    store_id: &str,
    day: &str,
    start: &str,
    end: &str,
) -> RowOutcome<BusinessInterval> {
    let store_id = store_id.trim();
    if store_id.is_empty() {
        return RowOutcome::Skipped(SkipReason::EmptyStoreId);
    }
    let day_of_week = match day.trim().parse::<u8>() {
        Ok(day_of_week) if day_of_week <= 6 => day_of_week,
        _ => return RowOutcome::Skipped(SkipReason::InvalidDay(day.to_string())),
    };
    let Ok(start_time_local) = start.trim().parse::<Time>() else {
        return RowOutcome::Skipped(SkipReason::InvalidTime(start.to_string()));
    };
    let Ok(end_time_local) = end.trim().parse::<Time>() else {
        return RowOutcome::Skipped(SkipReason::InvalidTime(end.to_string()));
    };
    RowOutcome::Loaded(BusinessInterval {
        store_id: store_id.to_string(),
        day_of_week,
        start_time_local,
        end_time_local,
    })
}

pub fn parse_timezone(store_id: &str, zone: &str) -> RowOutcome<(String, String)> {
    let store_id = store_id.trim();
    if store_id.is_empty() {
        return RowOutcome::Skipped(SkipReason::EmptyStoreId);
    }
    let zone = zone.trim();
    if zone.is_empty() {
        return RowOutcome::Skipped(SkipReason::EmptyZone);
    }
    RowOutcome::Loaded((store_id.to_string(), zone.to_string()))
}

/// Accepts RFC 3339 instants and `YYYY-MM-DD HH:MM:SS[.ffffff][ UTC]` civil times in UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(timestamp) = raw.parse::<Timestamp>() {
        return Some(timestamp);
    }
    let civil = raw.strip_suffix("UTC").unwrap_or(raw).trim().replacen(' ', "T", 1);
    let datetime = civil.parse::<DateTime>().ok()?;
    TimeZone::UTC.to_timestamp(datetime).ok()
}

fn already_loaded() -> LoadSummary {
    LoadSummary {
        already_loaded: true,
        ..LoadSummary::default()
    }
}

fn record_skip(summary: &mut LoadSummary, table: &CsvTable, line: usize, reason: &SkipReason) {
    summary.skipped += 1;
    warn!(file = %table.name, line, reason = %reason, "Skipping row");
}

struct CsvTable {
    name: String,
    header: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl CsvTable {
    fn read(path: &Path) -> Result<Self, IngestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::parse(name, &contents))
    }

    fn parse(name: String, contents: &str) -> Self {
        let mut lines = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let header = lines
            .next()
            .map(|(_, line)| split_record(line.trim_start_matches('\u{feff}')))
            .unwrap_or_default();
        let rows = lines
            .map(|(index, line)| (index + 1, split_record(line)))
            .collect();
        Self { name, header, rows }
    }

    fn require(&self, names: &[&str]) -> Result<usize, IngestError> {
        names
            .iter()
            .find_map(|name| self.header.iter().position(|column| column.trim() == *name))
            .ok_or_else(|| IngestError::MissingColumn {
                file: self.name.clone(),
                column: names.join("|"),
            })
    }

    fn rows(&self) -> impl Iterator<Item = (usize, &Vec<String>)> {
        self.rows.iter().map(|(line, fields)| (*line, fields))
    }

    fn check_width<T>(&self, fields: &[String]) -> Option<RowOutcome<T>> {
        if fields.len() < self.header.len() {
            return Some(RowOutcome::Skipped(SkipReason::FieldCount {
                expected: self.header.len(),
                found: fields.len(),
            }));
        }
        None
    }
}

/// Split one CSV record, honoring double-quoted fields with `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            '\r' if !quoted => {}
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObservationStore;
    use jiff::civil::time;
    use std::fs;

    #[test]
    fn timestamps_accept_dataset_and_rfc3339_forms() {
        let expected: Timestamp = "2023-01-22T12:09:39.388884Z".parse().expect("valid timestamp");

        assert_eq!(parse_timestamp("2023-01-22 12:09:39.388884 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-22T12:09:39.388884Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-01-22 12:09:39"),
            Some("2023-01-22T12:09:39Z".parse().expect("valid timestamp"))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn bad_rows_are_typed_skips() {
        assert_eq!(
            parse_observation("s1", "maybe", "2023-01-22 12:09:39 UTC"),
            RowOutcome::Skipped(SkipReason::InvalidStatus("maybe".to_string()))
        );
        assert_eq!(
            parse_observation("s1", "active", "not a time"),
            RowOutcome::Skipped(SkipReason::InvalidTimestamp("not a time".to_string()))
        );
        assert_eq!(
            parse_business_interval("s1", "7", "09:00:00", "17:00:00"),
            RowOutcome::Skipped(SkipReason::InvalidDay("7".to_string()))
        );
        assert_eq!(
            parse_business_interval("s1", "2", "9am", "17:00:00"),
            RowOutcome::Skipped(SkipReason::InvalidTime("9am".to_string()))
        );
        assert_eq!(
            parse_timezone(" ", "UTC"),
            RowOutcome::Skipped(SkipReason::EmptyStoreId)
        );
    }

    #[test]
    fn quoted_fields_keep_commas() {
        assert_eq!(
            split_record("\"a,b\",plain,\"say \"\"hi\"\"\""),
            vec!["a,b".to_string(), "plain".to_string(), "say \"hi\"".to_string()]
        );
    }

    #[test]
    fn dataset_loads_and_skips_bad_rows() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(STORE_STATUS_FILE),
            "store_id,status,timestamp_utc\n\
             s1,active,2023-01-22 12:09:39.388884 UTC\n\
             s1,inactive,2023-01-22 11:00:00 UTC\n\
             s2,active,garbage\n\
             s3,active\n",
        )?;
        fs::write(
            dir.path().join(BUSINESS_HOURS_FILE),
            "store_id,dayOfWeek,start_time_local,end_time_local\n\
             s1,0,09:00:00,17:00:00\n\
             s1,9,09:00:00,17:00:00\n",
        )?;
        fs::write(
            dir.path().join(TIMEZONES_FILE),
            "store_id,timezone_str\n\
             s1,America/Denver\n\
             s1,UTC\n",
        )?;
        let store = MemoryStore::new();

        let summary = load_dataset(dir.path(), &store)?;

        assert_eq!(summary.observations.loaded, 2);
        assert_eq!(summary.observations.skipped, 2);
        assert_eq!(summary.business_hours.loaded, 1);
        assert_eq!(summary.business_hours.skipped, 1);
        assert_eq!(summary.timezones.loaded, 1);
        assert_eq!(store.all_store_ids()?, vec!["s1".to_string()]);
        assert_eq!(store.timezone("s1")?, Some("America/Denver".to_string()));
        let intervals = store.business_intervals("s1")?;
        assert_eq!(intervals[0].start_time_local, time(9, 0, 0, 0));

        let again = load_dataset(dir.path(), &store)?;
        assert!(again.observations.already_loaded);
        assert!(again.business_hours.already_loaded);
        assert!(again.timezones.already_loaded);
        assert_eq!(store.observation_count()?, 2);
        Ok(())
    }

    #[test]
    fn missing_file_and_column_are_errors() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = MemoryStore::new();

        assert!(matches!(
            load_dataset(dir.path(), &store),
            Err(IngestError::MissingFile(_))
        ));

        let path = dir.path().join(TIMEZONES_FILE);
        fs::write(&path, "store_id,zone\ns1,UTC\n")?;
        assert!(matches!(
            load_timezones(&path, &store),
            Err(IngestError::MissingColumn { .. })
        ));
        Ok(())
    }
}
