use jiff::Timestamp;
use jiff::civil::Time;
use serde::Serialize;
use std::fmt;

pub type StoreId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    /// Parse a poll status label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A single status poll for a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub store_id: StoreId,
    pub timestamp: Timestamp,
    pub status: StoreStatus,
}

/// One open window on a local weekday. Weekday 0 is Monday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessInterval {
    pub store_id: StoreId,
    pub day_of_week: u8,
    pub start_time_local: Time,
    pub end_time_local: Time,
}

impl BusinessInterval {
    pub fn contains(&self, day_of_week: u8, time: Time) -> bool {
        self.day_of_week == day_of_week
            && self.start_time_local <= time
            && time <= self.end_time_local
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Error => "Error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub report_id: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Uptime in minutes for the hour window and hours for the day and week windows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UptimeSummary {
    pub uptime_last_hour: f64,
    pub uptime_last_day: f64,
    pub uptime_last_week: f64,
    pub downtime_last_hour: f64,
    pub downtime_last_day: f64,
    pub downtime_last_week: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub store_id: StoreId,
    pub summary: UptimeSummary,
}
