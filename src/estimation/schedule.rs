//! Business-hours lookup and the open/closed predicate.
//!
//! Missing business hours mean the store is open around the clock, a missing
//! timezone falls back to a fixed zone, and an unresolvable zone makes every
//! instant count as open so a lookup problem never shows up as downtime.

use crate::model::{BusinessInterval, StoreId};
use crate::store::ObservationStore;
use jiff::civil::Time;
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use tracing::{debug, warn};

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

const GRID_STEP: SignedDuration = SignedDuration::from_hours(1);
const END_OF_DAY: Time = Time::constant(23, 59, 59, 0);

/// Open intervals covering every weekday, used when a store has no hours on record.
pub fn full_week(store_id: &str) -> Vec<BusinessInterval> {
    (0..7)
        .map(|day_of_week| BusinessInterval {
            store_id: store_id.to_string(),
            day_of_week,
            start_time_local: Time::midnight(),
            end_time_local: END_OF_DAY,
        })
        .collect()
}

/// Business intervals for a store ordered by weekday and start time.
pub fn intervals_for(store: &dyn ObservationStore, store_id: &str) -> Vec<BusinessInterval> {
    let mut intervals = match store.business_intervals(store_id) {
        Ok(intervals) if !intervals.is_empty() => intervals,
        Ok(_) => {
            debug!(store_id, "No business hours found, assuming 24/7 operation");
            return full_week(store_id);
        }
        Err(err) => {
            warn!(store_id, error = %err, "Failed to read business hours, assuming 24/7 operation");
            return full_week(store_id);
        }
    };
    intervals.sort_by_key(|interval| (interval.day_of_week, interval.start_time_local));
    intervals
}

pub fn zone_for(store: &dyn ObservationStore, store_id: &str, default_zone: &str) -> String {
    match store.timezone(store_id) {
        Ok(Some(zone)) => zone,
        Ok(None) => default_zone.to_string(),
        Err(err) => {
            warn!(store_id, error = %err, "Failed to read timezone, using default");
            default_zone.to_string()
        }
    }
}

/// Whether `instant` falls inside any of `intervals` in the local time of `zone`.
///
/// Fails open: when `zone` cannot be resolved the store counts as open.
pub fn is_open(
    instant: Timestamp,
    store_id: &str,
    intervals: &[BusinessInterval],
    zone: &str,
) -> bool {
    match TimeZone::get(zone) {
        Ok(tz) => is_open_in(instant, intervals, &tz),
        Err(err) => {
            warn!(store_id, zone, error = %err, "Unresolvable timezone, treating store as open");
            true
        }
    }
}

fn is_open_in(instant: Timestamp, intervals: &[BusinessInterval], tz: &TimeZone) -> bool {
    let local = tz.to_datetime(instant);
    let day_of_week = local.weekday().to_monday_zero_offset() as u8;
    let time = local.time();
    intervals
        .iter()
        .any(|interval| interval.contains(day_of_week, time))
}

/// A store's business hours with its zone resolved once.
#[derive(Debug, Clone)]
pub struct BusinessSchedule {
    store_id: StoreId,
    intervals: Vec<BusinessInterval>,
    zone: Option<TimeZone>,
}

impl BusinessSchedule {
    pub fn new(store_id: &str, intervals: Vec<BusinessInterval>, zone: &str) -> Self {
        let zone = match TimeZone::get(zone) {
            Ok(tz) => Some(tz),
            Err(err) => {
                warn!(store_id, zone, error = %err, "Unresolvable timezone, treating store as always open");
                None
            }
        };
        Self {
            store_id: store_id.to_string(),
            intervals,
            zone,
        }
    }

    pub fn load(store: &dyn ObservationStore, store_id: &str, default_zone: &str) -> Self {
        let intervals = intervals_for(store, store_id);
        let zone = zone_for(store, store_id, default_zone);
        Self::new(store_id, intervals, &zone)
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn is_open(&self, instant: Timestamp) -> bool {
        match &self.zone {
            Some(tz) => is_open_in(instant, &self.intervals, tz),
            None => true,
        }
    }

    /// Counts hourly grid points in `[start, end]` at which the store is open.
    ///
    /// An integer approximation of open hours: the grid starts at `start` and
    /// steps by exactly one hour.
    pub fn open_hours_between(&self, start: Timestamp, end: Timestamp) -> Result<u32, jiff::Error> {
        let mut hours = 0;
        let mut current = start;
        while current <= end {
            if self.is_open(current) {
                hours += 1;
            }
            current = current.checked_add(GRID_STEP)?;
        }
        Ok(hours)
    }
}
