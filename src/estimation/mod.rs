//! Uptime and downtime extrapolation from sparse status polls.
//!
//! Polls outside business hours are dropped. For each trailing window the
//! share of `active` polls is scaled to the window length: 60 minutes for the
//! last hour, and the number of open hours on an hourly grid for the last day
//! and week. Each window is computed from its own slice, so the three results
//! are not nested measures of one timeline.

use crate::model::{Observation, UptimeSummary};
use crate::store::{ObservationStore, StoreError};
use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use tracing::{debug, warn};

pub mod schedule;

pub use schedule::{BusinessSchedule, DEFAULT_TIMEZONE, full_week, intervals_for, is_open, zone_for};

pub const HOUR_WINDOW_MINUTES: f64 = 60.0;

const HOUR: SignedDuration = SignedDuration::from_hours(1);
const DAY: SignedDuration = SignedDuration::from_hours(24);
const WEEK: SignedDuration = SignedDuration::from_hours(24 * 7);

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("store read failed: {0}")]
    Store(#[from] StoreError),
    #[error("time arithmetic failed: {0}")]
    Time(#[from] jiff::Error),
}

/// Estimate uptime for one store over the week ending at `now`.
pub fn estimate(
    store: &dyn ObservationStore,
    store_id: &str,
    now: Timestamp,
    default_zone: &str,
) -> Result<UptimeSummary, EstimateError> {
    let week_ago = now.checked_sub(WEEK)?;
    let observations = store.observations_in_range(store_id, week_ago, now)?;
    if observations.is_empty() {
        warn!(store_id, "No status data found for store in the last week");
        return Ok(UptimeSummary::default());
    }

    let schedule = BusinessSchedule::load(store, store_id, default_zone);
    let summary = summarize(&observations, &schedule, now)?;
    debug!(store_id, observations = observations.len(), "Computed uptime summary");
    Ok(summary)
}

/// Like [`estimate`], but a failure for this store yields the all-zero summary.
pub fn estimate_or_zero(
    store: &dyn ObservationStore,
    store_id: &str,
    now: Timestamp,
    default_zone: &str,
) -> UptimeSummary {
    match estimate(store, store_id, now, default_zone) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(store_id, error = %err, "Uptime estimation failed, reporting zeros");
            UptimeSummary::default()
        }
    }
}

/// Extrapolate the three windows from observations already fetched for `schedule`'s store.
pub fn summarize(
    observations: &[Observation],
    schedule: &BusinessSchedule,
    now: Timestamp,
) -> Result<UptimeSummary, EstimateError> {
    let hour_ago = now.checked_sub(HOUR)?;
    let day_ago = now.checked_sub(DAY)?;
    let week_ago = now.checked_sub(WEEK)?;

    let business: Vec<&Observation> = observations
        .iter()
        .filter(|observation| schedule.is_open(observation.timestamp))
        .collect();

    let mut summary = UptimeSummary::default();
    if business.is_empty() {
        warn!(
            store_id = schedule.store_id(),
            "No observations during business hours"
        );
        return Ok(summary);
    }

    if let Some(ratio) = active_ratio_since(&business, hour_ago) {
        summary.uptime_last_hour = round2(ratio * HOUR_WINDOW_MINUTES);
        summary.downtime_last_hour = round2(HOUR_WINDOW_MINUTES - summary.uptime_last_hour);
    }

    if let Some(ratio) = active_ratio_since(&business, day_ago) {
        let open_hours = schedule.open_hours_between(day_ago, now)?;
        (summary.uptime_last_day, summary.downtime_last_day) = scale(ratio, open_hours);
    }

    if let Some(ratio) = active_ratio_since(&business, week_ago) {
        let open_hours = schedule.open_hours_between(week_ago, now)?;
        (summary.uptime_last_week, summary.downtime_last_week) = scale(ratio, open_hours);
    }

    Ok(summary)
}

fn active_ratio_since(business: &[&Observation], since: Timestamp) -> Option<f64> {
    let mut total = 0u32;
    let mut active = 0u32;
    for observation in business.iter().filter(|o| o.timestamp >= since) {
        total += 1;
        if observation.status.is_active() {
            active += 1;
        }
    }
    if total == 0 {
        return None;
    }
    Some(f64::from(active) / f64::from(total))
}

fn scale(ratio: f64, open_hours: u32) -> (f64, f64) {
    let total = f64::from(open_hours);
    let uptime = round2(ratio * total);
    (uptime, round2(total - uptime))
}

/// Round to two decimal places, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
