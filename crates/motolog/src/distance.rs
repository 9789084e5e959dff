//! Odometer offset reconciliation.
//!
//! A vehicle's lifetime distance at any record is the raw meter reading plus
//! the sum of every reset increment dated on or before that record. Resets
//! can be inserted, edited or deleted in any order, so totals are always
//! recomputed by replaying the full reset history rather than patched
//! incrementally.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::OdoResetLog;

/// Which table a distance-bearing record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A fuel entry.
    Fuel,
    /// A maintenance entry.
    Maintenance,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fuel => write!(f, "fuel"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// The distance-related columns of a fuel or maintenance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceRecord {
    /// Source table.
    pub kind: RecordKind,
    /// Row id within that table.
    pub id: i64,
    /// Record date.
    pub date: NaiveDate,
    /// Raw meter reading.
    pub odometer_reading: i64,
    /// Derived lifetime distance.
    pub total_distance: i64,
}

/// A record whose lifetime distance is lower than an earlier record's.
///
/// Usually caused by a typo or a missing reset entry. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceWarning {
    /// The offending record.
    pub record: DistanceRecord,
    /// The earlier record it falls below.
    pub previous: DistanceRecord,
}

impl std::fmt::Display for DistanceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} record on {} has total distance {} km, below {} km recorded on {}",
            self.record.kind,
            self.record.date,
            self.record.total_distance,
            self.previous.total_distance,
            self.previous.date
        )
    }
}

/// Validate a reset and return its offset increment.
///
/// # Errors
///
/// Returns a validation error if a reading is negative, the reading after
/// the reset exceeds the one before, or the date is after `today`.
pub fn validate_reset(
    reset_date: NaiveDate,
    before: i64,
    after: i64,
    today: NaiveDate,
) -> Result<i64> {
    if reset_date > today {
        return Err(Error::validation(
            "reset_date",
            "a reset cannot be recorded in the future",
        ));
    }
    if before < 0 {
        return Err(Error::validation(
            "reading_before_reset",
            "meter readings must be 0 or more",
        ));
    }
    if after < 0 {
        return Err(Error::validation(
            "reading_after_reset",
            "meter readings must be 0 or more",
        ));
    }
    if before < after {
        return Err(Error::validation(
            "reading_consistency",
            format!("reading before reset ({before}) must be at least the reading after ({after})"),
        ));
    }
    Ok(before - after)
}

/// Sum of reset increments in effect on `on_date`, or of all resets when
/// no date is given.
#[must_use]
pub fn cumulative_offset(resets: &[OdoResetLog], on_date: Option<NaiveDate>) -> i64 {
    resets
        .iter()
        .filter(|reset| on_date.map_or(true, |date| reset.reset_date <= date))
        .map(|reset| reset.offset_increment)
        .sum()
}

/// Lifetime distance for a reading taken on `on_date`.
#[must_use]
pub fn total_distance(odometer_reading: i64, resets: &[OdoResetLog], on_date: NaiveDate) -> i64 {
    odometer_reading + cumulative_offset(resets, Some(on_date))
}

/// Offsets in effect at each reset date, in chronological order.
///
/// Resets sharing a date collapse into one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTimeline {
    steps: Vec<(NaiveDate, i64)>,
}

impl OffsetTimeline {
    /// Build the timeline by replaying resets in date order.
    #[must_use]
    pub fn new(resets: &[OdoResetLog]) -> Self {
        let mut ordered: Vec<&OdoResetLog> = resets.iter().collect();
        ordered.sort_by_key(|reset| (reset.reset_date, reset.id));

        let mut steps: Vec<(NaiveDate, i64)> = Vec::with_capacity(ordered.len());
        let mut running = 0;
        for reset in ordered {
            running += reset.offset_increment;
            match steps.last_mut() {
                Some((date, total)) if *date == reset.reset_date => *total = running,
                _ => steps.push((reset.reset_date, running)),
            }
        }
        Self { steps }
    }

    /// Offset in effect on `date`.
    #[must_use]
    pub fn offset_on(&self, date: NaiveDate) -> i64 {
        let idx = self.steps.partition_point(|(step_date, _)| *step_date <= date);
        if idx == 0 {
            0
        } else {
            self.steps[idx - 1].1
        }
    }

    /// Offset after every reset.
    #[must_use]
    pub fn final_offset(&self) -> i64 {
        self.steps.last().map_or(0, |(_, total)| *total)
    }
}

/// Recompute the lifetime distance of every record against the full reset
/// history.
///
/// Returns the records with refreshed `total_distance`, in input order.
#[must_use]
pub fn replay(resets: &[OdoResetLog], records: &[DistanceRecord]) -> Vec<DistanceRecord> {
    let timeline = OffsetTimeline::new(resets);
    records
        .iter()
        .map(|record| DistanceRecord {
            total_distance: record.odometer_reading + timeline.offset_on(record.date),
            ..*record
        })
        .collect()
}

/// Find records whose lifetime distance drops below the previous record's.
///
/// Records are compared in date order. Records from the same day have no
/// known order and never warn against each other.
#[must_use]
pub fn check_monotonic(records: &[DistanceRecord]) -> Vec<DistanceWarning> {
    let mut ordered: Vec<&DistanceRecord> = records.iter().collect();
    ordered.sort_by_key(|record| (record.date, record.total_distance, record.kind, record.id));

    let mut warnings = Vec::new();
    let mut highest: Option<&DistanceRecord> = None;
    for record in ordered {
        match highest {
            Some(previous) if record.total_distance < previous.total_distance => {
                warnings.push(DistanceWarning {
                    record: *record,
                    previous: *previous,
                });
            }
            _ => highest = Some(record),
        }
    }
    warnings
}

/// Compare a new record against the latest existing record dated before it.
///
/// Logs and returns a warning when the new total is lower.
#[must_use]
pub fn check_against_previous(
    existing: &[DistanceRecord],
    candidate: &DistanceRecord,
) -> Option<DistanceWarning> {
    let previous = existing
        .iter()
        .filter(|record| record.date < candidate.date)
        .max_by_key(|record| (record.date, record.total_distance))?;

    if candidate.total_distance < previous.total_distance {
        let warning = DistanceWarning {
            record: *candidate,
            previous: *previous,
        };
        warn!("{warning}");
        Some(warning)
    } else {
        None
    }
}

/// Latest known lifetime distance of a vehicle.
///
/// Falls back to the cumulative offset when nothing has been logged since
/// the last reset.
#[must_use]
pub fn latest_total_distance(records: &[DistanceRecord], offset: i64) -> i64 {
    records
        .iter()
        .map(|record| record.total_distance)
        .max()
        .unwrap_or(0)
        .max(offset)
}

/// Distance covered across the given records (max minus min).
///
/// Zero when fewer than two distinct readings exist.
#[must_use]
pub fn distance_travelled(records: &[DistanceRecord]) -> i64 {
    let max = records.iter().map(|r| r.total_distance).max();
    let min = records.iter().map(|r| r.total_distance).min();
    match (max, min) {
        (Some(max), Some(min)) => max - min,
        _ => 0,
    }
}
