//! Maintenance reminder due-state evaluation.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::config::ReminderConfig;
use crate::error::{Error, Result};
use crate::model::MaintenanceReminder;

/// How urgent a reminder is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Nothing to do yet.
    Ok,
    /// Coming up soon.
    Warning,
    /// Due or overdue.
    Danger,
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// Vehicle state a reminder is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleState {
    /// Display name.
    pub name: String,
    /// Racers have no meaningful distance.
    pub is_racer: bool,
    /// Latest lifetime distance.
    pub current_km: i64,
}

/// Result of checking one reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderCheck {
    /// The reminder itself.
    pub reminder: MaintenanceReminder,
    /// Vehicle display name.
    pub vehicle_name: String,
    /// Worse of the distance and date status.
    pub status: ReminderStatus,
    /// Human-readable reasons, distance first.
    pub messages: Vec<String>,
    /// Distance at which the task is next due.
    pub next_km_due: Option<i64>,
    /// Date on which the task is next due.
    pub next_date_due: Option<NaiveDate>,
}

impl ReminderCheck {
    /// Whether the reminder needs attention.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.status != ReminderStatus::Ok
    }
}

/// Check one reminder.
#[must_use]
pub fn check_reminder(
    reminder: &MaintenanceReminder,
    vehicle: &VehicleState,
    today: NaiveDate,
    thresholds: &ReminderConfig,
) -> ReminderCheck {
    let mut status = ReminderStatus::Ok;
    let mut messages = Vec::new();
    let mut next_km_due = None;
    let mut next_date_due = None;

    if let (Some(interval), Some(last_km), false) =
        (reminder.interval_km, reminder.last_done_km, vehicle.is_racer)
    {
        let due_at = last_km + interval;
        let remaining = due_at - vehicle.current_km;
        next_km_due = Some(due_at);
        if remaining <= thresholds.km_danger {
            status = ReminderStatus::Danger;
            messages.push(format!("distance exceeded (now {} km)", vehicle.current_km));
        } else if remaining <= thresholds.km_warning {
            status = ReminderStatus::Warning;
            messages.push(format!("{remaining} km left"));
        }
    }

    if let (Some(months), Some(last_date)) = (reminder.interval_months, reminder.last_done_date) {
        if let Some(due_on) = last_date.checked_add_months(Months::new(months)) {
            let remaining_days = (due_on - today).num_days();
            next_date_due = Some(due_on);
            if remaining_days <= thresholds.days_danger {
                status = status.max(ReminderStatus::Danger);
                messages.push("overdue".to_string());
            } else if remaining_days <= thresholds.days_warning {
                status = status.max(ReminderStatus::Warning);
                messages.push(format!("{remaining_days} days left"));
            }
        } else {
            warn!(reminder_id = reminder.id, months, "due date out of range");
            status = status.max(ReminderStatus::Warning);
            messages.push("due date could not be calculated".to_string());
        }
    }

    ReminderCheck {
        reminder: reminder.clone(),
        vehicle_name: vehicle.name.clone(),
        status,
        messages,
        next_km_due,
        next_date_due,
    }
}

/// Reminders that need attention, danger first.
///
/// Ties keep their input order.
#[must_use]
pub fn due_reminders(
    reminders: &[(MaintenanceReminder, VehicleState)],
    today: NaiveDate,
    thresholds: &ReminderConfig,
) -> Vec<ReminderCheck> {
    let mut due: Vec<ReminderCheck> = reminders
        .iter()
        .map(|(reminder, vehicle)| check_reminder(reminder, vehicle, today, thresholds))
        .filter(ReminderCheck::is_due)
        .collect();
    due.sort_by_key(|check| std::cmp::Reverse(check.status));
    due
}

/// Validate reminder input.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an empty task, non-positive intervals,
/// a negative last-done distance, or when neither interval is set.
pub fn validate_reminder(
    task_description: &str,
    interval_km: Option<i64>,
    interval_months: Option<u32>,
    last_done_km: Option<i64>,
) -> Result<()> {
    if task_description.trim().is_empty() {
        return Err(Error::validation("task_description", "is required"));
    }
    if interval_km.is_some_and(|km| km <= 0) {
        return Err(Error::validation("interval_km", "must be greater than 0"));
    }
    if interval_months == Some(0) {
        return Err(Error::validation("interval_months", "must be greater than 0"));
    }
    if interval_km.is_none() && interval_months.is_none() {
        return Err(Error::validation(
            "interval",
            "set a distance or a time interval",
        ));
    }
    if last_done_km.is_some_and(|km| km < 0) {
        return Err(Error::validation("last_done_km", "cannot be negative"));
    }
    Ok(())
}
