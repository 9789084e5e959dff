//! Core record types for motolog.
//!
//! These mirror the rows kept in storage. Derived columns such as
//! `total_distance` are computed by [`crate::distance`] and written back by
//! the storage layer.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::laps::{GpsTracks, LapTime};

/// A rider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Storage id.
    pub id: i64,
    /// Display name, unique.
    pub username: String,
}

/// A registered vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motorcycle {
    /// Storage id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Manufacturer, if given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maker: Option<String>,
    /// Display name.
    pub name: String,
    /// Model year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Track-only machine: tracked by operating hours, no fuel economy.
    pub is_racer: bool,
    /// Preselected vehicle for new records.
    pub is_default: bool,
    /// Cached sum of every odometer reset increment.
    pub odometer_offset: i64,
    /// Engine hours for racers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_operating_hours: Option<f64>,
}

/// Input for registering a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMotorcycle {
    /// Manufacturer.
    pub maker: Option<String>,
    /// Display name.
    pub name: String,
    /// Model year.
    pub year: Option<i32>,
    /// Track-only machine.
    pub is_racer: bool,
}

/// A fuel-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelEntry {
    /// Storage id.
    pub id: i64,
    /// Vehicle that was fuelled.
    pub motorcycle_id: i64,
    /// Day of the fuel-up.
    pub entry_date: NaiveDate,
    /// Meter reading as shown on the dash.
    pub odometer_reading: i64,
    /// Lifetime distance: reading plus offsets in effect on `entry_date`.
    pub total_distance: i64,
    /// Litres added.
    pub fuel_volume: f64,
    /// Price per litre.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_liter: Option<f64>,
    /// Total paid, whole currency units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<i64>,
    /// Station or brand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    /// Tank was filled to the brim.
    pub is_full_tank: bool,
    /// Leave this entry out of the vehicle-wide average.
    pub exclude_from_average: bool,
    /// Free text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Input for a fuel-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFuelEntry {
    /// Vehicle that was fuelled.
    pub motorcycle_id: i64,
    /// Day of the fuel-up.
    pub entry_date: NaiveDate,
    /// Meter reading as shown on the dash.
    pub odometer_reading: i64,
    /// Litres added.
    pub fuel_volume: f64,
    /// Price per litre.
    pub price_per_liter: Option<f64>,
    /// Total paid as entered; computed from price and volume when absent.
    pub total_cost: Option<f64>,
    /// Station or brand.
    pub station_name: Option<String>,
    /// Tank was filled to the brim.
    pub is_full_tank: bool,
    /// Leave this entry out of the vehicle-wide average.
    pub exclude_from_average: bool,
    /// Free text.
    pub notes: Option<String>,
}

/// A maintenance event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceEntry {
    /// Storage id.
    pub id: i64,
    /// Vehicle that was serviced.
    pub motorcycle_id: i64,
    /// Day of the work.
    pub maintenance_date: NaiveDate,
    /// Meter reading as shown on the dash.
    pub odometer_reading: i64,
    /// Lifetime distance: reading plus offsets in effect on the date.
    pub total_distance: i64,
    /// What was done.
    pub description: String,
    /// Grouping such as "oil" or "tyres".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Parts spend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_cost: Option<f64>,
    /// Labour spend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labor_cost: Option<f64>,
}

impl MaintenanceEntry {
    /// Parts plus labour, treating missing amounts as zero.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.parts_cost.unwrap_or(0.0) + self.labor_cost.unwrap_or(0.0)
    }
}

/// Input for a maintenance event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaintenanceEntry {
    /// Vehicle that was serviced.
    pub motorcycle_id: i64,
    /// Day of the work.
    pub maintenance_date: NaiveDate,
    /// Meter reading as shown on the dash.
    pub odometer_reading: i64,
    /// What was done.
    pub description: String,
    /// Grouping such as "oil" or "tyres".
    pub category: Option<String>,
    /// Parts spend.
    pub parts_cost: Option<f64>,
    /// Labour spend.
    pub labor_cost: Option<f64>,
}

/// A recorded odometer rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdoResetLog {
    /// Storage id.
    pub id: i64,
    /// Vehicle whose meter was reset.
    pub motorcycle_id: i64,
    /// Day the reset happened.
    pub reset_date: NaiveDate,
    /// Reading shown just before the reset.
    pub display_odo_before_reset: i64,
    /// Reading shown just after the reset.
    pub display_odo_after_reset: i64,
    /// `before - after`, added to every later reading.
    pub offset_increment: i64,
}

/// An interval- or date-based service reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReminder {
    /// Storage id.
    pub id: i64,
    /// Vehicle the reminder belongs to.
    pub motorcycle_id: i64,
    /// What needs doing.
    pub task_description: String,
    /// Repeat every this many km.
    pub interval_km: Option<i64>,
    /// Repeat every this many months.
    pub interval_months: Option<u32>,
    /// When the task was last done.
    pub last_done_date: Option<NaiveDate>,
    /// Lifetime distance when the task was last done.
    pub last_done_km: Option<i64>,
}

/// Input for a service reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    /// Vehicle the reminder belongs to.
    pub motorcycle_id: i64,
    /// What needs doing.
    pub task_description: String,
    /// Repeat every this many km.
    pub interval_km: Option<i64>,
    /// Repeat every this many months.
    pub interval_months: Option<u32>,
    /// When the task was last done.
    pub last_done_date: Option<NaiveDate>,
    /// Lifetime distance when the task was last done.
    pub last_done_km: Option<i64>,
}

/// Kind of general note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    /// Free-form note.
    #[default]
    Note,
    /// Checklist.
    Task,
}

impl std::fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Task => write!(f, "task"),
        }
    }
}

impl std::str::FromStr for NoteCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(Self::Note),
            "task" => Ok(Self::Task),
            other => Err(crate::Error::validation(
                "category",
                format!("unknown note category '{other}'"),
            )),
        }
    }
}

/// A note or checklist, optionally tied to a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralNote {
    /// Storage id.
    pub id: i64,
    /// Author.
    pub user_id: i64,
    /// Related vehicle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motorcycle_id: Option<i64>,
    /// Day the note refers to.
    pub note_date: NaiveDate,
    /// Heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Note or task.
    pub category: NoteCategory,
}

/// Input for a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    /// Related vehicle.
    pub motorcycle_id: Option<i64>,
    /// Day the note refers to.
    pub note_date: NaiveDate,
    /// Heading.
    pub title: Option<String>,
    /// Body, required.
    pub content: String,
    /// Note or task.
    pub category: NoteCategory,
}

/// Where an outing took place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum ActivityLocation {
    /// A race circuit. Circuit names group best laps.
    Circuit(String),
    /// Anywhere else.
    Custom(String),
}

impl ActivityLocation {
    /// The circuit name, if this is a circuit.
    #[must_use]
    pub fn circuit(&self) -> Option<&str> {
        match self {
            Self::Circuit(name) => Some(name),
            Self::Custom(_) => None,
        }
    }

    /// The place name, whichever kind it is.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Circuit(name) | Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for ActivityLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A day out on a vehicle, usually a track day. Groups sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    /// Storage id.
    pub id: i64,
    /// Vehicle ridden.
    pub motorcycle_id: i64,
    /// Day of the outing.
    pub activity_date: NaiveDate,
    /// Title such as "July practice".
    pub activity_title: String,
    /// Circuit or free-form place.
    pub location: ActivityLocation,
    /// Weather description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    /// Air temperature in degrees Celsius.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Notes for the day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Input for creating or editing an outing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    /// Vehicle ridden.
    pub motorcycle_id: i64,
    /// Day of the outing.
    pub activity_date: NaiveDate,
    /// Title, required.
    pub activity_title: String,
    /// Circuit or free-form place.
    pub location: ActivityLocation,
    /// Weather description.
    pub weather: Option<String>,
    /// Air temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Notes for the day.
    pub notes: Option<String>,
}

/// Setting values grouped by area, e.g. `suspension` -> `preload` -> `3`.
pub type SettingDetails = BTreeMap<String, BTreeMap<String, String>>;

/// A named snapshot of a vehicle's setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingSheet {
    /// Storage id.
    pub id: i64,
    /// Vehicle the setup belongs to.
    pub motorcycle_id: i64,
    /// Sheet name such as "dry baseline".
    pub sheet_name: String,
    /// Setting values.
    pub details: SettingDetails,
    /// Intent of the setup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Archived sheets sort last and are kept for history.
    pub is_archived: bool,
}

/// Input for creating or editing a setting sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSettingSheet {
    /// Vehicle the setup belongs to.
    pub motorcycle_id: i64,
    /// Sheet name, required.
    pub sheet_name: String,
    /// Setting values.
    pub details: SettingDetails,
    /// Intent of the setup.
    pub notes: Option<String>,
}

/// One track session within an outing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    /// Storage id.
    pub id: i64,
    /// Vehicle ridden.
    pub motorcycle_id: i64,
    /// Outing the session belongs to. Absent only for sessions recorded
    /// before outings existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<i64>,
    /// Setup used for the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setting_sheet_id: Option<i64>,
    /// Label such as "Sport 1".
    pub session_name: String,
    /// Normalized lap times in recorded order.
    pub lap_times: Vec<LapTime>,
    /// Fastest valid lap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_lap: Option<LapTime>,
    /// Full-resolution GPS tracks keyed by lap number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_tracks: Option<GpsTracks>,
}

/// An achievement a user has unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAchievement {
    /// Storage id.
    pub id: i64,
    /// Who unlocked it.
    pub user_id: i64,
    /// Catalog code.
    pub achievement_code: String,
    /// When it was unlocked.
    pub unlocked_at: DateTime<Utc>,
}
