//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::laps::{Device, LapSort};
use crate::model::{
    ActivityLocation, NewActivity, NewFuelEntry, NewMaintenanceEntry, NewSettingSheet,
    NoteCategory, SettingDetails,
};

/// Vehicle commands.
#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    /// Register a vehicle
    Add {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Manufacturer
        #[arg(short, long)]
        maker: Option<String>,

        /// Model year
        #[arg(short, long)]
        year: Option<i32>,

        /// Track-only machine
        #[arg(long)]
        racer: bool,
    },

    /// List registered vehicles
    List,

    /// Show a vehicle with its current mileage
    Show {
        /// Vehicle id
        id: i64,
    },

    /// Make a vehicle the default
    Default {
        /// Vehicle id
        id: i64,
    },

    /// Set a racer's total operating hours
    Hours {
        /// Vehicle id
        id: i64,

        /// Engine hours
        hours: f64,
    },

    /// Delete a vehicle and all of its records
    Delete {
        /// Vehicle id
        id: i64,
    },
}

/// Fields of a fuel entry.
#[derive(Debug, Clone, Args)]
pub struct FuelArgs {
    /// Vehicle id (defaults to the default vehicle)
    #[arg(short = 'm', long)]
    pub vehicle: Option<i64>,

    /// Day of the fuel-up (defaults to today)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Meter reading shown on the dash
    #[arg(short, long)]
    pub odo: i64,

    /// Litres added
    #[arg(short, long)]
    pub litres: f64,

    /// Price per litre
    #[arg(short, long)]
    pub price: Option<f64>,

    /// Total paid (computed from price when omitted)
    #[arg(long)]
    pub cost: Option<f64>,

    /// Station or brand
    #[arg(short, long)]
    pub station: Option<String>,

    /// The tank was not filled to the brim
    #[arg(long)]
    pub partial: bool,

    /// Leave this entry out of the average
    #[arg(long)]
    pub exclude: bool,

    /// Free text
    #[arg(long)]
    pub notes: Option<String>,
}

impl FuelArgs {
    /// Build the storage input for a resolved vehicle and date.
    #[must_use]
    pub fn to_new_entry(&self, motorcycle_id: i64, today: NaiveDate) -> NewFuelEntry {
        NewFuelEntry {
            motorcycle_id,
            entry_date: self.date.unwrap_or(today),
            odometer_reading: self.odo,
            fuel_volume: self.litres,
            price_per_liter: self.price,
            total_cost: self.cost,
            station_name: self.station.clone(),
            is_full_tank: !self.partial,
            exclude_from_average: self.exclude,
            notes: self.notes.clone(),
        }
    }
}

/// Fuel log commands.
#[derive(Debug, Subcommand)]
pub enum FuelCommand {
    /// Log a fuel-up
    Add(FuelArgs),

    /// Replace a fuel entry
    Edit {
        /// Entry id
        id: i64,

        /// New field values
        #[command(flatten)]
        entry: FuelArgs,
    },

    /// List fuel entries with km/L
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Show a vehicle's fuel economy summary
    Report {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Delete a fuel entry
    Delete {
        /// Entry id
        id: i64,
    },
}

/// Fields of a maintenance entry.
#[derive(Debug, Clone, Args)]
pub struct MaintArgs {
    /// Vehicle id (defaults to the default vehicle)
    #[arg(short = 'm', long)]
    pub vehicle: Option<i64>,

    /// Day of the work (defaults to today)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Meter reading shown on the dash
    #[arg(short, long)]
    pub odo: i64,

    /// What was done
    #[arg(short = 'D', long)]
    pub description: String,

    /// Grouping such as "oil" or "tyres"
    #[arg(long)]
    pub category: Option<String>,

    /// Parts spend
    #[arg(long)]
    pub parts: Option<f64>,

    /// Labour spend
    #[arg(long)]
    pub labor: Option<f64>,
}

impl MaintArgs {
    /// Build the storage input for a resolved vehicle and date.
    #[must_use]
    pub fn to_new_entry(&self, motorcycle_id: i64, today: NaiveDate) -> NewMaintenanceEntry {
        NewMaintenanceEntry {
            motorcycle_id,
            maintenance_date: self.date.unwrap_or(today),
            odometer_reading: self.odo,
            description: self.description.clone(),
            category: self.category.clone(),
            parts_cost: self.parts,
            labor_cost: self.labor,
        }
    }
}

/// Maintenance log commands.
#[derive(Debug, Subcommand)]
pub enum MaintCommand {
    /// Log a maintenance event
    Add(MaintArgs),

    /// Replace a maintenance entry
    Edit {
        /// Entry id
        id: i64,

        /// New field values
        #[command(flatten)]
        entry: MaintArgs,
    },

    /// List maintenance entries
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Delete a maintenance entry
    Delete {
        /// Entry id
        id: i64,
    },
}

/// Odometer reset commands.
#[derive(Debug, Subcommand)]
pub enum OdoCommand {
    /// Record a meter reset or rollover
    Add {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// Day of the reset (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Reading shown just before the reset
        #[arg(short, long)]
        before: i64,

        /// Reading shown just after the reset
        #[arg(short, long, default_value = "0")]
        after: i64,
    },

    /// Edit a reset
    Edit {
        /// Reset id
        id: i64,

        /// Day of the reset
        #[arg(short, long)]
        date: NaiveDate,

        /// Reading shown just before the reset
        #[arg(short, long)]
        before: i64,

        /// Reading shown just after the reset
        #[arg(short, long, default_value = "0")]
        after: i64,
    },

    /// List a vehicle's resets
    List {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Delete a reset
    Delete {
        /// Reset id
        id: i64,
    },

    /// Recompute every derived distance from the reset history
    Recalc {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Show records whose distance drops below an earlier one
    Check {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },
}

/// Maintenance reminder commands.
#[derive(Debug, Subcommand)]
pub enum ReminderCommand {
    /// Create a reminder
    Add {
        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// What needs doing
        #[arg(short, long)]
        task: String,

        /// Repeat every this many km
        #[arg(short, long)]
        km: Option<i64>,

        /// Repeat every this many months
        #[arg(long)]
        months: Option<u32>,

        /// When the task was last done
        #[arg(long)]
        last_date: Option<NaiveDate>,

        /// Lifetime distance when the task was last done
        #[arg(long)]
        last_km: Option<i64>,
    },

    /// List reminders
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Show reminders that need attention
    Due {
        /// Evaluate as of this day (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Mark a reminder as done at the current mileage
    Done {
        /// Reminder id
        id: i64,

        /// Day it was done (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Delete a reminder
    Delete {
        /// Reminder id
        id: i64,
    },
}

/// Note commands.
#[derive(Debug, Subcommand)]
pub enum NoteCommand {
    /// Write a note
    Add {
        /// Body
        content: String,

        /// Heading
        #[arg(short, long)]
        title: Option<String>,

        /// Related vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// Day the note refers to (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Kind of note
        #[arg(long, value_enum, default_value = "note")]
        category: NoteCategoryArg,
    },

    /// List notes
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// Only this kind
        #[arg(long, value_enum)]
        category: Option<NoteCategoryArg>,
    },

    /// Delete a note
    Delete {
        /// Note id
        id: i64,
    },
}

/// Fields of an outing.
#[derive(Debug, Clone, Args)]
pub struct ActivityArgs {
    /// Vehicle id (defaults to the default vehicle, or the current one on edit)
    #[arg(short = 'm', long)]
    pub vehicle: Option<i64>,

    /// Day of the outing (defaults to today)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Title such as "July practice"
    #[arg(short, long)]
    pub title: String,

    /// Circuit name
    #[arg(long, required_unless_present = "place", conflicts_with = "place")]
    pub circuit: Option<String>,

    /// Any other place
    #[arg(long)]
    pub place: Option<String>,

    /// Weather
    #[arg(short, long)]
    pub weather: Option<String>,

    /// Air temperature in degrees Celsius
    #[arg(long, allow_negative_numbers = true)]
    pub temp: Option<f64>,

    /// Notes for the day
    #[arg(long)]
    pub notes: Option<String>,
}

impl ActivityArgs {
    /// Build the storage input for a resolved vehicle and date.
    #[must_use]
    pub fn to_new_activity(&self, motorcycle_id: i64, today: NaiveDate) -> NewActivity {
        let location = match (&self.circuit, &self.place) {
            (Some(circuit), _) => ActivityLocation::Circuit(circuit.clone()),
            (None, place) => ActivityLocation::Custom(place.clone().unwrap_or_default()),
        };
        NewActivity {
            motorcycle_id,
            activity_date: self.date.unwrap_or(today),
            activity_title: self.title.clone(),
            location,
            weather: self.weather.clone(),
            temperature: self.temp,
            notes: self.notes.clone(),
        }
    }
}

/// Outing commands.
#[derive(Debug, Subcommand)]
pub enum ActivityCommand {
    /// Record an outing
    Add(ActivityArgs),

    /// Replace an outing
    Edit {
        /// Outing id
        id: i64,

        /// New field values
        #[command(flatten)]
        activity: ActivityArgs,
    },

    /// List outings with session counts and best laps
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,
    },

    /// Show an outing and its sessions
    Show {
        /// Outing id
        id: i64,
    },

    /// Delete an outing and its sessions
    Delete {
        /// Outing id
        id: i64,
    },

    /// Show the personal best at each circuit
    Circuits,
}

/// One `category.item=value` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingEntry {
    /// Area such as "suspension".
    pub category: String,
    /// Item within the area.
    pub item: String,
    /// Value as written.
    pub value: String,
}

fn parse_setting_key(key: &str) -> Result<(String, String), String> {
    let (category, item) = key
        .split_once('.')
        .ok_or_else(|| format!("expected category.item, got '{key}'"))?;
    let (category, item) = (category.trim(), item.trim());
    if category.is_empty() || item.is_empty() {
        return Err(format!("expected category.item, got '{key}'"));
    }
    Ok((category.to_string(), item.to_string()))
}

/// Parse `category.item=value`.
///
/// # Errors
///
/// Returns a message if the `=` or the `.` is missing.
pub fn parse_setting_entry(raw: &str) -> Result<SettingEntry, String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected category.item=value, got '{raw}'"))?;
    let (category, item) = parse_setting_key(key)?;
    Ok(SettingEntry {
        category,
        item,
        value: value.trim().to_string(),
    })
}

/// Parse `category.item`.
///
/// # Errors
///
/// Returns a message if the `.` is missing.
pub fn parse_setting_path(raw: &str) -> Result<(String, String), String> {
    parse_setting_key(raw)
}

/// Fold settings into `details`, later entries winning.
pub fn apply_settings(details: &mut SettingDetails, entries: &[SettingEntry]) {
    for entry in entries {
        details
            .entry(entry.category.clone())
            .or_default()
            .insert(entry.item.clone(), entry.value.clone());
    }
}

/// Setting sheet commands.
#[derive(Debug, Subcommand)]
pub enum SettingCommand {
    /// Save a setup
    Add {
        /// Sheet name such as "dry baseline"
        name: String,

        /// Vehicle id (defaults to the default vehicle)
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// A value as category.item=value, repeatable
        #[arg(short, long = "set", value_parser = parse_setting_entry)]
        set: Vec<SettingEntry>,

        /// Intent of the setup
        #[arg(long)]
        notes: Option<String>,
    },

    /// Change a setup
    Edit {
        /// Sheet id
        id: i64,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// Add or change a value as category.item=value, repeatable
        #[arg(short, long = "set", value_parser = parse_setting_entry)]
        set: Vec<SettingEntry>,

        /// Remove a value as category.item, repeatable
        #[arg(short, long = "unset", value_parser = parse_setting_path)]
        unset: Vec<(String, String)>,

        /// Replace the notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List setups, active ones first
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// Include archived sheets
        #[arg(short, long)]
        all: bool,
    },

    /// Show a setup
    Show {
        /// Sheet id
        id: i64,
    },

    /// Archive a setup, or restore an archived one
    Archive {
        /// Sheet id
        id: i64,
    },

    /// Delete a setup
    Delete {
        /// Sheet id
        id: i64,
    },
}

impl SettingCommand {
    /// Build the storage input for `add`.
    #[must_use]
    pub fn new_sheet(
        motorcycle_id: i64,
        name: &str,
        set: &[SettingEntry],
        notes: Option<&str>,
    ) -> NewSettingSheet {
        let mut details = SettingDetails::new();
        apply_settings(&mut details, set);
        NewSettingSheet {
            motorcycle_id,
            sheet_name: name.to_string(),
            details,
            notes: notes.map(str::to_string),
        }
    }
}

/// Track session commands.
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Start a session within an outing
    Create {
        /// Outing id
        activity: i64,

        /// Label such as "Sport 1"
        name: String,

        /// Setting sheet used
        #[arg(short, long)]
        setting: Option<i64>,
    },

    /// List sessions
    List {
        /// Only this vehicle
        #[arg(short = 'm', long)]
        vehicle: Option<i64>,

        /// Only this outing
        #[arg(short, long, conflicts_with = "vehicle")]
        activity: Option<i64>,
    },

    /// Link a session to a setting sheet
    Setting {
        /// Session id
        id: i64,

        /// Sheet id (omit to unlink)
        sheet: Option<i64>,
    },

    /// Show lap statistics for a session
    Show {
        /// Session id
        id: i64,

        /// Order of the lap table
        #[arg(short, long, value_enum, default_value = "record")]
        sort: LapSortArg,
    },

    /// Replace a session's laps with manually entered times
    Laps {
        /// Session id
        id: i64,

        /// Lap times such as 1:02.345
        #[arg(required = true)]
        times: Vec<String>,
    },

    /// Compare best and average laps across sessions
    Compare {
        /// Session ids
        #[arg(required = true, num_args = 2..)]
        ids: Vec<i64>,
    },

    /// Print a session's GPS track for one lap
    Track {
        /// Session id
        id: i64,

        /// Lap number
        #[arg(short, long, default_value = "1")]
        lap: u32,

        /// Douglas-Peucker tolerance in metres (defaults to configuration)
        #[arg(short, long)]
        epsilon: Option<f64>,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: i64,
    },
}

/// Lap file commands.
#[derive(Debug, Subcommand)]
pub enum LapsCommand {
    /// Import a lap timer file into a session
    Import {
        /// Session id
        session: i64,

        /// File exported by the lap timer
        file: PathBuf,

        /// Device that produced the file (detected when omitted)
        #[arg(short, long, value_enum)]
        device: Option<DeviceArg>,

        /// Drop laps slower than the median times the configured multiplier
        #[arg(short, long)]
        remove_outliers: bool,
    },

    /// Guess which device produced a file
    Detect {
        /// File exported by the lap timer
        file: PathBuf,
    },
}

/// Achievement commands.
#[derive(Debug, Subcommand)]
pub enum AchievementsCommand {
    /// List the catalog with unlock state
    List,

    /// Unlock everything the current records already satisfy
    Backfill,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Lap timer argument for imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    /// One lap time per line
    #[value(name = "simple_csv")]
    SimpleCsv,
    /// ZiiX lap timer
    Ziix,
    /// MYLAPS transponder export
    Mylaps,
    /// Drogger GPS logger
    Drogger,
    /// RaceChrono v3 CSV
    Racechrono,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::SimpleCsv => Self::SimpleCsv,
            DeviceArg::Ziix => Self::Ziix,
            DeviceArg::Mylaps => Self::Mylaps,
            DeviceArg::Drogger => Self::Drogger,
            DeviceArg::Racechrono => Self::Racechrono,
        }
    }
}

/// Lap table order argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LapSortArg {
    /// As recorded
    #[default]
    Record,
    /// Fastest first
    Fastest,
    /// Slowest first
    Slowest,
}

impl From<LapSortArg> for LapSort {
    fn from(arg: LapSortArg) -> Self {
        match arg {
            LapSortArg::Record => Self::RecordAsc,
            LapSortArg::Fastest => Self::TimeAsc,
            LapSortArg::Slowest => Self::TimeDesc,
        }
    }
}

/// Note category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NoteCategoryArg {
    /// Free-form note
    #[default]
    Note,
    /// Checklist
    Task,
}

impl From<NoteCategoryArg> for NoteCategory {
    fn from(arg: NoteCategoryArg) -> Self {
        match arg {
            NoteCategoryArg::Note => Self::Note,
            NoteCategoryArg::Task => Self::Task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_device_arg_conversion() {
        assert_eq!(Device::from(DeviceArg::SimpleCsv), Device::SimpleCsv);
        assert_eq!(Device::from(DeviceArg::Racechrono), Device::Racechrono);
        assert_eq!(
            DeviceArg::SimpleCsv.to_possible_value().unwrap().get_name(),
            Device::SimpleCsv.as_str()
        );
    }

    #[test]
    fn test_lap_sort_arg_conversion() {
        assert_eq!(LapSort::from(LapSortArg::default()), LapSort::RecordAsc);
        assert_eq!(LapSort::from(LapSortArg::Fastest), LapSort::TimeAsc);
        assert_eq!(LapSort::from(LapSortArg::Slowest), LapSort::TimeDesc);
    }

    #[test]
    fn test_note_category_arg_conversion() {
        assert_eq!(NoteCategory::from(NoteCategoryArg::Task), NoteCategory::Task);
        assert_eq!(NoteCategory::from(NoteCategoryArg::default()), NoteCategory::Note);
    }

    #[test]
    fn test_fuel_args_to_new_entry() {
        let args = FuelArgs {
            vehicle: None,
            date: None,
            odo: 1_234,
            litres: 9.5,
            price: Some(172.0),
            cost: None,
            station: Some("ENEOS".to_string()),
            partial: true,
            exclude: false,
            notes: None,
        };
        let entry = args.to_new_entry(7, date(2024, 6, 1));
        assert_eq!(entry.motorcycle_id, 7);
        assert_eq!(entry.entry_date, date(2024, 6, 1));
        assert!(!entry.is_full_tank);
        assert_eq!(entry.station_name.as_deref(), Some("ENEOS"));
    }

    #[test]
    fn test_activity_args_location() {
        let mut args = ActivityArgs {
            vehicle: None,
            date: None,
            title: "July practice".to_string(),
            circuit: Some("Tsukuba".to_string()),
            place: None,
            weather: None,
            temp: Some(-3.5),
            notes: None,
        };
        let activity = args.to_new_activity(2, date(2024, 7, 1));
        assert_eq!(activity.location, ActivityLocation::Circuit("Tsukuba".to_string()));
        assert_eq!(activity.activity_date, date(2024, 7, 1));
        assert_eq!(activity.temperature, Some(-3.5));

        args.circuit = None;
        args.place = Some("Hakone".to_string());
        let activity = args.to_new_activity(2, date(2024, 7, 1));
        assert_eq!(activity.location, ActivityLocation::Custom("Hakone".to_string()));
    }

    #[test]
    fn test_parse_setting_entry() {
        assert_eq!(
            parse_setting_entry("suspension.front_preload = 3").unwrap(),
            SettingEntry {
                category: "suspension".to_string(),
                item: "front_preload".to_string(),
                value: "3".to_string(),
            }
        );
        assert_eq!(
            parse_setting_entry("tires.note=a=b").unwrap().value,
            "a=b"
        );
        assert!(parse_setting_entry("preload=3").is_err());
        assert!(parse_setting_entry("suspension.preload").is_err());
        assert!(parse_setting_entry(".preload=3").is_err());
        assert_eq!(
            parse_setting_path("engine.sprocket").unwrap(),
            ("engine".to_string(), "sprocket".to_string())
        );
    }

    #[test]
    fn test_new_sheet_later_values_win() {
        let set = [
            parse_setting_entry("tires.front=2.0").unwrap(),
            parse_setting_entry("tires.front=1.9").unwrap(),
            parse_setting_entry("engine.sprocket=15").unwrap(),
        ];
        let sheet = SettingCommand::new_sheet(1, "baseline", &set, None);
        assert_eq!(sheet.details["tires"]["front"], "1.9");
        assert_eq!(sheet.details.len(), 2);
    }

    #[test]
    fn test_maint_args_keep_explicit_date() {
        let args = MaintArgs {
            vehicle: Some(1),
            date: Some(date(2024, 3, 1)),
            odo: 5_000,
            description: "chain".to_string(),
            category: None,
            parts: None,
            labor: Some(1000.0),
        };
        let entry = args.to_new_entry(1, date(2024, 6, 1));
        assert_eq!(entry.maintenance_date, date(2024, 3, 1));
        assert_eq!(entry.labor_cost, Some(1000.0));
    }
}
