//! Command-line interface for motolog.
//!
//! This module provides the CLI structure for the `motolog` binary. Handlers
//! live in the binary itself.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    apply_settings, AchievementsCommand, ActivityArgs, ActivityCommand, ConfigCommand,
    DeviceArg, FuelArgs, FuelCommand, LapSortArg, LapsCommand, MaintArgs, MaintCommand,
    NoteCategoryArg, NoteCommand, OdoCommand, ReminderCommand, SessionCommand, SettingCommand,
    SettingEntry, VehicleCommand,
};

/// motolog - A logbook for your motorcycles
///
/// Tracks fuel economy across odometer resets, maintenance and reminders,
/// and imports lap times from track-day timers.
#[derive(Debug, Parser)]
#[command(name = "motolog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage vehicles
    #[command(subcommand)]
    Vehicle(VehicleCommand),

    /// Log fuel-ups and show fuel economy
    #[command(subcommand)]
    Fuel(FuelCommand),

    /// Log maintenance
    #[command(subcommand)]
    Maint(MaintCommand),

    /// Record odometer resets
    #[command(subcommand)]
    Odo(OdoCommand),

    /// Manage maintenance reminders
    #[command(subcommand)]
    Reminder(ReminderCommand),

    /// Write notes and checklists
    #[command(subcommand)]
    Note(NoteCommand),

    /// Record outings and circuit bests
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Keep setting sheets for vehicle setups
    #[command(subcommand)]
    Setting(SettingCommand),

    /// Manage track sessions and lap statistics
    #[command(subcommand)]
    Session(SessionCommand),

    /// Import lap timer files
    #[command(subcommand)]
    Laps(LapsCommand),

    /// Show and backfill achievements
    #[command(subcommand)]
    Achievements(AchievementsCommand),

    /// Show record counts and database location
    Status,

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            json: false,
            command: Command::Status,
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "motolog");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_fuel_add() {
        let args = [
            "motolog", "fuel", "add", "-m", "2", "--odo", "12345", "--litres", "10.5", "--price",
            "172", "--date", "2024-06-01", "--partial",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Fuel(FuelCommand::Add(fuel)) = cli.command else {
            panic!("expected fuel add");
        };
        assert_eq!(fuel.vehicle, Some(2));
        assert_eq!(fuel.odo, 12_345);
        assert!(fuel.partial);
        assert_eq!(
            fuel.date,
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn test_parse_fuel_add_requires_reading() {
        let args = ["motolog", "fuel", "add", "--litres", "10"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_bad_date() {
        let args = ["motolog", "odo", "add", "--before", "9999", "--date", "2024-13-01"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_laps_import() {
        let args = [
            "motolog", "laps", "import", "3", "laps.csv", "--device", "simple_csv", "-r",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Laps(LapsCommand::Import {
                session: 3,
                device: Some(DeviceArg::SimpleCsv),
                remove_outliers: true,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_session_compare_needs_two() {
        assert!(Cli::try_parse_from(["motolog", "session", "compare", "1"]).is_err());
        let cli = Cli::try_parse_from(["motolog", "session", "compare", "1", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Session(SessionCommand::Compare { ref ids }) if ids == &[1, 2]
        ));
    }

    #[test]
    fn test_parse_session_show_sort() {
        let cli = Cli::try_parse_from(["motolog", "session", "show", "4", "--sort", "fastest"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Session(SessionCommand::Show {
                id: 4,
                sort: LapSortArg::Fastest
            })
        ));
    }

    #[test]
    fn test_parse_activity_add_needs_one_location() {
        let base = ["motolog", "activity", "add", "-t", "July practice"];
        assert!(Cli::try_parse_from(base).is_err());

        let with = |extra: &[&'static str]| base.iter().chain(extra).copied().collect::<Vec<_>>();

        assert!(Cli::try_parse_from(with(&["--circuit", "Tsukuba", "--place", "Hakone"])).is_err());

        let cli = Cli::try_parse_from(with(&["--circuit", "Tsukuba", "--temp", "-2.5"])).unwrap();
        let Command::Activity(ActivityCommand::Add(args)) = cli.command else {
            panic!("expected activity add");
        };
        assert_eq!(args.circuit.as_deref(), Some("Tsukuba"));
        assert_eq!(args.temp, Some(-2.5));
    }

    #[test]
    fn test_parse_setting_add_values() {
        let args = [
            "motolog", "setting", "add", "baseline", "--set", "suspension.preload=3", "-s",
            "tires.front=2.0",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Setting(SettingCommand::Add { set, .. }) = cli.command else {
            panic!("expected setting add");
        };
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].category, "tires");

        let bad = ["motolog", "setting", "add", "baseline", "--set", "preload"];
        assert!(Cli::try_parse_from(bad).is_err());
    }

    #[test]
    fn test_parse_session_create_takes_activity() {
        let cli = Cli::try_parse_from(["motolog", "session", "create", "3", "Sport 1", "-s", "4"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Session(SessionCommand::Create {
                activity: 3,
                setting: Some(4),
                ref name,
            }) if name == "Sport 1"
        ));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["motolog", "vehicle", "list", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["motolog", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_reminder_add() {
        let args = ["motolog", "reminder", "add", "--task", "oil", "--km", "3000", "--months", "6"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Reminder(ReminderCommand::Add {
                km: Some(3000),
                months: Some(6),
                ..
            })
        ));
    }
}
