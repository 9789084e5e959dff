//! `motolog` - CLI for the motorcycle logbook
//!
//! This binary exposes vehicle, fuel, maintenance, odometer, reminder, note,
//! outing, setting sheet, session and achievement operations on a local
//! database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, warn};

use motolog::achievements::{self, Event, EventKind, CATALOG};
use motolog::cli::{
    apply_settings, AchievementsCommand, ActivityCommand, Cli, Command, ConfigCommand,
    FuelCommand, LapsCommand, MaintCommand, NoteCommand, OdoCommand, ReminderCommand,
    SessionCommand, SettingCommand, VehicleCommand,
};
use motolog::distance::DistanceWarning;
use motolog::laps::{self, Device, ImportOptions, LapTime};
use motolog::model::{
    NewMotorcycle, NewNote, NewReminder, NewSettingSheet, SessionLog, SettingSheet,
};
use motolog::{fuel, init_logging, Config, Storage};

/// Everything a handler needs.
#[derive(Debug)]
struct App {
    storage: Storage,
    config: Config,
    user_id: i64,
    json: bool,
    today: NaiveDate,
}

impl App {
    /// Print `value` as JSON, or run `plain` for human output.
    fn emit<T: Serialize>(&self, value: &T, plain: impl FnOnce()) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            plain();
        }
        Ok(())
    }

    /// An explicit vehicle, or the default one.
    fn vehicle(&self, id: Option<i64>) -> anyhow::Result<i64> {
        if let Some(id) = id {
            return Ok(self.storage.get_motorcycle(self.user_id, id)?.id);
        }
        self.storage
            .default_motorcycle(self.user_id)?
            .map(|motorcycle| motorcycle.id)
            .ok_or_else(|| anyhow!("no vehicle registered, add one with `motolog vehicle add`"))
    }

    /// Evaluate achievements after a user action. Failures never fail the action.
    fn award(&self, event: Event) {
        match achievements::evaluate_event(&self.storage, self.user_id, &event) {
            Ok(unlocked) => {
                if !self.json {
                    for def in unlocked {
                        println!("Achievement unlocked: {} ({})", def.name, def.description);
                    }
                }
            }
            Err(e) => warn!("achievement evaluation failed: {e}"),
        }
    }
}

#[derive(Serialize)]
struct Logged<'a, T> {
    entry: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a DistanceWarning>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            // Bad input and missing records exit with 2, everything else with 1
            let user_error = err
                .downcast_ref::<motolog::Error>()
                .is_some_and(|e| e.is_user_error() || e.is_not_found());
            if user_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    if let Command::Config(cmd) = &cli.command {
        return handle_config(&config, cmd, cli.json);
    }

    let storage = Storage::open(config.database_path())
        .with_context(|| format!("failed to open {}", config.database_path().display()))?;
    let user = storage.ensure_user(&config.user.username)?;
    debug!(user = %user.username, "using profile");

    let app = App {
        storage,
        config,
        user_id: user.id,
        json: cli.json,
        today: chrono::Local::now().date_naive(),
    };

    match &cli.command {
        Command::Vehicle(cmd) => handle_vehicle(&app, cmd),
        Command::Fuel(cmd) => handle_fuel(&app, cmd),
        Command::Maint(cmd) => handle_maint(&app, cmd),
        Command::Odo(cmd) => handle_odo(&app, cmd),
        Command::Reminder(cmd) => handle_reminder(&app, cmd),
        Command::Note(cmd) => handle_note(&app, cmd),
        Command::Activity(cmd) => handle_activity(&app, cmd),
        Command::Setting(cmd) => handle_setting(&app, cmd),
        Command::Session(cmd) => handle_session(&app, cmd),
        Command::Laps(cmd) => handle_laps(&app, cmd),
        Command::Achievements(cmd) => handle_achievements(&app, cmd),
        Command::Status => handle_status(&app),
        Command::Config(_) => Ok(()),
    }
}

fn handle_vehicle(app: &App, cmd: &VehicleCommand) -> anyhow::Result<()> {
    match cmd {
        VehicleCommand::Add {
            name,
            maker,
            year,
            racer,
        } => {
            let motorcycle = app.storage.add_motorcycle(
                app.user_id,
                &NewMotorcycle {
                    maker: maker.clone(),
                    name: name.clone(),
                    year: *year,
                    is_racer: *racer,
                },
            )?;
            app.emit(&motorcycle, || {
                println!("Added vehicle #{} {}", motorcycle.id, motorcycle.name);
            })?;
            app.award(Event::new(EventKind::AddVehicle));
        }
        VehicleCommand::List => {
            let motorcycles = app.storage.list_motorcycles(app.user_id)?;
            app.emit(&motorcycles, || {
                if motorcycles.is_empty() {
                    println!("No vehicles registered.");
                }
                for m in &motorcycles {
                    println!(
                        "{}#{:<4} {}{}{}",
                        if m.is_default { "* " } else { "  " },
                        m.id,
                        m.maker.as_deref().map(|maker| format!("{maker} ")).unwrap_or_default(),
                        m.name,
                        if m.is_racer { " [racer]" } else { "" }
                    );
                }
            })?;
        }
        VehicleCommand::Show { id } => {
            let motorcycle = app.storage.get_motorcycle(app.user_id, *id)?;
            let mileage = app.storage.vehicle_mileage(app.user_id, *id)?;
            let report = app.storage.fuel_report(app.user_id, *id)?;
            let value = serde_json::json!({
                "vehicle": motorcycle,
                "mileage_km": mileage,
                "average_kpl": report.average_kpl,
            });
            app.emit(&value, || {
                println!("#{} {}", motorcycle.id, motorcycle.name);
                println!("  Mileage:        {mileage} km");
                println!("  Reset offset:   {} km", motorcycle.odometer_offset);
                match report.average_kpl {
                    Some(kpl) => println!("  Average:        {kpl:.2} km/L"),
                    None => println!("  Average:        -"),
                }
                if let Some(hours) = motorcycle.total_operating_hours {
                    println!("  Operating time: {hours:.1} h");
                }
            })?;
        }
        VehicleCommand::Default { id } => {
            app.storage.set_default_motorcycle(app.user_id, *id)?;
            if !app.json {
                println!("Vehicle #{id} is now the default.");
            }
        }
        VehicleCommand::Hours { id, hours } => {
            app.storage.set_operating_hours(app.user_id, *id, *hours)?;
            if !app.json {
                println!("Vehicle #{id} now has {hours:.1} operating hours.");
            }
        }
        VehicleCommand::Delete { id } => {
            app.storage.delete_motorcycle(app.user_id, *id)?;
            if !app.json {
                println!("Deleted vehicle #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_fuel(app: &App, cmd: &FuelCommand) -> anyhow::Result<()> {
    match cmd {
        FuelCommand::Add(args) => {
            let motorcycle_id = app.vehicle(args.vehicle)?;
            let (entry, warning) = app
                .storage
                .add_fuel_entry(app.user_id, &args.to_new_entry(motorcycle_id, app.today))?;
            let logged = Logged {
                entry: &entry,
                warning: warning.as_ref(),
            };
            app.emit(&logged, || {
                println!(
                    "Logged fuel entry #{} ({} km total)",
                    entry.id, entry.total_distance
                );
            })?;
            app.award(Event::on_vehicle(EventKind::AddFuelLog, motorcycle_id));
        }
        FuelCommand::Edit { id, entry } => {
            let motorcycle_id = app.vehicle(entry.vehicle)?;
            let (updated, warning) = app.storage.update_fuel_entry(
                app.user_id,
                *id,
                &entry.to_new_entry(motorcycle_id, app.today),
            )?;
            let logged = Logged {
                entry: &updated,
                warning: warning.as_ref(),
            };
            app.emit(&logged, || println!("Updated fuel entry #{id}"))?;
        }
        FuelCommand::List { vehicle } => {
            let entries = app.storage.list_fuel_entries(app.user_id, *vehicle)?;
            let kpl = fuel::kpl_bulk(&entries);
            let lines: Vec<serde_json::Value> = entries
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "entry": entry,
                        "kpl": kpl.get(&entry.id).copied().flatten(),
                    })
                })
                .collect();
            app.emit(&lines, || {
                for entry in &entries {
                    println!(
                        "#{:<5} {}  vehicle {:<3} {:>7} km  {:>6.2} L{}  {}",
                        entry.id,
                        entry.entry_date,
                        entry.motorcycle_id,
                        entry.total_distance,
                        entry.fuel_volume,
                        if entry.is_full_tank { " " } else { "*" },
                        kpl.get(&entry.id)
                            .copied()
                            .flatten()
                            .map_or_else(String::new, |k| format!("{k:.2} km/L"))
                    );
                }
            })?;
        }
        FuelCommand::Report { vehicle } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let report = app.storage.fuel_report(app.user_id, motorcycle_id)?;
            app.emit(&report, || {
                println!("Fuel entries:   {}", report.lines.len());
                println!("Distance:       {} km", report.distance_km);
                println!("Total cost:     {}", report.total_cost);
                match report.average_kpl {
                    Some(kpl) => println!("Average:        {kpl:.2} km/L"),
                    None => println!("Average:        -"),
                }
            })?;
        }
        FuelCommand::Delete { id } => {
            app.storage.delete_fuel_entry(app.user_id, *id)?;
            if !app.json {
                println!("Deleted fuel entry #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_maint(app: &App, cmd: &MaintCommand) -> anyhow::Result<()> {
    match cmd {
        MaintCommand::Add(args) => {
            let motorcycle_id = app.vehicle(args.vehicle)?;
            let (entry, warning) = app
                .storage
                .add_maintenance_entry(app.user_id, &args.to_new_entry(motorcycle_id, app.today))?;
            let logged = Logged {
                entry: &entry,
                warning: warning.as_ref(),
            };
            app.emit(&logged, || {
                println!(
                    "Logged maintenance #{} ({} km total)",
                    entry.id, entry.total_distance
                );
            })?;
            app.award(Event::on_vehicle(EventKind::AddMaintenanceLog, motorcycle_id));
        }
        MaintCommand::Edit { id, entry } => {
            let motorcycle_id = app.vehicle(entry.vehicle)?;
            let (updated, warning) = app.storage.update_maintenance_entry(
                app.user_id,
                *id,
                &entry.to_new_entry(motorcycle_id, app.today),
            )?;
            let logged = Logged {
                entry: &updated,
                warning: warning.as_ref(),
            };
            app.emit(&logged, || println!("Updated maintenance entry #{id}"))?;
        }
        MaintCommand::List { vehicle } => {
            let entries = app.storage.list_maintenance_entries(app.user_id, *vehicle)?;
            app.emit(&entries, || {
                for entry in &entries {
                    println!(
                        "#{:<5} {}  vehicle {:<3} {:>7} km  {}  {:.0}",
                        entry.id,
                        entry.maintenance_date,
                        entry.motorcycle_id,
                        entry.total_distance,
                        entry.description,
                        entry.total_cost()
                    );
                }
            })?;
        }
        MaintCommand::Delete { id } => {
            app.storage.delete_maintenance_entry(app.user_id, *id)?;
            if !app.json {
                println!("Deleted maintenance entry #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_odo(app: &App, cmd: &OdoCommand) -> anyhow::Result<()> {
    match cmd {
        OdoCommand::Add {
            vehicle,
            date,
            before,
            after,
        } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let reset = app.storage.add_odo_reset(
                app.user_id,
                motorcycle_id,
                date.unwrap_or(app.today),
                *before,
                *after,
                app.today,
            )?;
            app.emit(&reset, || {
                println!(
                    "Recorded reset #{} (+{} km offset)",
                    reset.id, reset.offset_increment
                );
            })?;
            app.award(Event::on_vehicle(EventKind::AddOdoReset, motorcycle_id));
        }
        OdoCommand::Edit {
            id,
            date,
            before,
            after,
        } => {
            let reset = app
                .storage
                .update_odo_reset(app.user_id, *id, *date, *before, *after, app.today)?;
            app.emit(&reset, || println!("Updated reset #{id}"))?;
        }
        OdoCommand::List { vehicle } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let resets = app.storage.list_odo_resets(app.user_id, motorcycle_id)?;
            app.emit(&resets, || {
                for reset in &resets {
                    println!(
                        "#{:<4} {}  {} -> {}  (+{} km)",
                        reset.id,
                        reset.reset_date,
                        reset.display_odo_before_reset,
                        reset.display_odo_after_reset,
                        reset.offset_increment
                    );
                }
            })?;
        }
        OdoCommand::Delete { id } => {
            app.storage.delete_odo_reset(app.user_id, *id)?;
            if !app.json {
                println!("Deleted reset #{id}.");
            }
        }
        OdoCommand::Recalc { vehicle } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let changed = app
                .storage
                .recalculate_distances(app.user_id, motorcycle_id)?;
            app.emit(&serde_json::json!({ "changed": changed }), || {
                println!("Recalculated distances, {changed} records changed.");
            })?;
        }
        OdoCommand::Check { vehicle } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let warnings = app.storage.distance_warnings(app.user_id, motorcycle_id)?;
            app.emit(&warnings, || {
                if warnings.is_empty() {
                    println!("All distances increase over time.");
                }
                for warning in &warnings {
                    println!("{warning}");
                }
            })?;
        }
    }
    Ok(())
}

fn handle_reminder(app: &App, cmd: &ReminderCommand) -> anyhow::Result<()> {
    match cmd {
        ReminderCommand::Add {
            vehicle,
            task,
            km,
            months,
            last_date,
            last_km,
        } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let reminder = app.storage.add_reminder(
                app.user_id,
                &NewReminder {
                    motorcycle_id,
                    task_description: task.clone(),
                    interval_km: *km,
                    interval_months: *months,
                    last_done_date: *last_date,
                    last_done_km: *last_km,
                },
            )?;
            app.emit(&reminder, || println!("Added reminder #{}", reminder.id))?;
        }
        ReminderCommand::List { vehicle } => {
            let reminders = app.storage.list_reminders(app.user_id, *vehicle)?;
            app.emit(&reminders, || {
                for r in &reminders {
                    let km = r.interval_km.map(|km| format!("every {km} km"));
                    let months = r.interval_months.map(|m| format!("every {m} months"));
                    let schedule: Vec<String> = km.into_iter().chain(months).collect();
                    println!("#{:<4} {}  ({})", r.id, r.task_description, schedule.join(", "));
                }
            })?;
        }
        ReminderCommand::Due { date } => {
            let due = app.storage.due_reminders(
                app.user_id,
                date.unwrap_or(app.today),
                &app.config.reminders,
            )?;
            app.emit(&due, || {
                if due.is_empty() {
                    println!("Nothing due.");
                }
                for check in &due {
                    println!(
                        "[{}] {}: {} - {}",
                        check.status,
                        check.vehicle_name,
                        check.reminder.task_description,
                        check.messages.join(", ")
                    );
                }
            })?;
        }
        ReminderCommand::Done { id, date } => {
            let reminder =
                app.storage
                    .complete_reminder(app.user_id, *id, date.unwrap_or(app.today))?;
            app.emit(&reminder, || println!("Marked reminder #{id} as done."))?;
        }
        ReminderCommand::Delete { id } => {
            app.storage.delete_reminder(app.user_id, *id)?;
            if !app.json {
                println!("Deleted reminder #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_note(app: &App, cmd: &NoteCommand) -> anyhow::Result<()> {
    match cmd {
        NoteCommand::Add {
            content,
            title,
            vehicle,
            date,
            category,
        } => {
            let note = app.storage.add_note(
                app.user_id,
                &NewNote {
                    motorcycle_id: *vehicle,
                    note_date: date.unwrap_or(app.today),
                    title: title.clone(),
                    content: content.clone(),
                    category: (*category).into(),
                },
            )?;
            app.emit(&note, || println!("Saved {} #{}", note.category, note.id))?;
            app.award(Event::new(EventKind::AddNote));
        }
        NoteCommand::List { vehicle, category } => {
            let notes =
                app.storage
                    .list_notes(app.user_id, *vehicle, category.map(Into::into))?;
            app.emit(&notes, || {
                for note in &notes {
                    println!(
                        "#{:<4} {} [{}] {}",
                        note.id,
                        note.note_date,
                        note.category,
                        note.title
                            .as_deref()
                            .or(note.content.as_deref())
                            .unwrap_or_default()
                    );
                }
            })?;
        }
        NoteCommand::Delete { id } => {
            app.storage.delete_note(app.user_id, *id)?;
            if !app.json {
                println!("Deleted note #{id}.");
            }
        }
    }
    Ok(())
}

fn print_sessions(sessions: &[SessionLog]) {
    for s in sessions {
        println!(
            "#{:<4} {:<20} {:>3} laps  best {}",
            s.id,
            s.session_name,
            s.lap_times.len(),
            s.best_lap.map_or_else(|| "-".to_string(), |t| t.to_string())
        );
    }
}

fn handle_activity(app: &App, cmd: &ActivityCommand) -> anyhow::Result<()> {
    match cmd {
        ActivityCommand::Add(args) => {
            let motorcycle_id = app.vehicle(args.vehicle)?;
            let activity = app
                .storage
                .add_activity(app.user_id, &args.to_new_activity(motorcycle_id, app.today))?;
            app.emit(&activity, || {
                println!(
                    "Recorded activity #{} {} at {}",
                    activity.id, activity.activity_title, activity.location
                );
            })?;
        }
        ActivityCommand::Edit { id, activity } => {
            let existing = app.storage.get_activity(app.user_id, *id)?;
            let motorcycle_id = activity.vehicle.unwrap_or(existing.motorcycle_id);
            let new = activity.to_new_activity(motorcycle_id, existing.activity_date);
            let updated = app.storage.update_activity(app.user_id, *id, &new)?;
            app.emit(&updated, || println!("Updated activity #{id}"))?;
        }
        ActivityCommand::List { vehicle } => {
            let activities = app.storage.list_activities(app.user_id, *vehicle)?;
            app.emit(&activities, || {
                for summary in &activities {
                    let a = &summary.activity;
                    println!(
                        "#{:<4} {} {:<24} {:<20} {:>2} sessions  best {}",
                        a.id,
                        a.activity_date,
                        a.activity_title,
                        a.location,
                        summary.session_count,
                        summary
                            .best_lap
                            .map_or_else(|| "-".to_string(), |t| t.to_string())
                    );
                }
            })?;
        }
        ActivityCommand::Show { id } => {
            let activity = app.storage.get_activity(app.user_id, *id)?;
            let sessions = app.storage.list_activity_sessions(app.user_id, *id)?;
            let value = serde_json::json!({ "activity": activity, "sessions": sessions });
            app.emit(&value, || {
                println!("{} ({})", activity.activity_title, activity.activity_date);
                println!("  Location: {}", activity.location);
                if let Some(weather) = &activity.weather {
                    println!("  Weather:  {weather}");
                }
                if let Some(temperature) = activity.temperature {
                    println!("  Temp:     {temperature:.1} C");
                }
                if let Some(notes) = &activity.notes {
                    println!("  Notes:    {notes}");
                }
                println!();
                print_sessions(&sessions);
            })?;
        }
        ActivityCommand::Delete { id } => {
            app.storage.delete_activity(app.user_id, *id)?;
            if !app.json {
                println!("Deleted activity #{id} and its sessions.");
            }
        }
        ActivityCommand::Circuits => {
            let bests = app.storage.circuit_bests(app.user_id)?;
            app.emit(&bests, || {
                if bests.is_empty() {
                    println!("No timed sessions at a circuit yet.");
                }
                for best in &bests {
                    println!(
                        "{:<24} {}  {} on {} ({}, session #{})  {} timed sessions",
                        best.circuit_name,
                        best.best_lap,
                        best.activity_date,
                        best.motorcycle_name,
                        best.session_name,
                        best.session_id,
                        best.timed_sessions
                    );
                }
            })?;
        }
    }
    Ok(())
}

fn print_sheet(sheet: &SettingSheet) {
    println!(
        "#{} {}{}",
        sheet.id,
        sheet.sheet_name,
        if sheet.is_archived { " (archived)" } else { "" }
    );
    for (category, items) in &sheet.details {
        println!("  {category}");
        for (item, value) in items {
            println!("    {item}: {value}");
        }
    }
    if let Some(notes) = &sheet.notes {
        println!("  Notes: {notes}");
    }
}

fn handle_setting(app: &App, cmd: &SettingCommand) -> anyhow::Result<()> {
    match cmd {
        SettingCommand::Add {
            name,
            vehicle,
            set,
            notes,
        } => {
            let motorcycle_id = app.vehicle(*vehicle)?;
            let new = SettingCommand::new_sheet(motorcycle_id, name, set, notes.as_deref());
            let sheet = app.storage.add_setting_sheet(app.user_id, &new)?;
            app.emit(&sheet, || {
                println!("Saved setting sheet #{} {}", sheet.id, sheet.sheet_name);
            })?;
        }
        SettingCommand::Edit {
            id,
            name,
            set,
            unset,
            notes,
        } => {
            let existing = app.storage.get_setting_sheet(app.user_id, *id)?;
            let mut details = existing.details;
            for (category, item) in unset {
                let emptied = details.get_mut(category).is_some_and(|items| {
                    items.remove(item);
                    items.is_empty()
                });
                if emptied {
                    details.remove(category);
                }
            }
            apply_settings(&mut details, set);
            let new = NewSettingSheet {
                motorcycle_id: existing.motorcycle_id,
                sheet_name: name.clone().unwrap_or(existing.sheet_name),
                details,
                notes: notes.clone().or(existing.notes),
            };
            let sheet = app.storage.update_setting_sheet(app.user_id, *id, &new)?;
            app.emit(&sheet, || print_sheet(&sheet))?;
        }
        SettingCommand::List { vehicle, all } => {
            let sheets = app.storage.list_setting_sheets(app.user_id, *vehicle, *all)?;
            app.emit(&sheets, || {
                for sheet in &sheets {
                    println!(
                        "#{:<4} {:<24} {:>2} values{}",
                        sheet.id,
                        sheet.sheet_name,
                        sheet.details.values().map(std::collections::BTreeMap::len).sum::<usize>(),
                        if sheet.is_archived { "  archived" } else { "" }
                    );
                }
            })?;
        }
        SettingCommand::Show { id } => {
            let sheet = app.storage.get_setting_sheet(app.user_id, *id)?;
            app.emit(&sheet, || print_sheet(&sheet))?;
        }
        SettingCommand::Archive { id } => {
            let sheet = app.storage.toggle_setting_archive(app.user_id, *id)?;
            app.emit(&sheet, || {
                let state = if sheet.is_archived { "Archived" } else { "Restored" };
                println!("{state} setting sheet #{id}");
            })?;
        }
        SettingCommand::Delete { id } => {
            app.storage.delete_setting_sheet(app.user_id, *id)?;
            if !app.json {
                println!("Deleted setting sheet #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_session(app: &App, cmd: &SessionCommand) -> anyhow::Result<()> {
    match cmd {
        SessionCommand::Create {
            activity,
            name,
            setting,
        } => {
            let session = app
                .storage
                .create_session(app.user_id, *activity, name, *setting)?;
            app.emit(&session, || {
                println!("Created session #{} {}", session.id, session.session_name);
            })?;
        }
        SessionCommand::List { vehicle, activity } => {
            let sessions = match activity {
                Some(activity_id) => app.storage.list_activity_sessions(app.user_id, *activity_id)?,
                None => app.storage.list_sessions(app.user_id, *vehicle)?,
            };
            app.emit(&sessions, || print_sessions(&sessions))?;
        }
        SessionCommand::Setting { id, sheet } => {
            let session = app.storage.set_session_setting(app.user_id, *id, *sheet)?;
            app.emit(&session, || match sheet {
                Some(sheet_id) => println!("Session #{id} now uses setting sheet #{sheet_id}"),
                None => println!("Session #{id} has no setting sheet"),
            })?;
        }
        SessionCommand::Show { id, sort } => {
            let session = app.storage.get_session(app.user_id, *id)?;
            let texts: Vec<String> = session.lap_times.iter().map(ToString::to_string).collect();
            let stats = laps::lap_stats(&texts, (*sort).into());
            app.emit(&stats, || match &stats {
                None => println!("Session #{id} has no laps."),
                Some(stats) => {
                    println!("{}", session.session_name);
                    println!("  Best:    {}", stats.best);
                    println!("  Average: {}", stats.average);
                    println!();
                    for lap in &stats.details {
                        println!(
                            "  {:>3}  {}  {}{}",
                            lap.lap_num,
                            lap.time,
                            lap.gap,
                            if lap.is_best { "  best" } else { "" }
                        );
                    }
                }
            })?;
        }
        SessionCommand::Laps { id, times } => {
            let parsed = times
                .iter()
                .map(|text| {
                    LapTime::parse(text).ok_or_else(|| anyhow!("invalid lap time '{text}'"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let session = app.storage.set_lap_times(app.user_id, *id, &parsed)?;
            app.emit(&session, || {
                println!("Stored {} laps on session #{id}", session.lap_times.len());
            })?;
        }
        SessionCommand::Compare { ids } => {
            let sessions = ids
                .iter()
                .map(|id| -> anyhow::Result<(String, Vec<LapTime>)> {
                    let session = app.storage.get_session(app.user_id, *id)?;
                    Ok((session.session_name, session.lap_times))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let comparison = laps::compare_sessions(&sessions)?;
            app.emit(&comparison, || {
                for row in &comparison {
                    println!(
                        "{:<20} best {} {:<10} avg {} {}",
                        row.name,
                        row.best.map_or_else(|| "-".to_string(), |t| t.to_string()),
                        row.best_gap,
                        row.average.map_or_else(|| "-".to_string(), |t| t.to_string()),
                        row.average_gap
                    );
                }
            })?;
        }
        SessionCommand::Track { id, lap, epsilon } => {
            let session = app.storage.get_session(app.user_id, *id)?;
            let Some(points) = session.gps_tracks.as_ref().and_then(|t| t.get(lap)) else {
                bail!("session #{id} has no GPS track for lap {lap}");
            };
            let epsilon = epsilon.unwrap_or(app.config.laps.simplify_epsilon);
            let simplified = laps::simplify_track(points, epsilon);
            debug!(
                original = points.len(),
                simplified = simplified.len(),
                "simplified track"
            );
            app.emit(&simplified, || {
                for p in &simplified {
                    println!("{:.6},{:.6},{:.1}", p.lat, p.lng, p.speed);
                }
            })?;
        }
        SessionCommand::Delete { id } => {
            app.storage.delete_session(app.user_id, *id)?;
            if !app.json {
                println!("Deleted session #{id}.");
            }
        }
    }
    Ok(())
}

fn handle_laps(app: &App, cmd: &LapsCommand) -> anyhow::Result<()> {
    match cmd {
        LapsCommand::Import {
            session,
            file,
            device,
            remove_outliers,
        } => {
            let bytes = std::fs::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let device = match device {
                Some(arg) => Device::from(*arg),
                None => laps::detect_device(&bytes)
                    .ok_or_else(|| anyhow!("could not detect the device, pass --device"))?,
            };
            let options = ImportOptions::from_config(device, &app.config.laps)
                .remove_outliers(*remove_outliers);
            let import = laps::import_laps(&bytes, &options)?;
            let stored = app.storage.store_laps(app.user_id, *session, &import)?;
            app.emit(&stored, || {
                println!(
                    "Imported {} laps from {} into session #{}",
                    import.lap_times.len(),
                    device,
                    stored.id
                );
                if import.removed_outliers > 0 {
                    println!("  Removed {} outlier laps", import.removed_outliers);
                }
                if let Some(best) = import.best_lap {
                    println!("  Best lap: {best}");
                }
            })?;
        }
        LapsCommand::Detect { file } => {
            let bytes = std::fs::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let detected = laps::detect_device(&bytes);
            app.emit(&detected, || match detected {
                Some(device) => println!("{device}"),
                None => println!("Unknown format"),
            })?;
        }
    }
    Ok(())
}

fn handle_achievements(app: &App, cmd: &AchievementsCommand) -> anyhow::Result<()> {
    match cmd {
        AchievementsCommand::List => {
            let unlocked: HashMap<String, _> = app
                .storage
                .list_achievements(app.user_id)?
                .into_iter()
                .map(|a| (a.achievement_code, a.unlocked_at))
                .collect();
            let rows: Vec<serde_json::Value> = CATALOG
                .iter()
                .map(|def| {
                    serde_json::json!({
                        "definition": def,
                        "unlocked_at": unlocked.get(def.code),
                    })
                })
                .collect();
            app.emit(&rows, || {
                for def in CATALOG {
                    let mark = if unlocked.contains_key(def.code) { "x" } else { " " };
                    println!("[{mark}] {:<26} {} - {}", def.code, def.name, def.description);
                }
            })?;
        }
        AchievementsCommand::Backfill => {
            let unlocked = achievements::backfill(&app.storage, app.user_id)?;
            app.emit(&unlocked, || {
                if unlocked.is_empty() {
                    println!("Nothing new to unlock.");
                }
                for def in &unlocked {
                    println!("Unlocked {} ({})", def.name, def.code);
                }
            })?;
        }
    }
    Ok(())
}

fn handle_status(app: &App) -> anyhow::Result<()> {
    let stats = app.storage.stats(app.user_id)?;
    let value = serde_json::json!({
        "database_path": app.storage.path(),
        "user": app.config.user.username,
        "stats": stats,
    });
    app.emit(&value, || {
        println!("motolog status");
        println!("--------------");
        println!("Database:      {}", app.storage.path().display());
        println!("User:          {}", app.config.user.username);
        println!("Vehicles:      {}", stats.vehicles);
        println!("Fuel entries:  {}", stats.fuel_entries);
        println!("Maintenance:   {}", stats.maintenance_entries);
        println!("Resets:        {}", stats.odo_resets);
        println!("Notes:         {}", stats.notes);
        println!("Activities:    {}", stats.activities);
        println!("Setting sheets: {}", stats.setting_sheets);
        println!("Sessions:      {}", stats.sessions);
        println!("Achievements:  {}/{}", stats.achievements, CATALOG.len());
        println!("Size:          {} bytes", stats.db_size_bytes);
    })
}

fn handle_config(config: &Config, cmd: &ConfigCommand, json: bool) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Laps]");
                println!("  Max laps:           {}", config.laps.max_laps);
                println!("  Max file bytes:     {}", config.laps.max_file_bytes);
                println!("  Outlier multiplier: {}", config.laps.outlier_multiplier);
                println!("  Simplify epsilon:   {} m", config.laps.simplify_epsilon);
                println!();
                println!("[Reminders]");
                println!("  Warning within:     {} km / {} days", config.reminders.km_warning, config.reminders.days_warning);
                println!("  Danger within:      {} km / {} days", config.reminders.km_danger, config.reminders.days_danger);
                println!();
                println!("[User]");
                println!("  Username:           {}", config.user.username);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
