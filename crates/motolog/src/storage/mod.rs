//! Storage layer for motolog.
//!
//! This module provides `SQLite`-based persistent storage for vehicles and
//! everything logged against them. Every query is scoped to a user: records
//! owned by someone else behave as if they did not exist.
//!
//! Derived columns (`total_distance` on fuel and maintenance rows, the
//! vehicle's `odometer_offset`) are only ever written through
//! [`Storage::recalculate_distances`], inside the same transaction as the
//! change that invalidated them.

mod achievements;
mod activities;
mod logs;
pub mod migrations;
mod notes;
mod odometer;
mod reminders;
pub mod schema;
mod sessions;
mod settings;
mod vehicles;

pub use activities::{ActivitySummary, CircuitBest};
pub use logs::{FuelLine, FuelReport};

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Storage engine for the logbook.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record counts for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self, user_id: i64) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [user_id], |row| row.get(0))?)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            vehicles: count("SELECT COUNT(*) FROM motorcycles WHERE user_id = ?1")?,
            fuel_entries: count(
                "SELECT COUNT(*) FROM fuel_entries f
                 JOIN motorcycles m ON m.id = f.motorcycle_id WHERE m.user_id = ?1",
            )?,
            maintenance_entries: count(
                "SELECT COUNT(*) FROM maintenance_entries e
                 JOIN motorcycles m ON m.id = e.motorcycle_id WHERE m.user_id = ?1",
            )?,
            odo_resets: count(
                "SELECT COUNT(*) FROM odo_reset_logs r
                 JOIN motorcycles m ON m.id = r.motorcycle_id WHERE m.user_id = ?1",
            )?,
            notes: count("SELECT COUNT(*) FROM general_notes WHERE user_id = ?1")?,
            activities: count(
                "SELECT COUNT(*) FROM activity_logs a
                 JOIN motorcycles m ON m.id = a.motorcycle_id WHERE m.user_id = ?1",
            )?,
            setting_sheets: count(
                "SELECT COUNT(*) FROM setting_sheets t
                 JOIN motorcycles m ON m.id = t.motorcycle_id WHERE m.user_id = ?1",
            )?,
            sessions: count(
                "SELECT COUNT(*) FROM session_logs s
                 JOIN motorcycles m ON m.id = s.motorcycle_id WHERE m.user_id = ?1",
            )?,
            achievements: count("SELECT COUNT(*) FROM user_achievements WHERE user_id = ?1")?,
            db_size_bytes,
        })
    }
}

/// Record counts for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Registered vehicles.
    pub vehicles: i64,
    /// Fuel entries across all vehicles.
    pub fuel_entries: i64,
    /// Maintenance entries across all vehicles.
    pub maintenance_entries: i64,
    /// Odometer resets across all vehicles.
    pub odo_resets: i64,
    /// Notes and tasks.
    pub notes: i64,
    /// Outings across all vehicles.
    pub activities: i64,
    /// Setting sheets across all vehicles.
    pub setting_sheets: i64,
    /// Track sessions.
    pub sessions: i64,
    /// Unlocked achievements.
    pub achievements: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Reject trimmed text longer than `max` characters.
fn check_length(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.trim().chars().count() > max {
        return Err(Error::validation(
            field,
            format!("must be {max} characters or fewer"),
        ));
    }
    Ok(())
}

/// Trim optional text, treating blank as absent.
fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Map a JSON decoding failure in column `index` to a row error.
fn json_column_error(index: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use super::Storage;
    use crate::model::{
        ActivityLocation, ActivityLog, Motorcycle, NewActivity, NewFuelEntry,
        NewMaintenanceEntry, NewMotorcycle, User,
    };

    pub fn storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn rider(storage: &Storage) -> User {
        storage.ensure_user("rider").unwrap()
    }

    pub fn bike(storage: &Storage, user: &User, name: &str) -> Motorcycle {
        storage
            .add_motorcycle(
                user.id,
                &NewMotorcycle {
                    name: name.to_string(),
                    ..NewMotorcycle::default()
                },
            )
            .unwrap()
    }

    pub fn fuel(motorcycle_id: i64, on: NaiveDate, reading: i64, litres: f64) -> NewFuelEntry {
        NewFuelEntry {
            motorcycle_id,
            entry_date: on,
            odometer_reading: reading,
            fuel_volume: litres,
            price_per_liter: None,
            total_cost: None,
            station_name: None,
            is_full_tank: true,
            exclude_from_average: false,
            notes: None,
        }
    }

    pub fn outing(motorcycle_id: i64, on: NaiveDate, circuit: &str) -> NewActivity {
        NewActivity {
            motorcycle_id,
            activity_date: on,
            activity_title: format!("{circuit} practice"),
            location: ActivityLocation::Circuit(circuit.to_string()),
            weather: None,
            temperature: None,
            notes: None,
        }
    }

    pub fn activity(storage: &Storage, user: &User, motorcycle: &Motorcycle) -> ActivityLog {
        storage
            .add_activity(user.id, &outing(motorcycle.id, date(2024, 7, 1), "Tsukuba"))
            .unwrap()
    }

    pub fn service(motorcycle_id: i64, on: NaiveDate, reading: i64) -> NewMaintenanceEntry {
        NewMaintenanceEntry {
            motorcycle_id,
            maintenance_date: on,
            odometer_reading: reading,
            description: "oil change".to_string(),
            category: Some("oil".to_string()),
            parts_cost: Some(3000.0),
            labor_cost: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.path(), Path::new(":memory:"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("motolog-test-{}", std::process::id()));
        let path = dir.join("nested").join("motolog.db");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let storage = Storage::open(&path).unwrap();
            let user = rider(&storage);
            bike(&storage, &user, "CB400SF");
        }
        let reopened = Storage::open(&path).unwrap();
        let user = rider(&reopened);
        assert_eq!(reopened.list_motorcycles(user.id).unwrap().len(), 1);
        assert!(reopened.stats(user.id).unwrap().db_size_bytes > 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stats_are_user_scoped() {
        let storage = storage();
        let user = rider(&storage);
        let other = storage.ensure_user("someone").unwrap();
        let cb = bike(&storage, &user, "CB400SF");
        bike(&storage, &other, "MT-07");
        storage
            .add_fuel_entry(user.id, &fuel(cb.id, date(2024, 1, 1), 1000, 10.0))
            .unwrap();

        let stats = storage.stats(user.id).unwrap();
        assert_eq!(stats.vehicles, 1);
        assert_eq!(stats.fuel_entries, 1);
        assert_eq!(stats.maintenance_entries, 0);
        assert_eq!(stats.db_size_bytes, 0);
    }
}
