use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::Storage;
use crate::distance::{self, DistanceRecord, DistanceWarning, OffsetTimeline, RecordKind};
use crate::error::{Error, Result};
use crate::fuel;
use crate::model::{FuelEntry, MaintenanceEntry, NewFuelEntry, NewMaintenanceEntry};

const FUEL_COLUMNS: &str = "f.id, f.motorcycle_id, f.entry_date, f.odometer_reading, \
     f.total_distance, f.fuel_volume, f.price_per_liter, f.total_cost, f.station_name, \
     f.is_full_tank, f.exclude_from_average, f.notes";

const MAINTENANCE_COLUMNS: &str = "e.id, e.motorcycle_id, e.maintenance_date, \
     e.odometer_reading, e.total_distance, e.description, e.category, e.parts_cost, e.labor_cost";

/// A fuel entry with its computed economy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelLine {
    /// The stored entry.
    #[serde(flatten)]
    pub entry: FuelEntry,
    /// km/L since the previous full tank.
    pub kpl: Option<f64>,
}

/// Fuel history and economy for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelReport {
    /// Vehicle the report covers.
    pub motorcycle_id: i64,
    /// Entries, newest first.
    pub lines: Vec<FuelLine>,
    /// Vehicle-wide km/L.
    pub average_kpl: Option<f64>,
    /// Distance covered across the logged entries.
    pub distance_km: i64,
    /// Sum of all recorded costs.
    pub total_cost: i64,
}

fn validate_reading(odometer_reading: i64) -> Result<()> {
    if odometer_reading < 0 {
        return Err(Error::validation(
            "odometer_reading",
            "meter readings must be 0 or more",
        ));
    }
    Ok(())
}

fn validate_fuel(new: &NewFuelEntry) -> Result<()> {
    validate_reading(new.odometer_reading)?;
    if new.fuel_volume.is_nan() || new.fuel_volume <= 0.0 {
        return Err(Error::validation("fuel_volume", "must be greater than 0"));
    }
    if new.price_per_liter.is_some_and(|price| price.is_nan() || price < 0.0) {
        return Err(Error::validation("price_per_liter", "cannot be negative"));
    }
    if new.total_cost.is_some_and(|cost| cost.is_nan() || cost < 0.0) {
        return Err(Error::validation("total_cost", "cannot be negative"));
    }
    Ok(())
}

fn validate_maintenance(new: &NewMaintenanceEntry) -> Result<()> {
    validate_reading(new.odometer_reading)?;
    if new.description.trim().is_empty() {
        return Err(Error::validation("description", "is required"));
    }
    for (field, cost) in [("parts_cost", new.parts_cost), ("labor_cost", new.labor_cost)] {
        if cost.is_some_and(|c| c.is_nan() || c < 0.0) {
            return Err(Error::validation(field, "cannot be negative"));
        }
    }
    Ok(())
}

impl Storage {
    /// Log a fuel-up.
    ///
    /// The lifetime distance is derived from the reading and the resets in
    /// effect on the entry date. A warning is returned, not raised, when the
    /// result is lower than the previous fuel entry's.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the vehicle is not the user's,
    /// or the database operation fails.
    pub fn add_fuel_entry(
        &self,
        user_id: i64,
        new: &NewFuelEntry,
    ) -> Result<(FuelEntry, Option<DistanceWarning>)> {
        validate_fuel(new)?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        let total_distance = self.total_distance_on(
            new.motorcycle_id,
            new.odometer_reading,
            new.entry_date,
        )?;
        let warning = self.check_new_record(
            new.motorcycle_id,
            RecordKind::Fuel,
            None,
            new.entry_date,
            new.odometer_reading,
            total_distance,
        )?;

        self.conn.execute(
            r"
            INSERT INTO fuel_entries (
                motorcycle_id, entry_date, odometer_reading, total_distance, fuel_volume,
                price_per_liter, total_cost, station_name, is_full_tank,
                exclude_from_average, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                new.motorcycle_id,
                new.entry_date,
                new.odometer_reading,
                total_distance,
                new.fuel_volume,
                new.price_per_liter,
                fuel::resolve_total_cost(new.total_cost, new.price_per_liter, new.fuel_volume),
                new.station_name,
                new.is_full_tank,
                new.exclude_from_average,
                new.notes,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted fuel entry with id {}", id);
        Ok((self.get_fuel_entry(user_id, id)?, warning))
    }

    /// Replace a fuel entry's fields and recompute its lifetime distance.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the entry or target vehicle is
    /// not the user's, or the database operation fails.
    pub fn update_fuel_entry(
        &self,
        user_id: i64,
        entry_id: i64,
        new: &NewFuelEntry,
    ) -> Result<(FuelEntry, Option<DistanceWarning>)> {
        validate_fuel(new)?;
        self.get_fuel_entry(user_id, entry_id)?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        let total_distance = self.total_distance_on(
            new.motorcycle_id,
            new.odometer_reading,
            new.entry_date,
        )?;
        let warning = self.check_new_record(
            new.motorcycle_id,
            RecordKind::Fuel,
            Some(entry_id),
            new.entry_date,
            new.odometer_reading,
            total_distance,
        )?;

        self.conn.execute(
            r"
            UPDATE fuel_entries SET
                motorcycle_id = ?1, entry_date = ?2, odometer_reading = ?3,
                total_distance = ?4, fuel_volume = ?5, price_per_liter = ?6,
                total_cost = ?7, station_name = ?8, is_full_tank = ?9,
                exclude_from_average = ?10, notes = ?11
            WHERE id = ?12
            ",
            params![
                new.motorcycle_id,
                new.entry_date,
                new.odometer_reading,
                total_distance,
                new.fuel_volume,
                new.price_per_liter,
                fuel::resolve_total_cost(new.total_cost, new.price_per_liter, new.fuel_volume),
                new.station_name,
                new.is_full_tank,
                new.exclude_from_average,
                new.notes,
                entry_id,
            ],
        )?;

        Ok((self.get_fuel_entry(user_id, entry_id)?, warning))
    }

    /// Fetch one fuel entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is not the user's.
    pub fn get_fuel_entry(&self, user_id: i64, entry_id: i64) -> Result<FuelEntry> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {FUEL_COLUMNS} FROM fuel_entries f \
                     JOIN motorcycles m ON m.id = f.motorcycle_id \
                     WHERE f.id = ?1 AND m.user_id = ?2"
                ),
                [entry_id, user_id],
                Self::row_to_fuel_entry,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("fuel entry", entry_id))
    }

    /// Fuel entries, newest first, optionally for a single vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_fuel_entries(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
    ) -> Result<Vec<FuelEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FUEL_COLUMNS} FROM fuel_entries f \
             JOIN motorcycles m ON m.id = f.motorcycle_id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR f.motorcycle_id = ?2) \
             ORDER BY f.entry_date DESC, f.total_distance DESC, f.id DESC"
        ))?;

        let entries = stmt
            .query_map(params![user_id, motorcycle_id], Self::row_to_fuel_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Delete a fuel entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is not the user's.
    pub fn delete_fuel_entry(&self, user_id: i64, entry_id: i64) -> Result<()> {
        self.get_fuel_entry(user_id, entry_id)?;
        self.conn
            .execute("DELETE FROM fuel_entries WHERE id = ?1", [entry_id])?;
        info!(entry_id, "deleted fuel entry");
        Ok(())
    }

    /// Fuel history with per-entry and vehicle-wide km/L.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle is not the user's or the database
    /// operation fails.
    pub fn fuel_report(&self, user_id: i64, motorcycle_id: i64) -> Result<FuelReport> {
        let motorcycle = self.get_motorcycle(user_id, motorcycle_id)?;
        let entries = self.list_fuel_entries(user_id, Some(motorcycle_id))?;

        let kpl = fuel::kpl_bulk(&entries);
        let average_kpl = fuel::average_kpl(&entries, motorcycle.is_racer);
        let records: Vec<DistanceRecord> = entries.iter().map(fuel_record).collect();
        let total_cost = entries.iter().filter_map(|e| e.total_cost).sum();

        let lines = entries
            .into_iter()
            .map(|entry| FuelLine {
                kpl: kpl.get(&entry.id).copied().flatten(),
                entry,
            })
            .collect();

        Ok(FuelReport {
            motorcycle_id,
            lines,
            average_kpl,
            distance_km: distance::distance_travelled(&records),
            total_cost,
        })
    }

    /// Log a maintenance event.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the vehicle is a racer or not
    /// the user's, or the database operation fails.
    pub fn add_maintenance_entry(
        &self,
        user_id: i64,
        new: &NewMaintenanceEntry,
    ) -> Result<(MaintenanceEntry, Option<DistanceWarning>)> {
        validate_maintenance(new)?;
        self.require_street_vehicle(user_id, new.motorcycle_id)?;

        let total_distance = self.total_distance_on(
            new.motorcycle_id,
            new.odometer_reading,
            new.maintenance_date,
        )?;
        let warning = self.check_new_record(
            new.motorcycle_id,
            RecordKind::Maintenance,
            None,
            new.maintenance_date,
            new.odometer_reading,
            total_distance,
        )?;

        self.conn.execute(
            r"
            INSERT INTO maintenance_entries (
                motorcycle_id, maintenance_date, odometer_reading, total_distance,
                description, category, parts_cost, labor_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                new.motorcycle_id,
                new.maintenance_date,
                new.odometer_reading,
                total_distance,
                new.description.trim(),
                new.category,
                new.parts_cost,
                new.labor_cost,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted maintenance entry with id {}", id);
        Ok((self.get_maintenance_entry(user_id, id)?, warning))
    }

    /// Replace a maintenance entry's fields and recompute its lifetime distance.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the entry or vehicle is not the
    /// user's, or the database operation fails.
    pub fn update_maintenance_entry(
        &self,
        user_id: i64,
        entry_id: i64,
        new: &NewMaintenanceEntry,
    ) -> Result<(MaintenanceEntry, Option<DistanceWarning>)> {
        validate_maintenance(new)?;
        self.get_maintenance_entry(user_id, entry_id)?;
        self.require_street_vehicle(user_id, new.motorcycle_id)?;

        let total_distance = self.total_distance_on(
            new.motorcycle_id,
            new.odometer_reading,
            new.maintenance_date,
        )?;
        let warning = self.check_new_record(
            new.motorcycle_id,
            RecordKind::Maintenance,
            Some(entry_id),
            new.maintenance_date,
            new.odometer_reading,
            total_distance,
        )?;

        self.conn.execute(
            r"
            UPDATE maintenance_entries SET
                motorcycle_id = ?1, maintenance_date = ?2, odometer_reading = ?3,
                total_distance = ?4, description = ?5, category = ?6,
                parts_cost = ?7, labor_cost = ?8
            WHERE id = ?9
            ",
            params![
                new.motorcycle_id,
                new.maintenance_date,
                new.odometer_reading,
                total_distance,
                new.description.trim(),
                new.category,
                new.parts_cost,
                new.labor_cost,
                entry_id,
            ],
        )?;

        Ok((self.get_maintenance_entry(user_id, entry_id)?, warning))
    }

    /// Fetch one maintenance entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is not the user's.
    pub fn get_maintenance_entry(&self, user_id: i64, entry_id: i64) -> Result<MaintenanceEntry> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_entries e \
                     JOIN motorcycles m ON m.id = e.motorcycle_id \
                     WHERE e.id = ?1 AND m.user_id = ?2"
                ),
                [entry_id, user_id],
                Self::row_to_maintenance_entry,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("maintenance entry", entry_id))
    }

    /// Maintenance entries, newest first, optionally for a single vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_maintenance_entries(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
    ) -> Result<Vec<MaintenanceEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_entries e \
             JOIN motorcycles m ON m.id = e.motorcycle_id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR e.motorcycle_id = ?2) \
             ORDER BY e.maintenance_date DESC, e.total_distance DESC, e.id DESC"
        ))?;

        let entries = stmt
            .query_map(params![user_id, motorcycle_id], Self::row_to_maintenance_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Delete a maintenance entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry is not the user's.
    pub fn delete_maintenance_entry(&self, user_id: i64, entry_id: i64) -> Result<()> {
        self.get_maintenance_entry(user_id, entry_id)?;
        self.conn
            .execute("DELETE FROM maintenance_entries WHERE id = ?1", [entry_id])?;
        info!(entry_id, "deleted maintenance entry");
        Ok(())
    }

    /// Records of a vehicle whose lifetime distance drops below an earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle is not the user's or the database
    /// operation fails.
    pub fn distance_warnings(
        &self,
        user_id: i64,
        motorcycle_id: i64,
    ) -> Result<Vec<DistanceWarning>> {
        self.get_motorcycle(user_id, motorcycle_id)?;
        let records = self.distance_records(motorcycle_id)?;
        Ok(distance::check_monotonic(&records))
    }

    /// Distance columns of every fuel and maintenance record of a vehicle.
    pub(super) fn distance_records(&self, motorcycle_id: i64) -> Result<Vec<DistanceRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT 'fuel', id, entry_date, odometer_reading, total_distance
            FROM fuel_entries WHERE motorcycle_id = ?1
            UNION ALL
            SELECT 'maintenance', id, maintenance_date, odometer_reading, total_distance
            FROM maintenance_entries WHERE motorcycle_id = ?1
            ",
        )?;

        let records = stmt
            .query_map([motorcycle_id], |row| {
                let kind: String = row.get(0)?;
                Ok(DistanceRecord {
                    kind: if kind == "fuel" {
                        RecordKind::Fuel
                    } else {
                        RecordKind::Maintenance
                    },
                    id: row.get(1)?,
                    date: row.get(2)?,
                    odometer_reading: row.get(3)?,
                    total_distance: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn total_distance_on(
        &self,
        motorcycle_id: i64,
        odometer_reading: i64,
        on_date: chrono::NaiveDate,
    ) -> Result<i64> {
        let resets = self.load_resets(motorcycle_id)?;
        Ok(odometer_reading + OffsetTimeline::new(&resets).offset_on(on_date))
    }

    /// Compare a new or edited record with the latest earlier one of the same kind.
    fn check_new_record(
        &self,
        motorcycle_id: i64,
        kind: RecordKind,
        id: Option<i64>,
        date: chrono::NaiveDate,
        odometer_reading: i64,
        total_distance: i64,
    ) -> Result<Option<DistanceWarning>> {
        let existing: Vec<DistanceRecord> = self
            .distance_records(motorcycle_id)?
            .into_iter()
            .filter(|record| record.kind == kind && Some(record.id) != id)
            .collect();

        let candidate = DistanceRecord {
            kind,
            id: id.unwrap_or(0),
            date,
            odometer_reading,
            total_distance,
        };
        Ok(distance::check_against_previous(&existing, &candidate))
    }

    fn require_street_vehicle(&self, user_id: i64, motorcycle_id: i64) -> Result<()> {
        if self.get_motorcycle(user_id, motorcycle_id)?.is_racer {
            return Err(Error::validation(
                "motorcycle_id",
                "maintenance is not logged for racers",
            ));
        }
        Ok(())
    }

    fn row_to_fuel_entry(row: &rusqlite::Row) -> rusqlite::Result<FuelEntry> {
        Ok(FuelEntry {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            entry_date: row.get(2)?,
            odometer_reading: row.get(3)?,
            total_distance: row.get(4)?,
            fuel_volume: row.get(5)?,
            price_per_liter: row.get(6)?,
            total_cost: row.get(7)?,
            station_name: row.get(8)?,
            is_full_tank: row.get(9)?,
            exclude_from_average: row.get(10)?,
            notes: row.get(11)?,
        })
    }

    fn row_to_maintenance_entry(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceEntry> {
        Ok(MaintenanceEntry {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            maintenance_date: row.get(2)?,
            odometer_reading: row.get(3)?,
            total_distance: row.get(4)?,
            description: row.get(5)?,
            category: row.get(6)?,
            parts_cost: row.get(7)?,
            labor_cost: row.get(8)?,
        })
    }
}

fn fuel_record(entry: &FuelEntry) -> DistanceRecord {
    DistanceRecord {
        kind: RecordKind::Fuel,
        id: entry.id,
        date: entry.entry_date,
        odometer_reading: entry.odometer_reading,
        total_distance: entry.total_distance,
    }
}
