use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::Storage;
use crate::config::ReminderConfig;
use crate::error::{Error, Result};
use crate::model::{MaintenanceReminder, NewReminder};
use crate::reminders::{self, ReminderCheck, VehicleState};

const REMINDER_COLUMNS: &str = "r.id, r.motorcycle_id, r.task_description, r.interval_km, \
     r.interval_months, r.last_done_date, r.last_done_km";

impl Storage {
    /// Create a reminder.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, the vehicle is not the
    /// user's, or the database operation fails.
    pub fn add_reminder(&self, user_id: i64, new: &NewReminder) -> Result<MaintenanceReminder> {
        reminders::validate_reminder(
            &new.task_description,
            new.interval_km,
            new.interval_months,
            new.last_done_km,
        )?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        self.conn.execute(
            r"
            INSERT INTO maintenance_reminders (
                motorcycle_id, task_description, interval_km, interval_months,
                last_done_date, last_done_km
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                new.motorcycle_id,
                new.task_description.trim(),
                new.interval_km,
                new.interval_months,
                new.last_done_date,
                new.last_done_km,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted reminder with id {}", id);
        self.get_reminder(user_id, id)
    }

    /// Fetch one reminder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the reminder is not the user's.
    pub fn get_reminder(&self, user_id: i64, reminder_id: i64) -> Result<MaintenanceReminder> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {REMINDER_COLUMNS} FROM maintenance_reminders r \
                     JOIN motorcycles m ON m.id = r.motorcycle_id \
                     WHERE r.id = ?1 AND m.user_id = ?2"
                ),
                [reminder_id, user_id],
                Self::row_to_reminder,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("reminder", reminder_id))
    }

    /// Reminders, optionally for one vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_reminders(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
    ) -> Result<Vec<MaintenanceReminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM maintenance_reminders r \
             JOIN motorcycles m ON m.id = r.motorcycle_id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR r.motorcycle_id = ?2) \
             ORDER BY r.motorcycle_id ASC, r.id ASC"
        ))?;

        let reminders = stmt
            .query_map(params![user_id, motorcycle_id], Self::row_to_reminder)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(reminders)
    }

    /// Mark a reminder as done on `on_date` at the vehicle's current distance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the reminder is not the user's.
    pub fn complete_reminder(
        &self,
        user_id: i64,
        reminder_id: i64,
        on_date: NaiveDate,
    ) -> Result<MaintenanceReminder> {
        let reminder = self.get_reminder(user_id, reminder_id)?;
        let mileage = self.vehicle_mileage(user_id, reminder.motorcycle_id)?;

        self.conn.execute(
            "UPDATE maintenance_reminders SET last_done_date = ?1, last_done_km = ?2 WHERE id = ?3",
            params![on_date, mileage, reminder_id],
        )?;

        info!(reminder_id, mileage, "completed reminder");
        self.get_reminder(user_id, reminder_id)
    }

    /// Delete a reminder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the reminder is not the user's.
    pub fn delete_reminder(&self, user_id: i64, reminder_id: i64) -> Result<()> {
        self.get_reminder(user_id, reminder_id)?;
        self.conn
            .execute("DELETE FROM maintenance_reminders WHERE id = ?1", [reminder_id])?;
        Ok(())
    }

    /// Every reminder of the user that needs attention, danger first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn due_reminders(
        &self,
        user_id: i64,
        today: NaiveDate,
        thresholds: &ReminderConfig,
    ) -> Result<Vec<ReminderCheck>> {
        let mut checked = Vec::new();
        for motorcycle in self.list_motorcycles(user_id)? {
            let vehicle_reminders = self.list_reminders(user_id, Some(motorcycle.id))?;
            if vehicle_reminders.is_empty() {
                continue;
            }
            let state = VehicleState {
                current_km: self.vehicle_mileage(user_id, motorcycle.id)?,
                name: motorcycle.name,
                is_racer: motorcycle.is_racer,
            };
            checked.extend(
                vehicle_reminders
                    .into_iter()
                    .map(|reminder| (reminder, state.clone())),
            );
        }

        Ok(reminders::due_reminders(&checked, today, thresholds))
    }

    fn row_to_reminder(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceReminder> {
        Ok(MaintenanceReminder {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            task_description: row.get(2)?,
            interval_km: row.get(3)?,
            interval_months: row.get(4)?,
            last_done_date: row.get(5)?,
            last_done_km: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ReminderConfig;
    use crate::model::NewReminder;
    use crate::reminders::ReminderStatus;
    use crate::storage::test_support::*;

    fn oil(motorcycle_id: i64) -> NewReminder {
        NewReminder {
            motorcycle_id,
            task_description: "oil change".to_string(),
            interval_km: Some(3_000),
            interval_months: None,
            last_done_date: None,
            last_done_km: Some(1_000),
        }
    }

    #[test]
    fn test_add_and_list_reminders() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");

        let reminder = storage.add_reminder(user.id, &oil(cb.id)).unwrap();
        assert_eq!(reminder.interval_km, Some(3_000));
        assert_eq!(storage.list_reminders(user.id, None).unwrap(), vec![reminder.clone()]);

        storage.delete_reminder(user.id, reminder.id).unwrap();
        assert!(storage.list_reminders(user.id, Some(cb.id)).unwrap().is_empty());
    }

    #[test]
    fn test_reminder_needs_an_interval() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let mut new = oil(cb.id);
        new.interval_km = None;
        assert!(storage.add_reminder(user.id, &new).is_err());
    }

    #[test]
    fn test_due_reminders_use_vehicle_mileage() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let mt = bike(&storage, &user, "MT-07");
        storage.add_reminder(user.id, &oil(cb.id)).unwrap();
        storage.add_reminder(user.id, &oil(mt.id)).unwrap();

        // CB is 200 km from due, MT is past due
        storage
            .add_fuel_entry(user.id, &fuel(cb.id, date(2024, 5, 1), 3_800, 10.0))
            .unwrap();
        storage
            .add_fuel_entry(user.id, &fuel(mt.id, date(2024, 5, 1), 4_200, 10.0))
            .unwrap();

        let due = storage
            .due_reminders(user.id, date(2024, 5, 2), &ReminderConfig::default())
            .unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].vehicle_name, "MT-07");
        assert_eq!(due[0].status, ReminderStatus::Danger);
        assert_eq!(due[1].status, ReminderStatus::Warning);
        assert_eq!(due[1].next_km_due, Some(4_000));
    }

    #[test]
    fn test_complete_reminder_clears_due_state() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let reminder = storage.add_reminder(user.id, &oil(cb.id)).unwrap();
        storage
            .add_fuel_entry(user.id, &fuel(cb.id, date(2024, 5, 1), 4_500, 10.0))
            .unwrap();

        let today = date(2024, 5, 2);
        let thresholds = ReminderConfig::default();
        assert_eq!(storage.due_reminders(user.id, today, &thresholds).unwrap().len(), 1);

        let done = storage.complete_reminder(user.id, reminder.id, today).unwrap();
        assert_eq!(done.last_done_km, Some(4_500));
        assert_eq!(done.last_done_date, Some(today));
        assert!(storage.due_reminders(user.id, today, &thresholds).unwrap().is_empty());
    }
}
