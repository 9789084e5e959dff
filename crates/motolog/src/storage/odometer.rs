use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::Storage;
use crate::distance::{self, OffsetTimeline, RecordKind};
use crate::error::{Error, Result};
use crate::model::OdoResetLog;

const RESET_COLUMNS: &str = "r.id, r.motorcycle_id, r.reset_date, r.display_odo_before_reset, \
     r.display_odo_after_reset, r.offset_increment";

impl Storage {
    /// Record an odometer reset and replay the vehicle's distances.
    ///
    /// # Errors
    ///
    /// Returns an error if the readings or date are invalid, the vehicle is
    /// not the user's, or the database operation fails. Nothing is written
    /// on failure.
    pub fn add_odo_reset(
        &self,
        user_id: i64,
        motorcycle_id: i64,
        reset_date: NaiveDate,
        before: i64,
        after: i64,
        today: NaiveDate,
    ) -> Result<OdoResetLog> {
        let increment = distance::validate_reset(reset_date, before, after, today)?;
        self.get_motorcycle(user_id, motorcycle_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            INSERT INTO odo_reset_logs (
                motorcycle_id, reset_date, display_odo_before_reset,
                display_odo_after_reset, offset_increment
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![motorcycle_id, reset_date, before, after, increment],
        )?;
        let id = tx.last_insert_rowid();
        self.replay_distances(motorcycle_id)?;
        tx.commit()?;

        info!(motorcycle_id, increment, "recorded odometer reset");
        self.get_odo_reset(user_id, id)
    }

    /// Edit a reset and replay the vehicle's distances.
    ///
    /// # Errors
    ///
    /// Returns an error if the readings or date are invalid, the reset is
    /// not the user's, or the database operation fails.
    pub fn update_odo_reset(
        &self,
        user_id: i64,
        reset_id: i64,
        reset_date: NaiveDate,
        before: i64,
        after: i64,
        today: NaiveDate,
    ) -> Result<OdoResetLog> {
        let increment = distance::validate_reset(reset_date, before, after, today)?;
        let existing = self.get_odo_reset(user_id, reset_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            UPDATE odo_reset_logs SET
                reset_date = ?1, display_odo_before_reset = ?2,
                display_odo_after_reset = ?3, offset_increment = ?4
            WHERE id = ?5
            ",
            params![reset_date, before, after, increment, reset_id],
        )?;
        self.replay_distances(existing.motorcycle_id)?;
        tx.commit()?;

        self.get_odo_reset(user_id, reset_id)
    }

    /// Delete a reset and replay the vehicle's distances.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the reset is not the user's.
    pub fn delete_odo_reset(&self, user_id: i64, reset_id: i64) -> Result<()> {
        let existing = self.get_odo_reset(user_id, reset_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM odo_reset_logs WHERE id = ?1", [reset_id])?;
        self.replay_distances(existing.motorcycle_id)?;
        tx.commit()?;

        info!(reset_id, "deleted odometer reset");
        Ok(())
    }

    /// Fetch one reset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the reset is not the user's.
    pub fn get_odo_reset(&self, user_id: i64, reset_id: i64) -> Result<OdoResetLog> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {RESET_COLUMNS} FROM odo_reset_logs r \
                     JOIN motorcycles m ON m.id = r.motorcycle_id \
                     WHERE r.id = ?1 AND m.user_id = ?2"
                ),
                [reset_id, user_id],
                Self::row_to_odo_reset,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("odometer reset", reset_id))
    }

    /// A vehicle's resets in chronological order.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle is not the user's or the database
    /// operation fails.
    pub fn list_odo_resets(&self, user_id: i64, motorcycle_id: i64) -> Result<Vec<OdoResetLog>> {
        self.get_motorcycle(user_id, motorcycle_id)?;
        self.load_resets(motorcycle_id)
    }

    /// Rewrite every derived distance of a vehicle from its reset history.
    ///
    /// Returns the number of records whose total changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle is not the user's or the database
    /// operation fails.
    pub fn recalculate_distances(&self, user_id: i64, motorcycle_id: i64) -> Result<usize> {
        self.get_motorcycle(user_id, motorcycle_id)?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = self.replay_distances(motorcycle_id)?;
        tx.commit()?;
        Ok(changed)
    }

    /// Latest lifetime distance of a vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the vehicle is not the user's or the database
    /// operation fails.
    pub fn vehicle_mileage(&self, user_id: i64, motorcycle_id: i64) -> Result<i64> {
        let motorcycle = self.get_motorcycle(user_id, motorcycle_id)?;
        let records = self.distance_records(motorcycle_id)?;
        Ok(distance::latest_total_distance(
            &records,
            motorcycle.odometer_offset,
        ))
    }

    pub(super) fn load_resets(&self, motorcycle_id: i64) -> Result<Vec<OdoResetLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESET_COLUMNS} FROM odo_reset_logs r WHERE r.motorcycle_id = ?1 \
             ORDER BY r.reset_date ASC, r.id ASC"
        ))?;

        let resets = stmt
            .query_map([motorcycle_id], Self::row_to_odo_reset)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(resets)
    }

    /// Replay all resets and write back totals and the offset cache.
    ///
    /// Must run inside the caller's transaction.
    fn replay_distances(&self, motorcycle_id: i64) -> Result<usize> {
        let resets = self.load_resets(motorcycle_id)?;
        let records = self.distance_records(motorcycle_id)?;

        let mut changed = 0;
        for (old, new) in records.iter().zip(distance::replay(&resets, &records)) {
            if old.total_distance == new.total_distance {
                continue;
            }
            let sql = match new.kind {
                RecordKind::Fuel => "UPDATE fuel_entries SET total_distance = ?1 WHERE id = ?2",
                RecordKind::Maintenance => {
                    "UPDATE maintenance_entries SET total_distance = ?1 WHERE id = ?2"
                }
            };
            self.conn.execute(sql, [new.total_distance, new.id])?;
            changed += 1;
        }

        let offset = OffsetTimeline::new(&resets).final_offset();
        self.conn.execute(
            "UPDATE motorcycles SET odometer_offset = ?1 WHERE id = ?2",
            [offset, motorcycle_id],
        )?;

        debug!(motorcycle_id, changed, offset, "replayed odometer resets");
        Ok(changed)
    }

    fn row_to_odo_reset(row: &rusqlite::Row) -> rusqlite::Result<OdoResetLog> {
        Ok(OdoResetLog {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            reset_date: row.get(2)?,
            display_odo_before_reset: row.get(3)?,
            display_odo_after_reset: row.get(4)?,
            offset_increment: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::model::User;
    use crate::storage::test_support::*;
    use crate::storage::Storage;

    const TODAY: (i32, u32, u32) = (2024, 12, 31);

    fn today() -> NaiveDate {
        date(TODAY.0, TODAY.1, TODAY.2)
    }

    /// A vehicle with fuel and maintenance spread across several years.
    fn seeded() -> (Storage, User, i64) {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        for (on, reading) in [
            (date(2021, 1, 1), 8_000),
            (date(2021, 5, 1), 300),
            (date(2022, 9, 1), 100),
            (date(2023, 3, 1), 50),
        ] {
            storage
                .add_fuel_entry(user.id, &fuel(cb.id, on, reading, 10.0))
                .unwrap();
        }
        storage
            .add_maintenance_entry(user.id, &service(cb.id, date(2022, 10, 1), 900))
            .unwrap();
        (storage, user, cb.id)
    }

    fn totals(storage: &Storage, user: &User, motorcycle_id: i64) -> Vec<(NaiveDate, i64)> {
        let mut totals: Vec<(NaiveDate, i64)> = storage
            .list_fuel_entries(user.id, Some(motorcycle_id))
            .unwrap()
            .into_iter()
            .map(|e| (e.entry_date, e.total_distance))
            .chain(
                storage
                    .list_maintenance_entries(user.id, Some(motorcycle_id))
                    .unwrap()
                    .into_iter()
                    .map(|e| (e.maintenance_date, e.total_distance)),
            )
            .collect();
        totals.sort_unstable();
        totals
    }

    const RESETS: [((i32, u32, u32), i64, i64); 3] = [
        ((2021, 4, 1), 10_000, 0),
        ((2022, 8, 1), 20_000, 5),
        ((2023, 2, 1), 7_000, 0),
    ];

    #[test]
    fn test_reset_updates_later_records() {
        let (storage, user, cb) = seeded();
        let reset = storage
            .add_odo_reset(user.id, cb, date(2021, 4, 1), 10_000, 0, today())
            .unwrap();
        assert_eq!(reset.offset_increment, 10_000);

        let totals = totals(&storage, &user, cb);
        assert_eq!(totals[0], (date(2021, 1, 1), 8_000));
        assert_eq!(totals[1], (date(2021, 5, 1), 10_300));

        let motorcycle = storage.get_motorcycle(user.id, cb).unwrap();
        assert_eq!(motorcycle.odometer_offset, 10_000);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let mut results = Vec::new();

        for order in orders {
            let (storage, user, cb) = seeded();
            for i in order {
                let ((y, m, d), before, after) = RESETS[i];
                storage
                    .add_odo_reset(user.id, cb, date(y, m, d), before, after, today())
                    .unwrap();
            }
            let offset = storage.get_motorcycle(user.id, cb).unwrap().odometer_offset;
            results.push((totals(&storage, &user, cb), offset));
        }

        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        let (totals, offset) = &results[0];
        assert_eq!(*offset, 36_995);
        assert_eq!(
            totals.iter().map(|(_, t)| *t).collect::<Vec<_>>(),
            vec![8_000, 10_300, 30_095, 30_895, 37_045]
        );
    }

    #[test]
    fn test_delete_matches_fresh_replay() {
        let (storage, user, cb) = seeded();
        let mut ids = Vec::new();
        for ((y, m, d), before, after) in RESETS {
            let reset = storage
                .add_odo_reset(user.id, cb, date(y, m, d), before, after, today())
                .unwrap();
            ids.push(reset.id);
        }
        storage.delete_odo_reset(user.id, ids[1]).unwrap();

        let (fresh, fresh_user, fresh_cb) = seeded();
        for i in [0, 2] {
            let ((y, m, d), before, after) = RESETS[i];
            fresh
                .add_odo_reset(fresh_user.id, fresh_cb, date(y, m, d), before, after, today())
                .unwrap();
        }

        assert_eq!(
            totals(&storage, &user, cb),
            totals(&fresh, &fresh_user, fresh_cb)
        );
        assert_eq!(
            storage.get_motorcycle(user.id, cb).unwrap().odometer_offset,
            17_000
        );
    }

    #[test]
    fn test_update_reset_moves_offset() {
        let (storage, user, cb) = seeded();
        let reset = storage
            .add_odo_reset(user.id, cb, date(2021, 4, 1), 10_000, 0, today())
            .unwrap();

        // Moving the reset past every record leaves only the cached offset
        storage
            .update_odo_reset(user.id, reset.id, date(2024, 1, 1), 10_000, 0, today())
            .unwrap();
        let totals = totals(&storage, &user, cb);
        assert!(totals.iter().all(|(_, t)| *t < 10_000));
        assert_eq!(storage.vehicle_mileage(user.id, cb).unwrap(), 10_000);
    }

    #[test]
    fn test_invalid_reset_writes_nothing() {
        let (storage, user, cb) = seeded();
        let before = totals(&storage, &user, cb);

        assert!(storage
            .add_odo_reset(user.id, cb, date(2025, 1, 1), 100, 0, today())
            .is_err());
        assert!(storage
            .add_odo_reset(user.id, cb, date(2024, 1, 1), 100, 200, today())
            .is_err());

        assert_eq!(totals(&storage, &user, cb), before);
        assert!(storage.list_odo_resets(user.id, cb).unwrap().is_empty());
    }

    #[test]
    fn test_new_entries_pick_up_offset() {
        let (storage, user, cb) = seeded();
        storage
            .add_odo_reset(user.id, cb, date(2024, 1, 1), 9_999, 0, today())
            .unwrap();
        let (entry, _) = storage
            .add_fuel_entry(user.id, &fuel(cb, date(2024, 2, 1), 120, 8.0))
            .unwrap();
        assert_eq!(entry.total_distance, 10_119);
        assert_eq!(storage.vehicle_mileage(user.id, cb).unwrap(), 10_119);
    }

    #[test]
    fn test_recalculate_distances_repairs_tampered_totals() {
        let (storage, user, cb) = seeded();
        storage
            .add_odo_reset(user.id, cb, date(2021, 4, 1), 10_000, 0, today())
            .unwrap();
        let expected = totals(&storage, &user, cb);

        storage
            .conn
            .execute("UPDATE fuel_entries SET total_distance = 0", [])
            .unwrap();
        let changed = storage.recalculate_distances(user.id, cb).unwrap();
        assert_eq!(changed, 4);
        assert_eq!(totals(&storage, &user, cb), expected);
    }
}
