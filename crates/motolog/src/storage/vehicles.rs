use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::Storage;
use crate::error::{Error, Result};
use crate::model::{Motorcycle, NewMotorcycle, User};

const MOTORCYCLE_COLUMNS: &str = "id, user_id, maker, name, year, is_racer, is_default, \
     odometer_offset, total_operating_hours";

impl Storage {
    /// Look up a user by name, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the database operation fails.
    pub fn ensure_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::validation("username", "cannot be empty"));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO users (username) VALUES (?1)",
            [username],
        )?;
        if inserted > 0 {
            info!(username, "created user");
        }

        let user = self.conn.query_row(
            "SELECT id, username FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )?;
        Ok(user)
    }

    /// Register a vehicle. The user's first vehicle becomes the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the database operation fails.
    pub fn add_motorcycle(&self, user_id: i64, new: &NewMotorcycle) -> Result<Motorcycle> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "vehicle name is required"));
        }

        let existing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM motorcycles WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        self.conn.execute(
            r"
            INSERT INTO motorcycles (user_id, maker, name, year, is_racer, is_default)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![user_id, new.maker, name, new.year, new.is_racer, existing == 0],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted motorcycle with id {}", id);
        self.get_motorcycle(user_id, id)
    }

    /// Fetch one of the user's vehicles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle does not exist or belongs
    /// to someone else.
    pub fn get_motorcycle(&self, user_id: i64, motorcycle_id: i64) -> Result<Motorcycle> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {MOTORCYCLE_COLUMNS} FROM motorcycles WHERE id = ?1 AND user_id = ?2"
                ),
                [motorcycle_id, user_id],
                Self::row_to_motorcycle,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("motorcycle", motorcycle_id))
    }

    /// The user's vehicles, default first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_motorcycles(&self, user_id: i64) -> Result<Vec<Motorcycle>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MOTORCYCLE_COLUMNS} FROM motorcycles WHERE user_id = ?1 \
             ORDER BY is_default DESC, id ASC"
        ))?;

        let motorcycles = stmt
            .query_map([user_id], Self::row_to_motorcycle)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(motorcycles)
    }

    /// The user's default vehicle, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn default_motorcycle(&self, user_id: i64) -> Result<Option<Motorcycle>> {
        Ok(self.list_motorcycles(user_id)?.into_iter().find(|m| m.is_default))
    }

    /// Make a vehicle the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle is not the user's.
    pub fn set_default_motorcycle(&self, user_id: i64, motorcycle_id: i64) -> Result<()> {
        self.get_motorcycle(user_id, motorcycle_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE motorcycles SET is_default = (id = ?1) WHERE user_id = ?2",
            [motorcycle_id, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Record engine hours for a racer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for negative hours or a non-racer and
    /// [`Error::NotFound`] if the vehicle is not the user's.
    pub fn set_operating_hours(&self, user_id: i64, motorcycle_id: i64, hours: f64) -> Result<()> {
        let motorcycle = self.get_motorcycle(user_id, motorcycle_id)?;
        if !motorcycle.is_racer {
            return Err(Error::validation(
                "total_operating_hours",
                "only racers track operating hours",
            ));
        }
        if hours.is_nan() || hours < 0.0 {
            return Err(Error::validation("total_operating_hours", "cannot be negative"));
        }
        self.conn.execute(
            "UPDATE motorcycles SET total_operating_hours = ?1 WHERE id = ?2",
            params![hours, motorcycle_id],
        )?;
        Ok(())
    }

    /// Delete a vehicle and everything logged against it.
    ///
    /// If it was the default, the oldest remaining vehicle takes over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle is not the user's.
    pub fn delete_motorcycle(&self, user_id: i64, motorcycle_id: i64) -> Result<()> {
        let motorcycle = self.get_motorcycle(user_id, motorcycle_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM motorcycles WHERE id = ?1", [motorcycle_id])?;
        if motorcycle.is_default {
            tx.execute(
                r"
                UPDATE motorcycles SET is_default = 1
                WHERE id = (SELECT MIN(id) FROM motorcycles WHERE user_id = ?1)
                ",
                [user_id],
            )?;
        }
        tx.commit()?;

        info!(motorcycle_id, "deleted motorcycle");
        Ok(())
    }

    pub(super) fn row_to_motorcycle(row: &rusqlite::Row) -> rusqlite::Result<Motorcycle> {
        Ok(Motorcycle {
            id: row.get(0)?,
            user_id: row.get(1)?,
            maker: row.get(2)?,
            name: row.get(3)?,
            year: row.get(4)?,
            is_racer: row.get(5)?,
            is_default: row.get(6)?,
            odometer_offset: row.get(7)?,
            total_operating_hours: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::model::NewMotorcycle;
    use crate::storage::test_support::*;

    #[test]
    fn test_ensure_user_is_stable() {
        let storage = storage();
        let first = storage.ensure_user("rider").unwrap();
        let second = storage.ensure_user(" rider ").unwrap();
        assert_eq!(first, second);
        assert!(storage.ensure_user("  ").is_err());
    }

    #[test]
    fn test_first_vehicle_is_default() {
        let storage = storage();
        let user = rider(&storage);
        let first = bike(&storage, &user, "CB400SF");
        let second = bike(&storage, &user, "MT-07");
        assert!(first.is_default);
        assert!(!second.is_default);
        assert_eq!(first.odometer_offset, 0);

        storage.set_default_motorcycle(user.id, second.id).unwrap();
        let default = storage.default_motorcycle(user.id).unwrap().unwrap();
        assert_eq!(default.id, second.id);
        assert_eq!(storage.list_motorcycles(user.id).unwrap()[0].id, second.id);
    }

    #[test]
    fn test_vehicle_name_required() {
        let storage = storage();
        let user = rider(&storage);
        let err = storage
            .add_motorcycle(user.id, &NewMotorcycle::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name", .. }));
    }

    #[test]
    fn test_other_users_vehicle_is_not_found() {
        let storage = storage();
        let user = rider(&storage);
        let other = storage.ensure_user("someone").unwrap();
        let theirs = bike(&storage, &other, "MT-07");

        let err = storage.get_motorcycle(user.id, theirs.id).unwrap_err();
        assert!(err.is_not_found());
        assert!(storage.delete_motorcycle(user.id, theirs.id).is_err());
    }

    #[test]
    fn test_delete_default_promotes_next() {
        let storage = storage();
        let user = rider(&storage);
        let first = bike(&storage, &user, "CB400SF");
        let second = bike(&storage, &user, "MT-07");
        storage
            .add_fuel_entry(user.id, &fuel(first.id, date(2024, 1, 1), 1000, 10.0))
            .unwrap();

        storage.delete_motorcycle(user.id, first.id).unwrap();
        let remaining = storage.list_motorcycles(user.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
        assert!(remaining[0].is_default);
        assert_eq!(storage.stats(user.id).unwrap().fuel_entries, 0);
    }

    #[test]
    fn test_operating_hours_only_for_racers() {
        let storage = storage();
        let user = rider(&storage);
        let street = bike(&storage, &user, "CB400SF");
        assert!(storage.set_operating_hours(user.id, street.id, 10.0).is_err());

        let racer = storage
            .add_motorcycle(
                user.id,
                &NewMotorcycle {
                    name: "NSF250R".to_string(),
                    is_racer: true,
                    ..NewMotorcycle::default()
                },
            )
            .unwrap();
        storage.set_operating_hours(user.id, racer.id, 12.5).unwrap();
        let racer = storage.get_motorcycle(user.id, racer.id).unwrap();
        assert_eq!(racer.total_operating_hours, Some(12.5));
        assert!(storage.set_operating_hours(user.id, racer.id, -1.0).is_err());
    }
}
