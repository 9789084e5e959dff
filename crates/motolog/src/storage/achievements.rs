use std::collections::HashSet;

use chrono::Utc;
use rusqlite::params;
use tracing::debug;

use super::Storage;
use crate::achievements::{AchievementContext, CountTarget};
use crate::error::Result;
use crate::model::UserAchievement;

impl Storage {
    /// Unlocked achievements, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_achievements(&self, user_id: i64) -> Result<Vec<UserAchievement>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, user_id, achievement_code, unlocked_at
            FROM user_achievements WHERE user_id = ?1
            ORDER BY unlocked_at ASC, id ASC
            ",
        )?;

        let achievements = stmt
            .query_map([user_id], |row| {
                Ok(UserAchievement {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    achievement_code: row.get(2)?,
                    unlocked_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(achievements)
    }
}

impl AchievementContext for Storage {
    fn count(&self, user_id: i64, target: CountTarget) -> Result<u64> {
        let sql = match target {
            CountTarget::Vehicle => "SELECT COUNT(*) FROM motorcycles WHERE user_id = ?1",
            CountTarget::FuelEntry => {
                "SELECT COUNT(*) FROM fuel_entries f \
                 JOIN motorcycles m ON m.id = f.motorcycle_id WHERE m.user_id = ?1"
            }
            CountTarget::MaintenanceEntry => {
                "SELECT COUNT(*) FROM maintenance_entries e \
                 JOIN motorcycles m ON m.id = e.motorcycle_id WHERE m.user_id = ?1"
            }
            CountTarget::Note => "SELECT COUNT(*) FROM general_notes WHERE user_id = ?1",
            CountTarget::OdoReset => {
                "SELECT COUNT(*) FROM odo_reset_logs r \
                 JOIN motorcycles m ON m.id = r.motorcycle_id WHERE m.user_id = ?1"
            }
        };
        let count: i64 = self.conn.query_row(sql, [user_id], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn vehicle_mileage(&self, user_id: i64, motorcycle_id: i64) -> Result<Option<i64>> {
        match Storage::vehicle_mileage(self, user_id, motorcycle_id) {
            Ok(mileage) => Ok(Some(mileage)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn vehicle_mileages(&self, user_id: i64) -> Result<Vec<i64>> {
        self.list_motorcycles(user_id)?
            .iter()
            .map(|motorcycle| Storage::vehicle_mileage(self, user_id, motorcycle.id))
            .collect()
    }

    fn unlocked_codes(&self, user_id: i64) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT achievement_code FROM user_achievements WHERE user_id = ?1")?;

        let codes = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;

        Ok(codes)
    }

    fn unlock(&self, user_id: i64, code: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            r"
            INSERT OR IGNORE INTO user_achievements (user_id, achievement_code, unlocked_at)
            VALUES (?1, ?2, ?3)
            ",
            params![user_id, code, Utc::now()],
        )?;
        if inserted > 0 {
            debug!(user_id, code, "inserted achievement");
        }
        Ok(inserted > 0)
    }
}
