use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use super::{check_length, trimmed, Storage};
use crate::error::{Error, Result};
use crate::laps::LapTime;
use crate::model::{ActivityLocation, ActivityLog, NewActivity};

const MAX_TITLE_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 200;
const MAX_WEATHER_CHARS: usize = 50;
const MAX_NOTES_CHARS: usize = 1000;
const MIN_TEMPERATURE: f64 = -50.0;
const MAX_TEMPERATURE: f64 = 60.0;

const ACTIVITY_COLUMNS: &str = "a.id, a.motorcycle_id, a.activity_date, a.activity_title, \
     a.circuit_name, a.custom_location, a.weather, a.temperature, a.notes";

/// An outing with its session totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    /// The outing.
    #[serde(flatten)]
    pub activity: ActivityLog,
    /// Sessions recorded on the day.
    pub session_count: i64,
    /// Fastest lap across those sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_lap: Option<LapTime>,
}

/// A rider's personal best at one circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBest {
    /// Circuit name.
    pub circuit_name: String,
    /// Fastest lap ever recorded there.
    pub best_lap: LapTime,
    /// Session that holds it.
    pub session_id: i64,
    /// Name of that session.
    pub session_name: String,
    /// Day it was set.
    pub activity_date: NaiveDate,
    /// Vehicle it was set on.
    pub motorcycle_id: i64,
    /// Name of that vehicle.
    pub motorcycle_name: String,
    /// Sessions with laps at the circuit.
    pub timed_sessions: i64,
}

fn validate_activity(new: &NewActivity) -> Result<()> {
    let title = new.activity_title.trim();
    if title.is_empty() {
        return Err(Error::validation("activity_title", "is required"));
    }
    check_length("activity_title", title, MAX_TITLE_CHARS)?;

    let (field, name) = match &new.location {
        ActivityLocation::Circuit(name) => ("circuit_name", name),
        ActivityLocation::Custom(name) => ("custom_location", name),
    };
    if name.trim().is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    check_length(field, name, MAX_LOCATION_CHARS)?;

    if let Some(weather) = new.weather.as_deref() {
        check_length("weather", weather, MAX_WEATHER_CHARS)?;
    }
    if let Some(temperature) = new.temperature {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(Error::validation(
                "temperature",
                format!("must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE} degrees"),
            ));
        }
    }
    if let Some(notes) = new.notes.as_deref() {
        check_length("notes", notes, MAX_NOTES_CHARS)?;
    }
    Ok(())
}

/// Split a location into its `(circuit_name, custom_location)` columns.
fn location_columns(location: &ActivityLocation) -> (Option<&str>, Option<&str>) {
    match location {
        ActivityLocation::Circuit(name) => (Some(name.trim()), None),
        ActivityLocation::Custom(name) => (None, Some(name.trim())),
    }
}

impl Storage {
    /// Record an outing on one of the user's vehicles.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the vehicle is not the user's,
    /// or the database operation fails.
    pub fn add_activity(&self, user_id: i64, new: &NewActivity) -> Result<ActivityLog> {
        validate_activity(new)?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        let (circuit_name, custom_location) = location_columns(&new.location);
        self.conn.execute(
            r"
            INSERT INTO activity_logs (
                motorcycle_id, activity_date, activity_title, circuit_name,
                custom_location, weather, temperature, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                new.motorcycle_id,
                new.activity_date,
                new.activity_title.trim(),
                circuit_name,
                custom_location,
                trimmed(new.weather.as_deref()),
                new.temperature,
                trimmed(new.notes.as_deref()),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted activity with id {}", id);
        self.get_activity(user_id, id)
    }

    /// Replace an outing's fields.
    ///
    /// Moving the outing to another vehicle moves its sessions too. Their
    /// setting sheets belonged to the old vehicle and are unlinked.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the outing or the new vehicle is
    /// not the user's, or the database operation fails.
    pub fn update_activity(
        &self,
        user_id: i64,
        activity_id: i64,
        new: &NewActivity,
    ) -> Result<ActivityLog> {
        validate_activity(new)?;
        let existing = self.get_activity(user_id, activity_id)?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        let (circuit_name, custom_location) = location_columns(&new.location);
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            UPDATE activity_logs SET
                motorcycle_id = ?1, activity_date = ?2, activity_title = ?3,
                circuit_name = ?4, custom_location = ?5, weather = ?6,
                temperature = ?7, notes = ?8
            WHERE id = ?9
            ",
            params![
                new.motorcycle_id,
                new.activity_date,
                new.activity_title.trim(),
                circuit_name,
                custom_location,
                trimmed(new.weather.as_deref()),
                new.temperature,
                trimmed(new.notes.as_deref()),
                activity_id,
            ],
        )?;
        if existing.motorcycle_id != new.motorcycle_id {
            let moved = tx.execute(
                "UPDATE session_logs SET motorcycle_id = ?1, setting_sheet_id = NULL \
                 WHERE activity_id = ?2",
                params![new.motorcycle_id, activity_id],
            )?;
            debug!(activity_id, moved, "moved sessions to another vehicle");
        }
        tx.commit()?;

        self.get_activity(user_id, activity_id)
    }

    /// Fetch one outing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the outing is not the user's.
    pub fn get_activity(&self, user_id: i64, activity_id: i64) -> Result<ActivityLog> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activity_logs a \
                     JOIN motorcycles m ON m.id = a.motorcycle_id \
                     WHERE a.id = ?1 AND m.user_id = ?2"
                ),
                [activity_id, user_id],
                Self::row_to_activity,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("activity", activity_id))
    }

    /// Outings newest first, optionally for one vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_activities(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
    ) -> Result<Vec<ActivitySummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS}, COUNT(s.id), MIN(s.best_lap_ms) \
             FROM activity_logs a \
             JOIN motorcycles m ON m.id = a.motorcycle_id \
             LEFT JOIN session_logs s ON s.activity_id = a.id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR a.motorcycle_id = ?2) \
             GROUP BY a.id \
             ORDER BY a.activity_date DESC, a.id DESC"
        ))?;

        let activities = stmt
            .query_map(params![user_id, motorcycle_id], |row| {
                let best_ms: Option<i64> = row.get(10)?;
                Ok(ActivitySummary {
                    activity: Self::row_to_activity(row)?,
                    session_count: row.get(9)?,
                    best_lap: best_ms
                        .and_then(|ms| u64::try_from(ms).ok())
                        .map(LapTime::from_millis),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(activities)
    }

    /// Delete an outing together with its sessions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the outing is not the user's.
    pub fn delete_activity(&self, user_id: i64, activity_id: i64) -> Result<()> {
        self.get_activity(user_id, activity_id)?;
        self.conn
            .execute("DELETE FROM activity_logs WHERE id = ?1", [activity_id])?;
        debug!("Deleted activity with id {}", activity_id);
        Ok(())
    }

    /// The user's fastest session at each circuit, by circuit name.
    ///
    /// Ties go to the earlier outing. Sessions without laps and outings away
    /// from a circuit are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn circuit_bests(&self, user_id: i64) -> Result<Vec<CircuitBest>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT circuit_name, best_lap_ms, session_id, session_name, activity_date,
                   motorcycle_id, motorcycle_name, timed_sessions
            FROM (
                SELECT a.circuit_name, s.best_lap_ms, s.id AS session_id, s.session_name,
                       a.activity_date, m.id AS motorcycle_id, m.name AS motorcycle_name,
                       COUNT(*) OVER (PARTITION BY a.circuit_name) AS timed_sessions,
                       ROW_NUMBER() OVER (
                           PARTITION BY a.circuit_name
                           ORDER BY s.best_lap_ms, a.activity_date, s.id
                       ) AS position
                FROM session_logs s
                JOIN activity_logs a ON a.id = s.activity_id
                JOIN motorcycles m ON m.id = a.motorcycle_id
                WHERE m.user_id = ?1
                  AND a.circuit_name IS NOT NULL
                  AND s.best_lap_ms IS NOT NULL
            )
            WHERE position = 1
            ORDER BY circuit_name
            ",
        )?;

        let bests = stmt
            .query_map([user_id], |row| {
                let best_ms: i64 = row.get(1)?;
                let best_ms = u64::try_from(best_ms).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Integer,
                        Box::new(e),
                    )
                })?;
                Ok(CircuitBest {
                    circuit_name: row.get(0)?,
                    best_lap: LapTime::from_millis(best_ms),
                    session_id: row.get(2)?,
                    session_name: row.get(3)?,
                    activity_date: row.get(4)?,
                    motorcycle_id: row.get(5)?,
                    motorcycle_name: row.get(6)?,
                    timed_sessions: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bests)
    }

    fn row_to_activity(row: &rusqlite::Row) -> rusqlite::Result<ActivityLog> {
        let circuit_name: Option<String> = row.get(4)?;
        let custom_location: Option<String> = row.get(5)?;
        let location = match (circuit_name, custom_location) {
            (Some(circuit), _) => ActivityLocation::Circuit(circuit),
            (None, custom) => ActivityLocation::Custom(custom.unwrap_or_default()),
        };

        Ok(ActivityLog {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            activity_date: row.get(2)?,
            activity_title: row.get(3)?,
            location,
            weather: row.get(6)?,
            temperature: row.get(7)?,
            notes: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::laps::LapTime;
    use crate::model::{ActivityLocation, NewSettingSheet};
    use crate::storage::test_support::*;
    use crate::storage::Storage;

    fn laps(times: &[&str]) -> Vec<LapTime> {
        times.iter().map(|t| LapTime::parse(t).unwrap()).collect()
    }

    /// One outing with one session at `place`, returning the session id.
    fn timed_session(
        storage: &Storage,
        owner: i64,
        motorcycle_id: i64,
        on: NaiveDate,
        place: &str,
        name: &str,
        times: &[&str],
    ) -> i64 {
        let mut new = outing(motorcycle_id, on, place);
        if place == "Hakone" {
            new.location = ActivityLocation::Custom(place.to_string());
        }
        let day = storage.add_activity(owner, &new).unwrap();
        let session = storage.create_session(owner, day.id, name, None).unwrap();
        if !times.is_empty() {
            storage.set_lap_times(owner, session.id, &laps(times)).unwrap();
        }
        session.id
    }

    #[test]
    fn test_add_activity_trims_fields() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");

        let mut new = outing(cb.id, date(2024, 7, 1), " Tsukuba ");
        new.weather = Some("  ".to_string());
        new.temperature = Some(31.5);
        let activity = storage.add_activity(user.id, &new).unwrap();

        assert_eq!(activity.location, ActivityLocation::Circuit("Tsukuba".to_string()));
        assert_eq!(activity.activity_title, "Tsukuba  practice");
        assert_eq!(activity.weather, None);
        assert_eq!(activity.temperature, Some(31.5));
        assert_eq!(storage.get_activity(user.id, activity.id).unwrap(), activity);
    }

    #[test]
    fn test_activity_validation() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let base = outing(cb.id, date(2024, 7, 1), "Tsukuba");

        let mut no_title = base.clone();
        no_title.activity_title = " ".to_string();
        let mut no_place = base.clone();
        no_place.location = ActivityLocation::Custom(String::new());
        let mut long_place = base.clone();
        long_place.location = ActivityLocation::Custom("x".repeat(201));
        let mut too_hot = base.clone();
        too_hot.temperature = Some(60.5);
        let mut long_weather = base.clone();
        long_weather.weather = Some("w".repeat(51));

        for (new, field) in [
            (no_title, "activity_title"),
            (no_place, "custom_location"),
            (long_place, "custom_location"),
            (too_hot, "temperature"),
            (long_weather, "weather"),
        ] {
            let err = storage.add_activity(user.id, &new).unwrap_err();
            assert!(err.is_user_error());
            assert!(err.to_string().contains(field), "{err}");
        }

        let mut freezing = base;
        freezing.temperature = Some(-50.0);
        assert!(storage.add_activity(user.id, &freezing).is_ok());
    }

    #[test]
    fn test_list_activities_summarises_sessions() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let mt = bike(&storage, &user, "MT-07");

        let july = storage
            .add_activity(user.id, &outing(cb.id, date(2024, 7, 1), "Tsukuba"))
            .unwrap();
        let august = storage
            .add_activity(user.id, &outing(mt.id, date(2024, 8, 1), "Motegi"))
            .unwrap();
        let first = storage.create_session(user.id, july.id, "Sport 1", None).unwrap();
        storage
            .set_lap_times(user.id, first.id, &laps(&["1:05.000", "1:03.200"]))
            .unwrap();
        storage.create_session(user.id, july.id, "Sport 2", None).unwrap();

        let all = storage.list_activities(user.id, None).unwrap();
        assert_eq!(
            all.iter().map(|a| a.activity.id).collect::<Vec<_>>(),
            vec![august.id, july.id]
        );
        assert_eq!(all[0].session_count, 0);
        assert_eq!(all[0].best_lap, None);
        assert_eq!(all[1].session_count, 2);
        assert_eq!(all[1].best_lap, Some(LapTime::from_millis(63_200)));

        let cb_only = storage.list_activities(user.id, Some(cb.id)).unwrap();
        assert_eq!(cb_only.len(), 1);
    }

    #[test]
    fn test_update_activity_moves_sessions() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let mt = bike(&storage, &user, "MT-07");
        let day = activity(&storage, &user, &cb);
        let sheet = storage
            .add_setting_sheet(
                user.id,
                &NewSettingSheet {
                    motorcycle_id: cb.id,
                    sheet_name: "baseline".to_string(),
                    ..NewSettingSheet::default()
                },
            )
            .unwrap();
        let session = storage.create_session(user.id, day.id, "Sport 1", None).unwrap();
        storage
            .set_session_setting(user.id, session.id, Some(sheet.id))
            .unwrap();

        let mut edit = outing(mt.id, day.activity_date, "Tsukuba");
        edit.location = ActivityLocation::Custom("Hakone".to_string());
        let updated = storage.update_activity(user.id, day.id, &edit).unwrap();
        assert_eq!(updated.motorcycle_id, mt.id);
        assert_eq!(updated.location.circuit(), None);

        let moved = storage.get_session(user.id, session.id).unwrap();
        assert_eq!(moved.motorcycle_id, mt.id);
        assert_eq!(moved.setting_sheet_id, None);
    }

    #[test]
    fn test_delete_activity_removes_sessions() {
        let storage = storage();
        let user = rider(&storage);
        let other = storage.ensure_user("someone").unwrap();
        let cb = bike(&storage, &user, "CB400SF");
        let day = activity(&storage, &user, &cb);
        let session = storage.create_session(user.id, day.id, "Sport 1", None).unwrap();

        assert!(storage.get_activity(other.id, day.id).unwrap_err().is_not_found());
        assert!(storage.delete_activity(other.id, day.id).is_err());

        storage.delete_activity(user.id, day.id).unwrap();
        assert!(storage.get_session(user.id, session.id).unwrap_err().is_not_found());
        assert!(storage.list_activities(user.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_circuit_bests() {
        let storage = storage();
        let user = rider(&storage);
        let other = storage.ensure_user("someone").unwrap();
        let cb = bike(&storage, &user, "CB400SF");
        let nsf = bike(&storage, &user, "NSF250R");
        let theirs = bike(&storage, &other, "R6");

        timed_session(
            &storage,
            user.id,
            cb.id,
            date(2024, 5, 1),
            "Tsukuba",
            "May",
            &["1:08.000"],
        );
        let july = timed_session(
            &storage,
            user.id,
            nsf.id,
            date(2024, 7, 1),
            "Tsukuba",
            "July",
            &["1:06.500", "1:07.000"],
        );
        // Equal time later on does not take the record
        timed_session(
            &storage,
            user.id,
            cb.id,
            date(2024, 8, 1),
            "Tsukuba",
            "August",
            &["1:06.500"],
        );
        timed_session(
            &storage,
            user.id,
            cb.id,
            date(2024, 8, 2),
            "Tsukuba",
            "Untimed",
            &[],
        );
        let motegi = timed_session(
            &storage,
            user.id,
            cb.id,
            date(2024, 6, 1),
            "Motegi",
            "Heat",
            &["2:10.000"],
        );
        timed_session(
            &storage,
            user.id,
            cb.id,
            date(2024, 6, 2),
            "Hakone",
            "Road",
            &["0:59.000"],
        );
        timed_session(
            &storage,
            other.id,
            theirs.id,
            date(2024, 7, 1),
            "Tsukuba",
            "Fast",
            &["0:58.000"],
        );

        let bests = storage.circuit_bests(user.id).unwrap();
        assert_eq!(
            bests.iter().map(|b| b.circuit_name.as_str()).collect::<Vec<_>>(),
            vec!["Motegi", "Tsukuba"]
        );
        assert_eq!(bests[0].session_id, motegi);
        assert_eq!(bests[0].timed_sessions, 1);

        let tsukuba = &bests[1];
        assert_eq!(tsukuba.best_lap, LapTime::from_millis(66_500));
        assert_eq!(tsukuba.session_id, july);
        assert_eq!(tsukuba.session_name, "July");
        assert_eq!(tsukuba.activity_date, date(2024, 7, 1));
        assert_eq!(tsukuba.motorcycle_name, "NSF250R");
        assert_eq!(tsukuba.timed_sessions, 3);
    }
}
