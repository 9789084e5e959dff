use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{check_length, json_column_error, Storage};
use crate::error::{Error, Result};
use crate::laps::{best_lap, GpsTracks, LapImport, LapTime, MAX_LAPS};
use crate::model::SessionLog;

const MAX_NAME_CHARS: usize = 100;

const SESSION_COLUMNS: &str = "s.id, s.motorcycle_id, s.session_name, s.lap_times, \
     s.best_lap_ms, s.gps_tracks, s.activity_id, s.setting_sheet_id";

impl Storage {
    /// Start an empty session within one of the user's outings.
    ///
    /// The session rides the outing's vehicle, and a setting sheet must be
    /// for that vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or too long, the outing or sheet
    /// is not the user's, the sheet is for another vehicle, or the database
    /// operation fails.
    pub fn create_session(
        &self,
        user_id: i64,
        activity_id: i64,
        session_name: &str,
        setting_sheet_id: Option<i64>,
    ) -> Result<SessionLog> {
        let session_name = session_name.trim();
        if session_name.is_empty() {
            return Err(Error::validation("session_name", "is required"));
        }
        check_length("session_name", session_name, MAX_NAME_CHARS)?;
        let activity = self.get_activity(user_id, activity_id)?;
        if let Some(sheet_id) = setting_sheet_id {
            self.check_sheet_vehicle(user_id, sheet_id, activity.motorcycle_id)?;
        }

        self.conn.execute(
            "INSERT INTO session_logs (motorcycle_id, activity_id, session_name, setting_sheet_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![activity.motorcycle_id, activity_id, session_name, setting_sheet_id],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted session with id {}", id);
        self.get_session(user_id, id)
    }

    /// Fetch one session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the session is not the user's, or a
    /// database error if stored laps cannot be decoded.
    pub fn get_session(&self, user_id: i64, session_id: i64) -> Result<SessionLog> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM session_logs s \
                     JOIN motorcycles m ON m.id = s.motorcycle_id \
                     WHERE s.id = ?1 AND m.user_id = ?2"
                ),
                [session_id, user_id],
                Self::row_to_session,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("session", session_id))
    }

    /// Sessions in creation order, optionally for one vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_sessions(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
    ) -> Result<Vec<SessionLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM session_logs s \
             JOIN motorcycles m ON m.id = s.motorcycle_id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR s.motorcycle_id = ?2) \
             ORDER BY s.id ASC"
        ))?;

        let sessions = stmt
            .query_map(params![user_id, motorcycle_id], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Sessions of one outing in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the outing is not the user's.
    pub fn list_activity_sessions(
        &self,
        user_id: i64,
        activity_id: i64,
    ) -> Result<Vec<SessionLog>> {
        self.get_activity(user_id, activity_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM session_logs s \
             WHERE s.activity_id = ?1 ORDER BY s.id ASC"
        ))?;

        let sessions = stmt
            .query_map([activity_id], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Link a session to a setting sheet, or unlink it with `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session or sheet is not the user's, the sheet
    /// belongs to another vehicle, or the database operation fails.
    pub fn set_session_setting(
        &self,
        user_id: i64,
        session_id: i64,
        setting_sheet_id: Option<i64>,
    ) -> Result<SessionLog> {
        let session = self.get_session(user_id, session_id)?;
        if let Some(sheet_id) = setting_sheet_id {
            self.check_sheet_vehicle(user_id, sheet_id, session.motorcycle_id)?;
        }

        self.conn.execute(
            "UPDATE session_logs SET setting_sheet_id = ?1 WHERE id = ?2",
            params![setting_sheet_id, session_id],
        )?;
        self.get_session(user_id, session_id)
    }

    /// Replace a session's laps with manually entered times.
    ///
    /// GPS tracks no longer match the laps and are cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not the user's, there are too many
    /// laps, or the database operation fails.
    pub fn set_lap_times(
        &self,
        user_id: i64,
        session_id: i64,
        lap_times: &[LapTime],
    ) -> Result<SessionLog> {
        self.write_laps(user_id, session_id, lap_times, None)
    }

    /// Store the result of a lap import on a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not the user's or the database
    /// operation fails.
    pub fn store_laps(
        &self,
        user_id: i64,
        session_id: i64,
        import: &LapImport,
    ) -> Result<SessionLog> {
        let tracks = (!import.gps_tracks.is_empty()).then_some(&import.gps_tracks);
        let session = self.write_laps(user_id, session_id, &import.lap_times, tracks)?;
        info!(
            session_id,
            laps = import.lap_times.len(),
            removed = import.removed_outliers,
            "stored imported laps"
        );
        Ok(session)
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the session is not the user's.
    pub fn delete_session(&self, user_id: i64, session_id: i64) -> Result<()> {
        self.get_session(user_id, session_id)?;
        self.conn
            .execute("DELETE FROM session_logs WHERE id = ?1", [session_id])?;
        Ok(())
    }

    fn check_sheet_vehicle(&self, user_id: i64, sheet_id: i64, motorcycle_id: i64) -> Result<()> {
        let sheet = self.get_setting_sheet(user_id, sheet_id)?;
        if sheet.motorcycle_id != motorcycle_id {
            return Err(Error::validation(
                "setting_sheet",
                format!("sheet {sheet_id} is for another vehicle"),
            ));
        }
        Ok(())
    }

    fn write_laps(
        &self,
        user_id: i64,
        session_id: i64,
        lap_times: &[LapTime],
        gps_tracks: Option<&GpsTracks>,
    ) -> Result<SessionLog> {
        self.get_session(user_id, session_id)?;
        if lap_times.len() > MAX_LAPS {
            return Err(Error::LapLimit {
                message: format!("a session holds at most {MAX_LAPS} laps"),
            });
        }

        let laps_json = serde_json::to_string(lap_times)?;
        let tracks_json = gps_tracks.map(serde_json::to_string).transpose()?;
        let best_ms = best_lap(lap_times)
            .map(|best| i64::try_from(best.as_millis()))
            .transpose()
            .map_err(|_| Error::internal("best lap does not fit in an integer column"))?;

        self.conn.execute(
            r"
            UPDATE session_logs SET lap_times = ?1, best_lap_ms = ?2, gps_tracks = ?3
            WHERE id = ?4
            ",
            params![laps_json, best_ms, tracks_json, session_id],
        )?;

        self.get_session(user_id, session_id)
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionLog> {
        let laps_json: String = row.get(3)?;
        let lap_times: Vec<LapTime> =
            serde_json::from_str(&laps_json).map_err(|e| json_column_error(3, e))?;

        let best_ms: Option<i64> = row.get(4)?;
        let best_lap = best_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .map(LapTime::from_millis);

        let tracks_json: Option<String> = row.get(5)?;
        let gps_tracks = tracks_json
            .map(|json| serde_json::from_str::<GpsTracks>(&json))
            .transpose()
            .map_err(|e| json_column_error(5, e))?;

        Ok(SessionLog {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            activity_id: row.get(6)?,
            setting_sheet_id: row.get(7)?,
            session_name: row.get(2)?,
            lap_times,
            best_lap,
            gps_tracks,
        })
    }
}
