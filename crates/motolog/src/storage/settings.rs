use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{check_length, json_column_error, trimmed, Storage};
use crate::error::{Error, Result};
use crate::model::{NewSettingSheet, SettingDetails, SettingSheet};

const MAX_NAME_CHARS: usize = 100;
const MAX_NOTES_CHARS: usize = 1000;

const SHEET_COLUMNS: &str =
    "t.id, t.motorcycle_id, t.sheet_name, t.details, t.notes, t.is_archived";

fn validate_sheet(new: &NewSettingSheet) -> Result<()> {
    let name = new.sheet_name.trim();
    if name.is_empty() {
        return Err(Error::validation("sheet_name", "is required"));
    }
    check_length("sheet_name", name, MAX_NAME_CHARS)?;
    if let Some(notes) = new.notes.as_deref() {
        check_length("notes", notes, MAX_NOTES_CHARS)?;
    }

    let blank_key = new.details.iter().any(|(category, items)| {
        category.trim().is_empty() || items.keys().any(|item| item.trim().is_empty())
    });
    if blank_key {
        return Err(Error::validation(
            "details",
            "categories and items need a name",
        ));
    }
    Ok(())
}

impl Storage {
    /// Save a setup for one of the user's vehicles.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the vehicle is not the user's,
    /// or the database operation fails.
    pub fn add_setting_sheet(&self, user_id: i64, new: &NewSettingSheet) -> Result<SettingSheet> {
        validate_sheet(new)?;
        self.get_motorcycle(user_id, new.motorcycle_id)?;

        self.conn.execute(
            "INSERT INTO setting_sheets (motorcycle_id, sheet_name, details, notes) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                new.motorcycle_id,
                new.sheet_name.trim(),
                serde_json::to_string(&new.details)?,
                trimmed(new.notes.as_deref()),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted setting sheet with id {}", id);
        self.get_setting_sheet(user_id, id)
    }

    /// Replace a sheet's name, values and notes.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the sheet is not the user's,
    /// `new` names a different vehicle, or the database operation fails.
    pub fn update_setting_sheet(
        &self,
        user_id: i64,
        sheet_id: i64,
        new: &NewSettingSheet,
    ) -> Result<SettingSheet> {
        validate_sheet(new)?;
        let existing = self.get_setting_sheet(user_id, sheet_id)?;
        if existing.motorcycle_id != new.motorcycle_id {
            return Err(Error::validation(
                "motorcycle_id",
                "a setting sheet stays with its vehicle",
            ));
        }

        self.conn.execute(
            "UPDATE setting_sheets SET sheet_name = ?1, details = ?2, notes = ?3 WHERE id = ?4",
            params![
                new.sheet_name.trim(),
                serde_json::to_string(&new.details)?,
                trimmed(new.notes.as_deref()),
                sheet_id,
            ],
        )?;

        self.get_setting_sheet(user_id, sheet_id)
    }

    /// Fetch one sheet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the sheet is not the user's.
    pub fn get_setting_sheet(&self, user_id: i64, sheet_id: i64) -> Result<SettingSheet> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SHEET_COLUMNS} FROM setting_sheets t \
                     JOIN motorcycles m ON m.id = t.motorcycle_id \
                     WHERE t.id = ?1 AND m.user_id = ?2"
                ),
                [sheet_id, user_id],
                Self::row_to_sheet,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("setting sheet", sheet_id))
    }

    /// Sheets with active ones first, then by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_setting_sheets(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
        include_archived: bool,
    ) -> Result<Vec<SettingSheet>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SHEET_COLUMNS} FROM setting_sheets t \
             JOIN motorcycles m ON m.id = t.motorcycle_id \
             WHERE m.user_id = ?1 AND (?2 IS NULL OR t.motorcycle_id = ?2) \
               AND (?3 OR t.is_archived = 0) \
             ORDER BY t.is_archived, t.sheet_name, t.id"
        ))?;

        let sheets = stmt
            .query_map(params![user_id, motorcycle_id, include_archived], Self::row_to_sheet)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sheets)
    }

    /// Flip a sheet between active and archived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the sheet is not the user's.
    pub fn toggle_setting_archive(&self, user_id: i64, sheet_id: i64) -> Result<SettingSheet> {
        self.get_setting_sheet(user_id, sheet_id)?;
        self.conn.execute(
            "UPDATE setting_sheets SET is_archived = NOT is_archived WHERE id = ?1",
            [sheet_id],
        )?;
        self.get_setting_sheet(user_id, sheet_id)
    }

    /// Delete a sheet. Sessions that used it keep their laps and lose the link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the sheet is not the user's.
    pub fn delete_setting_sheet(&self, user_id: i64, sheet_id: i64) -> Result<()> {
        self.get_setting_sheet(user_id, sheet_id)?;
        self.conn
            .execute("DELETE FROM setting_sheets WHERE id = ?1", [sheet_id])?;
        Ok(())
    }

    fn row_to_sheet(row: &rusqlite::Row) -> rusqlite::Result<SettingSheet> {
        let details_json: String = row.get(3)?;
        let details: SettingDetails =
            serde_json::from_str(&details_json).map_err(|e| json_column_error(3, e))?;

        Ok(SettingSheet {
            id: row.get(0)?,
            motorcycle_id: row.get(1)?,
            sheet_name: row.get(2)?,
            details,
            notes: row.get(4)?,
            is_archived: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{NewSettingSheet, SettingDetails};
    use crate::storage::test_support::*;

    fn details(entries: &[(&str, &str, &str)]) -> SettingDetails {
        let mut details = SettingDetails::new();
        for (category, item, value) in entries {
            details
                .entry((*category).to_string())
                .or_default()
                .insert((*item).to_string(), (*value).to_string());
        }
        details
    }

    fn sheet(motorcycle_id: i64, name: &str) -> NewSettingSheet {
        NewSettingSheet {
            motorcycle_id,
            sheet_name: name.to_string(),
            details: details(&[
                ("suspension", "front_preload", "3"),
                ("tires", "front_pressure", "2.0"),
            ]),
            notes: Some(" dry track ".to_string()),
        }
    }

    #[test]
    fn test_add_setting_sheet_keeps_details() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");

        let saved = storage.add_setting_sheet(user.id, &sheet(cb.id, "baseline")).unwrap();
        assert_eq!(saved.details["suspension"]["front_preload"], "3");
        assert_eq!(saved.notes.as_deref(), Some("dry track"));
        assert!(!saved.is_archived);
        assert_eq!(storage.get_setting_sheet(user.id, saved.id).unwrap(), saved);
    }

    #[test]
    fn test_setting_sheet_validation() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");

        let mut unnamed = sheet(cb.id, " ");
        assert!(storage.add_setting_sheet(user.id, &unnamed).is_err());
        unnamed.sheet_name = "n".repeat(101);
        assert!(storage.add_setting_sheet(user.id, &unnamed).is_err());

        let mut blank_item = sheet(cb.id, "baseline");
        blank_item.details = details(&[("engine", " ", "1")]);
        let err = storage.add_setting_sheet(user.id, &blank_item).unwrap_err();
        assert!(err.to_string().contains("details"));
    }

    #[test]
    fn test_update_keeps_vehicle() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let mt = bike(&storage, &user, "MT-07");
        let saved = storage.add_setting_sheet(user.id, &sheet(cb.id, "baseline")).unwrap();

        let mut edit = sheet(cb.id, "wet");
        edit.details = details(&[("tires", "front_pressure", "1.8")]);
        let updated = storage.update_setting_sheet(user.id, saved.id, &edit).unwrap();
        assert_eq!(updated.sheet_name, "wet");
        assert_eq!(updated.details.len(), 1);

        edit.motorcycle_id = mt.id;
        assert!(storage.update_setting_sheet(user.id, saved.id, &edit).is_err());
    }

    #[test]
    fn test_list_orders_archived_last() {
        let storage = storage();
        let user = rider(&storage);
        let cb = bike(&storage, &user, "CB400SF");
        let wet = storage.add_setting_sheet(user.id, &sheet(cb.id, "wet")).unwrap();
        storage.add_setting_sheet(user.id, &sheet(cb.id, "baseline")).unwrap();
        storage.add_setting_sheet(user.id, &sheet(cb.id, "rain")).unwrap();

        let archived = storage.toggle_setting_archive(user.id, wet.id).unwrap();
        assert!(archived.is_archived);

        let names = |include_archived| {
            storage
                .list_setting_sheets(user.id, Some(cb.id), include_archived)
                .unwrap()
                .into_iter()
                .map(|s| s.sheet_name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(true), vec!["baseline", "rain", "wet"]);
        assert_eq!(names(false), vec!["baseline", "rain"]);

        assert!(!storage.toggle_setting_archive(user.id, wet.id).unwrap().is_archived);
    }

    #[test]
    fn test_delete_sheet_unlinks_sessions() {
        let storage = storage();
        let user = rider(&storage);
        let other = storage.ensure_user("someone").unwrap();
        let cb = bike(&storage, &user, "CB400SF");
        let saved = storage.add_setting_sheet(user.id, &sheet(cb.id, "baseline")).unwrap();
        let day = activity(&storage, &user, &cb);
        let session = storage.create_session(user.id, day.id, "Sport 1", None).unwrap();
        storage
            .set_session_setting(user.id, session.id, Some(saved.id))
            .unwrap();

        assert!(storage.delete_setting_sheet(other.id, saved.id).unwrap_err().is_not_found());
        storage.delete_setting_sheet(user.id, saved.id).unwrap();

        let session = storage.get_session(user.id, session.id).unwrap();
        assert_eq!(session.setting_sheet_id, None);
        assert!(storage.list_setting_sheets(user.id, None, true).unwrap().is_empty());
    }
}
