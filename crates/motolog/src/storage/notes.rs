use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::Storage;
use crate::error::{Error, Result};
use crate::model::{GeneralNote, NewNote, NoteCategory};

const MAX_TITLE_CHARS: usize = 150;
const MAX_CONTENT_CHARS: usize = 2000;

const NOTE_COLUMNS: &str = "id, user_id, motorcycle_id, note_date, title, content, category";

fn validate_note(new: &NewNote) -> Result<()> {
    let content = new.content.trim();
    if content.is_empty() {
        return Err(Error::validation("content", "is required"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(Error::validation(
            "content",
            format!("must be {MAX_CONTENT_CHARS} characters or fewer"),
        ));
    }
    if new
        .title
        .as_deref()
        .is_some_and(|title| title.trim().chars().count() > MAX_TITLE_CHARS)
    {
        return Err(Error::validation(
            "title",
            format!("must be {MAX_TITLE_CHARS} characters or fewer"),
        ));
    }
    Ok(())
}

impl Storage {
    /// Save a note, optionally tied to one of the user's vehicles.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the vehicle is not the user's,
    /// or the database operation fails.
    pub fn add_note(&self, user_id: i64, new: &NewNote) -> Result<GeneralNote> {
        validate_note(new)?;
        if let Some(motorcycle_id) = new.motorcycle_id {
            self.get_motorcycle(user_id, motorcycle_id)?;
        }

        let title = new
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty());

        self.conn.execute(
            r"
            INSERT INTO general_notes (user_id, motorcycle_id, note_date, title, content, category)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                user_id,
                new.motorcycle_id,
                new.note_date,
                title,
                new.content.trim(),
                new.category.to_string(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted note with id {}", id);
        self.get_note(user_id, id)
    }

    /// Fetch one note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the note is not the user's.
    pub fn get_note(&self, user_id: i64, note_id: i64) -> Result<GeneralNote> {
        self.conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM general_notes WHERE id = ?1 AND user_id = ?2"),
                [note_id, user_id],
                Self::row_to_note,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("note", note_id))
    }

    /// Notes, newest first, optionally filtered by vehicle and category.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_notes(
        &self,
        user_id: i64,
        motorcycle_id: Option<i64>,
        category: Option<NoteCategory>,
    ) -> Result<Vec<GeneralNote>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM general_notes \
             WHERE user_id = ?1 AND (?2 IS NULL OR motorcycle_id = ?2) \
             AND (?3 IS NULL OR category = ?3) \
             ORDER BY note_date DESC, id DESC"
        ))?;

        let notes = stmt
            .query_map(
                params![user_id, motorcycle_id, category.map(|c| c.to_string())],
                Self::row_to_note,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Delete a note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the note is not the user's.
    pub fn delete_note(&self, user_id: i64, note_id: i64) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM general_notes WHERE id = ?1 AND user_id = ?2",
            [note_id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::not_found("note", note_id));
        }
        Ok(())
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<GeneralNote> {
        let category: String = row.get(6)?;
        Ok(GeneralNote {
            id: row.get(0)?,
            user_id: row.get(1)?,
            motorcycle_id: row.get(2)?,
            note_date: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            // Unknown values from older files read as plain notes
            category: category.parse().unwrap_or_default(),
        })
    }
}
