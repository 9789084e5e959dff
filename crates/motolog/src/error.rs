//! Error types for motolog.
//!
//! This module defines all error types used throughout the motolog crate,
//! providing detailed context for debugging and user-facing messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for motolog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// A record referenced by id does not exist (or belongs to another user).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record, e.g. "motorcycle".
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// User input failed a business rule.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the rule that was broken.
        message: String,
    },

    // === Lap Import Errors ===
    /// The requested lap timer device is not supported.
    #[error("unknown lap timer device '{0}'")]
    UnknownDevice(String),

    /// A lap file could not be understood by the selected parser.
    #[error("could not read {device} lap file: {message}. Check that the right device is selected")]
    LapFormat {
        /// Device parser that was used.
        device: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A lap file exceeded the configured limits.
    #[error("lap file too large: {message}")]
    LapLimit {
        /// Which limit was exceeded.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for motolog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a new validation error.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a lap file format error for the given device.
    #[must_use]
    pub fn lap_format(device: &'static str, message: impl Into<String>) -> Self {
        Self::LapFormat {
            device,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was caused by bad user input rather than the system.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::UnknownDevice(_)
                | Self::LapFormat { .. }
                | Self::LapLimit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("motorcycle", 7);
        assert_eq!(err.to_string(), "motorcycle 7 not found");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation("reading_after_reset", "must not exceed the reading before reset");
        let msg = err.to_string();
        assert!(msg.contains("reading_after_reset"));
        assert!(msg.contains("must not exceed"));
    }

    #[test]
    fn test_lap_format_suggests_other_device() {
        let err = Error::lap_format("drogger", "missing 'Lap' column");
        let msg = err.to_string();
        assert!(msg.contains("drogger"));
        assert!(msg.contains("missing 'Lap' column"));
        assert!(msg.contains("right device"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("session", 1).is_not_found());
        assert!(!Error::internal("x").is_not_found());
    }

    #[test]
    fn test_is_user_error() {
        assert!(Error::validation("date", "in the future").is_user_error());
        assert!(Error::UnknownDevice("garmin".to_string()).is_user_error());
        assert!(Error::LapLimit {
            message: "too many laps".to_string()
        }
        .is_user_error());
        assert!(!Error::internal("bug").is_user_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
