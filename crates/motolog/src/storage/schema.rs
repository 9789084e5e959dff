//! `SQLite` schema definitions for motolog.
//!
//! Dates are stored as `YYYY-MM-DD` text, timestamps as RFC 3339 text and
//! lap times as JSON arrays of `M:SS.mmm` strings.

/// Riders.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// Vehicles. `odometer_offset` caches the sum of reset increments.
pub const CREATE_MOTORCYCLES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS motorcycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    maker TEXT,
    name TEXT NOT NULL,
    year INTEGER,
    is_racer INTEGER NOT NULL DEFAULT 0,
    is_default INTEGER NOT NULL DEFAULT 0,
    odometer_offset INTEGER NOT NULL DEFAULT 0,
    total_operating_hours REAL
)
";

/// Fuel-ups.
pub const CREATE_FUEL_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS fuel_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    entry_date TEXT NOT NULL,
    odometer_reading INTEGER NOT NULL,
    total_distance INTEGER NOT NULL,
    fuel_volume REAL NOT NULL,
    price_per_liter REAL,
    total_cost INTEGER,
    station_name TEXT,
    is_full_tank INTEGER NOT NULL DEFAULT 1,
    exclude_from_average INTEGER NOT NULL DEFAULT 0,
    notes TEXT
)
";

/// Maintenance events.
pub const CREATE_MAINTENANCE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maintenance_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    maintenance_date TEXT NOT NULL,
    odometer_reading INTEGER NOT NULL,
    total_distance INTEGER NOT NULL,
    description TEXT NOT NULL,
    category TEXT,
    parts_cost REAL,
    labor_cost REAL
)
";

/// Odometer resets.
pub const CREATE_ODO_RESET_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS odo_reset_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    reset_date TEXT NOT NULL,
    display_odo_before_reset INTEGER NOT NULL,
    display_odo_after_reset INTEGER NOT NULL,
    offset_increment INTEGER NOT NULL
)
";

/// Service reminders.
pub const CREATE_MAINTENANCE_REMINDERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maintenance_reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    task_description TEXT NOT NULL,
    interval_km INTEGER,
    interval_months INTEGER,
    last_done_date TEXT,
    last_done_km INTEGER
)
";

/// Notes and checklists.
pub const CREATE_GENERAL_NOTES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS general_notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    motorcycle_id INTEGER REFERENCES motorcycles(id) ON DELETE SET NULL,
    note_date TEXT NOT NULL,
    title TEXT,
    content TEXT,
    category TEXT NOT NULL DEFAULT 'note'
)
";

/// Outings such as track days. Exactly one of `circuit_name` and
/// `custom_location` is set.
pub const CREATE_ACTIVITY_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    activity_date TEXT NOT NULL,
    activity_title TEXT NOT NULL,
    circuit_name TEXT,
    custom_location TEXT,
    weather TEXT,
    temperature REAL,
    notes TEXT
)
";

/// Vehicle setups. `details` is a JSON object of category to item to value.
pub const CREATE_SETTING_SHEETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS setting_sheets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    sheet_name TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '{}',
    notes TEXT,
    is_archived INTEGER NOT NULL DEFAULT 0
)
";

/// Track sessions. `activity_id` is null only for sessions written before
/// schema version 2.
pub const CREATE_SESSION_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS session_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    motorcycle_id INTEGER NOT NULL REFERENCES motorcycles(id) ON DELETE CASCADE,
    activity_id INTEGER REFERENCES activity_logs(id) ON DELETE CASCADE,
    setting_sheet_id INTEGER REFERENCES setting_sheets(id) ON DELETE SET NULL,
    session_name TEXT NOT NULL,
    lap_times TEXT NOT NULL DEFAULT '[]',
    best_lap_ms INTEGER,
    gps_tracks TEXT
)
";

/// Unlocked achievements. The unique pair makes unlocks idempotent.
pub const CREATE_USER_ACHIEVEMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    achievement_code TEXT NOT NULL,
    unlocked_at TEXT NOT NULL,
    UNIQUE (user_id, achievement_code)
)
";

/// Index for per-vehicle fuel history lookups.
pub const CREATE_FUEL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_fuel_entries_vehicle ON fuel_entries(motorcycle_id, entry_date)
";

/// Index for per-vehicle maintenance history lookups.
pub const CREATE_MAINTENANCE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_maintenance_entries_vehicle
    ON maintenance_entries(motorcycle_id, maintenance_date)
";

/// Index for per-vehicle reset history lookups.
pub const CREATE_ODO_RESET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_odo_reset_logs_vehicle ON odo_reset_logs(motorcycle_id, reset_date)
";

/// Index for per-vehicle outing lookups.
pub const CREATE_ACTIVITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_logs_vehicle ON activity_logs(motorcycle_id, activity_date)
";

/// Index for the sessions of an outing. Created by migration 2 because older
/// `session_logs` tables lack the column until then.
pub const CREATE_SESSION_ACTIVITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_session_logs_activity ON session_logs(activity_id)
";

/// Key-value pairs such as the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_MOTORCYCLES_TABLE,
    CREATE_FUEL_ENTRIES_TABLE,
    CREATE_MAINTENANCE_ENTRIES_TABLE,
    CREATE_ODO_RESET_LOGS_TABLE,
    CREATE_MAINTENANCE_REMINDERS_TABLE,
    CREATE_GENERAL_NOTES_TABLE,
    CREATE_ACTIVITY_LOGS_TABLE,
    CREATE_SETTING_SHEETS_TABLE,
    CREATE_SESSION_LOGS_TABLE,
    CREATE_USER_ACHIEVEMENTS_TABLE,
    CREATE_FUEL_INDEX,
    CREATE_MAINTENANCE_INDEX,
    CREATE_ODO_RESET_INDEX,
    CREATE_ACTIVITY_INDEX,
    CREATE_METADATA_TABLE,
];
