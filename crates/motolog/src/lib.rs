//! `motolog` - A logbook for motorcycles
//!
//! This library provides the core of the logbook: odometer offset
//! reconciliation and fuel economy, lap-time import and statistics,
//! achievement evaluation, maintenance reminders, and a `SQLite` store
//! that keeps derived distances consistent.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod achievements;
pub mod cli;
pub mod config;
pub mod distance;
pub mod error;
pub mod fuel;
pub mod laps;
pub mod logging;
pub mod model;
pub mod reminders;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{Storage, StorageStats};
