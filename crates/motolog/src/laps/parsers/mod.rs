//! Device-specific lap file parsers.

mod drogger;
mod mylaps;
mod racechrono;
mod simple;
mod ziix;

pub use drogger::DroggerParser;
pub use mylaps::MylapsParser;
pub use racechrono::RaceChronoParser;
pub use simple::SimpleCsvParser;
pub use ziix::ZiixParser;

use super::{Device, ParsedLaps};
use crate::error::Result;

/// Turns one device's export file into normalized laps.
///
/// Implementors only extract text; format validation happens in the import
/// pipeline so every device reports errors the same way.
pub trait LapParser: Send + Sync {
    /// Device this parser reads.
    fn device(&self) -> Device;

    /// Parse a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LapLimit`] when the file holds more laps than
    /// allowed, or [`crate::Error::LapFormat`] when required columns are
    /// missing.
    fn parse(&self, input: &[u8]) -> Result<ParsedLaps>;

    /// Whether the bytes look like this device's format.
    fn recognizes(&self, _input: &[u8]) -> bool {
        false
    }
}

/// Parser for a device, capped at `max_laps` laps.
#[must_use]
pub fn parser_for(device: Device, max_laps: usize) -> Box<dyn LapParser> {
    match device {
        Device::SimpleCsv => Box::new(SimpleCsvParser::new(max_laps)),
        Device::Ziix => Box::new(ZiixParser::new(max_laps)),
        Device::Mylaps => Box::new(MylapsParser::new(max_laps)),
        Device::Drogger => Box::new(DroggerParser::new(max_laps)),
        Device::Racechrono => Box::new(RaceChronoParser::new(max_laps)),
    }
}

/// Guess the device from file contents.
///
/// Only formats with a reliable signature are detected.
#[must_use]
pub fn detect_device(input: &[u8]) -> Option<Device> {
    Device::ALL
        .into_iter()
        .find(|device| parser_for(*device, super::MAX_LAPS).recognizes(input))
}

pub(crate) fn too_many_laps(max_laps: usize) -> crate::Error {
    crate::Error::LapLimit {
        message: format!("at most {max_laps} laps per session"),
    }
}

/// Split one CSV record into trimmed fields.
///
/// Handles double-quoted fields and `""` escapes. Records never span lines
/// in any supported export.
pub(crate) fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
