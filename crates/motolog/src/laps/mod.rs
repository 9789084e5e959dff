//! Lap-time import and analysis.
//!
//! Each supported lap timer exports a different file layout. A device
//! parser turns the raw file into [`ParsedLaps`]: normalized lap times in
//! recorded order plus, for GPS loggers, the track of every lap. Everything
//! downstream (statistics, outlier filtering, map simplification) works on
//! that normalized form only.

pub mod import;
pub mod parsers;
pub mod simplify;
pub mod stats;
pub mod time;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use import::{import_laps, ImportOptions, LapImport};
pub use parsers::{detect_device, parser_for, LapParser};
pub use simplify::{simplify_track, simplify_tracks};
pub use stats::{
    best_lap, compare_sessions, filter_outlier_laps, lap_stats, LapDetail, LapSort, LapStats,
    SessionComparison,
};
pub use time::{is_valid_lap_time_format, rank_suffix, LapTime};

/// Maximum number of laps read from one file.
pub const MAX_LAPS: usize = 5000;

/// Laps slower than the median times this factor are outliers.
pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 2.0;

/// One GPS sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Ground speed in km/h.
    pub speed: f64,
    /// Seconds since the start of the recording.
    pub runtime: f64,
}

/// GPS samples per lap, keyed by 1-based lap number.
pub type GpsTracks = BTreeMap<u32, Vec<GpsPoint>>;

/// Output of a device parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedLaps {
    /// Lap times as text, in recorded order, before validation.
    pub lap_times: Vec<String>,
    /// Per-lap GPS tracks; empty for devices without GPS.
    pub gps_tracks: GpsTracks,
}

impl ParsedLaps {
    /// Lap times only, no GPS.
    #[must_use]
    pub fn from_times(lap_times: Vec<String>) -> Self {
        Self {
            lap_times,
            gps_tracks: GpsTracks::new(),
        }
    }

    /// Whether no laps were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lap_times.is_empty()
    }
}

/// Supported lap timer devices and export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Plain text, one lap per line.
    SimpleCsv,
    /// ZiiX lap timer CSV.
    Ziix,
    /// MYLAPS transponder CSV.
    Mylaps,
    /// Drogger GPS logger CSV.
    Drogger,
    /// RaceChrono v3 CSV export.
    Racechrono,
}

impl Device {
    /// Every supported device.
    pub const ALL: [Device; 5] = [
        Self::SimpleCsv,
        Self::Ziix,
        Self::Mylaps,
        Self::Drogger,
        Self::Racechrono,
    ];

    /// Stable identifier used in config and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleCsv => "simple_csv",
            Self::Ziix => "ziix",
            Self::Mylaps => "mylaps",
            Self::Drogger => "drogger",
            Self::Racechrono => "racechrono",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|device| device.as_str() == s)
            .ok_or_else(|| Error::UnknownDevice(s.to_string()))
    }
}

/// Decode uploaded bytes as text.
///
/// Strips a UTF-8 BOM and replaces invalid sequences, so Shift-JIS exports
/// still yield their ASCII lap columns.
#[must_use]
pub fn decode_text(input: &[u8]) -> String {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    String::from_utf8_lossy(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_round_trip() {
        for device in Device::ALL {
            assert_eq!(device.as_str().parse::<Device>().unwrap(), device);
        }
        let err = "garmin".parse::<Device>().unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(_)));
    }

    #[test]
    fn test_decode_text_strips_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBF1:00.000\n"), "1:00.000\n");
        let shift_jis = decode_text(b"LAP,\x83\x89\x83b\n1,0'41.878");
        assert!(shift_jis.ends_with("\n1,0'41.878"));
    }

    #[test]
    fn test_parsed_laps_from_times() {
        let parsed = ParsedLaps::from_times(vec!["1:00.000".to_string()]);
        assert!(!parsed.is_empty());
        assert!(parsed.gps_tracks.is_empty());
        assert!(ParsedLaps::default().is_empty());
    }
}
