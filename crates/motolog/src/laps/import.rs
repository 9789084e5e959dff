//! Lap file import pipeline.
//!
//! Size cap, device parsing, format validation and optional outlier
//! removal. The result is ready to be stored on a session.

use tracing::{debug, info};

use super::{
    filter_outlier_laps, is_valid_lap_time_format, parser_for, stats::best_lap, Device, GpsTracks,
    LapTime, DEFAULT_OUTLIER_MULTIPLIER, MAX_LAPS,
};
use crate::config::LapConfig;
use crate::error::{Error, Result};

/// Settings for one import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Device that produced the file.
    pub device: Device,
    /// Lap cap handed to the parser.
    pub max_laps: usize,
    /// Largest accepted file.
    pub max_file_bytes: u64,
    /// Drop laps slower than `outlier_multiplier` times the median.
    pub remove_outliers: bool,
    /// Outlier threshold factor.
    pub outlier_multiplier: f64,
}

impl ImportOptions {
    /// Options for `device` with built-in limits.
    #[must_use]
    pub fn new(device: Device) -> Self {
        Self {
            device,
            max_laps: MAX_LAPS,
            max_file_bytes: LapConfig::default().max_file_bytes,
            remove_outliers: false,
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
        }
    }

    /// Options for `device` with limits from configuration.
    #[must_use]
    pub fn from_config(device: Device, config: &LapConfig) -> Self {
        Self {
            device,
            max_laps: config.max_laps,
            max_file_bytes: config.max_file_bytes,
            remove_outliers: false,
            outlier_multiplier: config.outlier_multiplier,
        }
    }

    /// Enable or disable outlier removal.
    #[must_use]
    pub fn remove_outliers(mut self, remove: bool) -> Self {
        self.remove_outliers = remove;
        self
    }
}

/// Validated laps from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct LapImport {
    /// Laps in recorded order.
    pub lap_times: Vec<LapTime>,
    /// GPS tracks of the kept laps, keyed by 1-based position in `lap_times`.
    pub gps_tracks: GpsTracks,
    /// Fastest kept lap.
    pub best_lap: Option<LapTime>,
    /// Number of laps dropped as outliers.
    pub removed_outliers: usize,
}

/// Run a lap file through the import pipeline.
///
/// # Errors
///
/// - [`Error::LapLimit`] if the file is larger than allowed or holds too
///   many laps.
/// - [`Error::LapFormat`] if no laps were found or any lap is not a time.
pub fn import_laps(input: &[u8], options: &ImportOptions) -> Result<LapImport> {
    let device = options.device;
    let size = input.len() as u64;
    if size > options.max_file_bytes {
        return Err(Error::LapLimit {
            message: format!(
                "file is {size} bytes, the limit is {} bytes",
                options.max_file_bytes
            ),
        });
    }

    let parsed = parser_for(device, options.max_laps).parse(input)?;
    if parsed.is_empty() {
        return Err(Error::lap_format(
            device.as_str(),
            "no lap times found; the file may be empty or in another format",
        ));
    }

    let mut lap_times = Vec::with_capacity(parsed.lap_times.len());
    for text in &parsed.lap_times {
        let lap = is_valid_lap_time_format(text)
            .then(|| LapTime::parse(text))
            .flatten()
            .ok_or_else(|| Error::lap_format(device.as_str(), format!("invalid lap time '{text}'")))?;
        lap_times.push(lap);
    }
    debug!(device = %device, laps = lap_times.len(), "parsed lap file");

    let mut gps_tracks = parsed.gps_tracks;
    let mut removed_outliers = 0;
    if options.remove_outliers {
        let kept = filter_outlier_laps(&lap_times, options.outlier_multiplier);
        removed_outliers = lap_times.len() - kept.len();
        if removed_outliers > 0 {
            gps_tracks = keep_tracks(&lap_times, &kept, &gps_tracks);
        }
        lap_times = kept;
    }

    let best_lap = best_lap(&lap_times);
    info!(
        device = %device,
        laps = lap_times.len(),
        removed = removed_outliers,
        "imported laps"
    );

    Ok(LapImport {
        lap_times,
        gps_tracks,
        best_lap,
        removed_outliers,
    })
}

/// Re-key tracks so they follow the laps that survived filtering.
///
/// `kept` is an ordered subsequence of `all`.
fn keep_tracks(all: &[LapTime], kept: &[LapTime], tracks: &GpsTracks) -> GpsTracks {
    let mut result = GpsTracks::new();
    let mut remaining = kept.iter().peekable();
    let mut next_index = 1u32;

    for (position, lap) in (1u32..).zip(all) {
        if remaining.peek() != Some(&lap) {
            continue;
        }
        remaining.next();
        if let Some(points) = tracks.get(&position) {
            result.insert(next_index, points.clone());
        }
        next_index += 1;
    }
    result
}
