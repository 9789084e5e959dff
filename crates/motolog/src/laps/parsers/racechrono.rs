use std::collections::BTreeMap;

use tracing::debug;

use super::{split_csv_line, LapParser};
use crate::error::Result;
use crate::laps::{decode_text, Device, GpsPoint, GpsTracks, LapTime, ParsedLaps};

const HEAD_BYTES: usize = 2048;
const HEAD_LINES: usize = 30;
const MS_TO_KMH: f64 = 3.6;

/// RaceChrono v3 CSV export.
///
/// A metadata preamble is followed by a header row and one GPS sample per
/// row. Samples are grouped by `lap_number`; a lap's time is its last
/// `elapsed_time` minus the end of the previous lap.
#[derive(Debug, Clone)]
pub struct RaceChronoParser {
    max_laps: usize,
}

impl RaceChronoParser {
    /// Create a parser that keeps at most `max_laps` laps.
    #[must_use]
    pub const fn new(max_laps: usize) -> Self {
        Self { max_laps }
    }
}

struct Columns {
    width: usize,
    lap: usize,
    latitude: usize,
    longitude: usize,
    elapsed: usize,
    speed: usize,
}

impl Columns {
    fn from_header(header: &str) -> Option<Self> {
        let names: Vec<String> = split_csv_line(header)
            .into_iter()
            .map(|name| name.to_lowercase())
            .collect();
        // Several speed columns may exist (GPS, OBD); the first is GPS.
        let find = |wanted: &str| names.iter().position(|name| name == wanted);
        Some(Self {
            width: names.len(),
            lap: find("lap_number")?,
            latitude: find("latitude")?,
            longitude: find("longitude")?,
            elapsed: find("elapsed_time")?,
            speed: find("speed")?,
        })
    }

    fn read(&self, line: &str) -> Option<(i64, GpsPoint)> {
        let fields = split_csv_line(line);
        if fields.len() < self.width {
            return None;
        }
        let lap = fields[self.lap].parse::<i64>().ok()?;
        let lat = fields[self.latitude].parse::<f64>().ok()?;
        let lng = fields[self.longitude].parse::<f64>().ok()?;
        if lat == 0.0 && lng == 0.0 {
            return None;
        }
        let number_or_zero = |text: &str| -> Option<f64> {
            if text.is_empty() {
                Some(0.0)
            } else {
                text.parse().ok()
            }
        };
        let speed = number_or_zero(&fields[self.speed])? * MS_TO_KMH;
        let runtime = number_or_zero(&fields[self.elapsed])?;
        Some((
            lap,
            GpsPoint {
                lat,
                lng,
                speed,
                runtime,
            },
        ))
    }
}

fn is_header(line: &str) -> bool {
    let line = line.to_lowercase();
    line.contains("timestamp") && line.contains("latitude") && line.contains("lap_number")
}

impl LapParser for RaceChronoParser {
    fn device(&self) -> Device {
        Device::Racechrono
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedLaps> {
        let text = decode_text(input);
        let mut lines = text.lines();
        let Some(header) = lines.by_ref().find(|line| is_header(line)) else {
            debug!("no RaceChrono header row found");
            return Ok(ParsedLaps::default());
        };
        let Some(columns) = Columns::from_header(header) else {
            debug!("RaceChrono header is missing required columns");
            return Ok(ParsedLaps::default());
        };

        let mut by_lap: BTreeMap<i64, Vec<GpsPoint>> = BTreeMap::new();
        for line in lines.filter(|line| !line.trim().is_empty()) {
            if let Some((lap, point)) = columns.read(line) {
                by_lap.entry(lap).or_default().push(point);
            }
        }

        let mut lap_times = Vec::new();
        let mut gps_tracks = GpsTracks::new();
        let mut previous_end: Option<f64> = None;
        for points in by_lap.into_values() {
            if lap_times.len() >= self.max_laps {
                break;
            }
            let (Some(first), Some(last)) = (points.first(), points.last()) else {
                continue;
            };
            let start = previous_end.unwrap_or(first.runtime);
            let end = last.runtime;
            previous_end = Some(end);

            let seconds = end - start;
            if seconds <= 0.0 {
                continue;
            }
            let Some(lap_time) = LapTime::from_secs_f64(seconds) else {
                continue;
            };
            lap_times.push(lap_time.to_string());
            let index = u32::try_from(lap_times.len()).unwrap_or(u32::MAX);
            gps_tracks.insert(index, points);
        }

        Ok(ParsedLaps {
            lap_times,
            gps_tracks,
        })
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&input[..input.len().min(HEAD_BYTES)]);
        if head.contains("RaceChrono") && head.contains("Format,3") {
            return true;
        }
        decode_text(input).lines().take(HEAD_LINES).any(|line| {
            let line = line.to_lowercase();
            line.contains("timestamp")
                && line.contains("lap_number")
                && line.contains("elapsed_time")
                && line.contains("latitude")
        })
    }
}
