use super::{split_csv_line, too_many_laps, LapParser};
use crate::error::Result;
use crate::laps::{decode_text, Device, ParsedLaps};

/// Placeholder time the ZiiX writes for laps it did not measure.
const EMPTY_LAP: &str = "0'00.000";

/// ZiiX lap timer export.
///
/// Layout: a `LAP,LAP TIME,...` header, a `BEST,...` summary row, then one
/// row per lap whose first column is the lap number and second column the
/// time as `M'SS.fff`.
#[derive(Debug, Clone)]
pub struct ZiixParser {
    max_laps: usize,
}

impl ZiixParser {
    /// Create a parser capped at `max_laps` data rows.
    #[must_use]
    pub const fn new(max_laps: usize) -> Self {
        Self { max_laps }
    }
}

impl LapParser for ZiixParser {
    fn device(&self) -> Device {
        Device::Ziix
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedLaps> {
        let text = decode_text(input);
        let mut laps = Vec::new();

        for (index, line) in text.lines().skip(2).enumerate() {
            if index >= self.max_laps {
                return Err(too_many_laps(self.max_laps));
            }
            let fields = split_csv_line(line);
            let lap_number = fields[0].as_str();
            if lap_number.is_empty() || !lap_number.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let Some(raw) = fields.get(1) else {
                continue;
            };
            if raw == EMPTY_LAP {
                continue;
            }
            laps.push(raw.replacen('\'', ":", 1));
        }

        Ok(ParsedLaps::from_times(laps))
    }
}
