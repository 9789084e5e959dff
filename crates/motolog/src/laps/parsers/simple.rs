use super::{too_many_laps, LapParser};
use crate::error::Result;
use crate::laps::{decode_text, Device, ParsedLaps};

/// One lap time per line; blank lines are ignored.
#[derive(Debug, Clone)]
pub struct SimpleCsvParser {
    max_laps: usize,
}

impl SimpleCsvParser {
    /// Create a parser that rejects files with more than `max_laps` lines.
    #[must_use]
    pub const fn new(max_laps: usize) -> Self {
        Self { max_laps }
    }
}

impl LapParser for SimpleCsvParser {
    fn device(&self) -> Device {
        Device::SimpleCsv
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedLaps> {
        let text = decode_text(input);
        let mut laps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if index >= self.max_laps {
                return Err(too_many_laps(self.max_laps));
            }
            let lap = line.trim();
            if !lap.is_empty() {
                laps.push(lap.to_string());
            }
        }
        Ok(ParsedLaps::from_times(laps))
    }
}
