use std::collections::HashSet;

use super::{split_csv_line, LapParser};
use crate::error::{Error, Result};
use crate::laps::{decode_text, Device, LapTime, ParsedLaps};

/// Drogger GPS logger export.
///
/// Every sample row carries the current `Lap` number and the running
/// `LapTime` in milliseconds. The first row of each lap holds the time of
/// that lap, so only that row is read. Lap 0 is the out lap.
#[derive(Debug, Clone)]
pub struct DroggerParser {
    max_laps: usize,
}

impl DroggerParser {
    /// Create a parser that stops after `max_laps` laps.
    #[must_use]
    pub const fn new(max_laps: usize) -> Self {
        Self { max_laps }
    }
}

impl LapParser for DroggerParser {
    fn device(&self) -> Device {
        Device::Drogger
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedLaps> {
        let text = decode_text(input);
        let mut lines = text.lines();
        let Some(header) = lines.next() else {
            return Ok(ParsedLaps::default());
        };

        let columns: Vec<String> = split_csv_line(header)
            .into_iter()
            .map(|name| name.to_lowercase())
            .collect();
        let position = |name: &str| columns.iter().position(|column| column == name);
        let (Some(lap_column), Some(time_column)) = (position("lap"), position("laptime")) else {
            return Err(Error::lap_format(
                Device::Drogger.as_str(),
                "no 'Lap' or 'LapTime' column in header",
            ));
        };

        let mut seen = HashSet::new();
        let mut laps = Vec::new();
        for line in lines {
            if laps.len() >= self.max_laps {
                break;
            }
            let fields = split_csv_line(line);
            let Some(lap_number) = fields.get(lap_column).and_then(|f| f.parse::<i64>().ok())
            else {
                continue;
            };
            if lap_number < 1 || seen.contains(&lap_number) {
                continue;
            }
            let Some(millis) = fields.get(time_column).and_then(|f| f.parse::<i64>().ok()) else {
                continue;
            };
            if let Ok(millis) = u64::try_from(millis) {
                if millis > 0 {
                    laps.push(LapTime::from_millis(millis).to_string());
                }
            }
            seen.insert(lap_number);
        }

        Ok(ParsedLaps::from_times(laps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"Time,Lap,LapTime,Speed\n\
        0.0,0,0,10\n\
        0.1,0,100,12\n\
        1.0,1,83456,50\n\
        1.1,1,83500,51\n\
        2.0,2,0,55\n\
        2.1,2,81000,55\n\
        3.0,3,101878,60\n\
        bad,x,y,z\n\
        4.0,4,62005,60\n";

    #[test]
    fn test_first_row_per_lap() {
        let parsed = DroggerParser::new(100).parse(SAMPLE).unwrap();
        assert_eq!(parsed.lap_times, vec!["1:23.456", "1:41.878", "1:02.005"]);
    }

    #[test]
    fn test_header_is_case_insensitive() {
        let parsed = DroggerParser::new(100).parse(b"LAP,LAPTIME\n1,60000\n").unwrap();
        assert_eq!(parsed.lap_times, vec!["1:00.000"]);
    }

    #[test]
    fn test_missing_columns() {
        let err = DroggerParser::new(100).parse(b"Time,Speed\n1,2\n").unwrap_err();
        assert!(matches!(err, Error::LapFormat { device: "drogger", .. }));
        assert!(DroggerParser::new(100).parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_stops_at_limit() {
        let parsed = DroggerParser::new(2).parse(SAMPLE).unwrap();
        assert_eq!(parsed.lap_times.len(), 2);
    }
}
