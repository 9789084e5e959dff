use super::{split_csv_line, too_many_laps, LapParser};
use crate::error::Result;
use crate::laps::{decode_text, Device, ParsedLaps};

const LAP_TIME_COLUMN: usize = 5;

/// MYLAPS transponder export.
///
/// The lap time sits in the sixth column. Rows without a `:` there
/// (headers, blanks) are skipped and `H:M:S.f` times are folded into
/// minutes.
#[derive(Debug, Clone)]
pub struct MylapsParser {
    max_laps: usize,
}

impl MylapsParser {
    /// Create a parser capped at `max_laps` rows.
    #[must_use]
    pub const fn new(max_laps: usize) -> Self {
        Self { max_laps }
    }
}

fn fold_hours(time: &str) -> Option<String> {
    let parts: Vec<&str> = time.split(':').collect();
    match parts.as_slice() {
        [hours, minutes, seconds] => {
            let hours: u64 = hours.parse().ok()?;
            let minutes: u64 = minutes.parse().ok()?;
            Some(format!("{}:{seconds}", hours * 60 + minutes))
        }
        _ => Some(time.to_string()),
    }
}

impl LapParser for MylapsParser {
    fn device(&self) -> Device {
        Device::Mylaps
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedLaps> {
        let text = decode_text(input);
        let mut laps = Vec::new();

        for (index, line) in text.lines().enumerate() {
            if index >= self.max_laps {
                return Err(too_many_laps(self.max_laps));
            }
            let fields = split_csv_line(line);
            let Some(time) = fields.get(LAP_TIME_COLUMN) else {
                continue;
            };
            if !time.contains(':') {
                continue;
            }
            if let Some(normalized) = fold_hours(time) {
                laps.push(normalized);
            }
        }

        Ok(ParsedLaps::from_times(laps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sixth_column() {
        let input = b"Pos,Name,No,Class,Lap,Lap Time,Diff\n\
            1,Rider,7,ST600,1,1:45.321,\n\
            1,Rider,7,ST600,2,0:01:44.900,\n\
            1,Rider,7,ST600,3,pit,\n\
            short,row\n";
        let parsed = MylapsParser::new(100).parse(input).unwrap();
        assert_eq!(parsed.lap_times, vec!["1:45.321", "1:44.900"]);
    }

    #[test]
    fn test_fold_hours() {
        assert_eq!(fold_hours("1:02:03.5").as_deref(), Some("62:03.5"));
        assert_eq!(fold_hours("2:03.5").as_deref(), Some("2:03.5"));
        assert_eq!(fold_hours("x:02:03.5"), None);
    }

    #[test]
    fn test_limit_counts_every_row() {
        let input = b"a\nb\nc\n";
        assert!(MylapsParser::new(2).parse(input).is_err());
    }
}
