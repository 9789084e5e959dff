//! Lap time values and their text forms.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A lap time with millisecond resolution.
///
/// Serializes as the normalized `M:SS.mmm` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LapTime {
    millis: u64,
}

impl LapTime {
    /// Build a lap time from whole milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Build a lap time from seconds, rounded to the nearest millisecond.
    ///
    /// Returns `None` for negative or non-finite input.
    #[must_use]
    pub fn from_secs_f64(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (seconds * 1000.0).round() as u64;
        Some(Self { millis })
    }

    /// Whole milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Seconds as a float, for charts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    /// Whether this is a usable, non-zero lap.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.millis > 0
    }

    /// Parse `M:SS.fff`, `SS.fff`, or the ZiiX style `M'SS.fff`.
    ///
    /// Fractions beyond milliseconds are rounded half up.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().replace('\'', ":");
        let mut parts = normalized.split(':');
        let first = parts.next()?;
        let millis = match (parts.next(), parts.next()) {
            (None, _) => parse_decimal_millis(first)?,
            (Some(seconds), None) => {
                let minutes: u64 = first.trim().parse().ok()?;
                minutes
                    .checked_mul(60_000)?
                    .checked_add(parse_decimal_millis(seconds)?)?
            }
            (Some(_), Some(_)) => return None,
        };
        Some(Self { millis })
    }

    /// Difference to a faster lap, zero when `faster` is not faster.
    #[must_use]
    pub const fn gap_to(&self, faster: Self) -> Self {
        Self {
            millis: self.millis.saturating_sub(faster.millis),
        }
    }

    /// Format as `S.mmm` seconds, used for gaps.
    #[must_use]
    pub fn seconds_string(&self) -> String {
        format!("{}.{:03}", self.millis / 1000, self.millis % 1000)
    }
}

/// Parse an unsigned decimal number of seconds into milliseconds.
fn parse_decimal_millis(text: &str) -> Option<u64> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let digits: Vec<u64> = fraction.bytes().map(|b| u64::from(b - b'0')).collect();
    let mut millis = digits
        .iter()
        .chain(std::iter::repeat(&0))
        .take(3)
        .fold(0, |acc, d| acc * 10 + d);
    if digits.get(3).is_some_and(|d| *d >= 5) {
        millis += 1;
    }
    whole.checked_mul(1000)?.checked_add(millis)
}

impl std::fmt::Display for LapTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let minutes = self.millis / 60_000;
        let seconds = (self.millis % 60_000) / 1000;
        let millis = self.millis % 1000;
        write!(f, "{minutes}:{seconds:02}.{millis:03}")
    }
}

impl std::str::FromStr for LapTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::validation("lap_time", format!("'{s}' is not a lap time")))
    }
}

impl Serialize for LapTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LapTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid lap time '{text}'")))
    }
}

fn lap_format_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+:)?\d+(\.\d+)?$").expect("lap time pattern is valid"))
}

/// Whether a parser produced a string in `M:SS.fff` or `SS.fff` form.
///
/// # Panics
///
/// Never in practice; the pattern is a compile-time constant.
#[must_use]
pub fn is_valid_lap_time_format(text: &str) -> bool {
    lap_format_regex().is_match(text)
}

/// English ordinal suffix for a rank: 1st, 2nd, 3rd, 4th, 11th, 21st.
#[must_use]
pub fn rank_suffix(rank: usize) -> &'static str {
    if rank == 0 {
        return "";
    }
    if (11..=13).contains(&(rank % 100)) {
        return "th";
    }
    match rank % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(LapTime::parse("1:41.878").unwrap().as_millis(), 101_878);
        assert_eq!(LapTime::parse("83.456").unwrap().as_millis(), 83_456);
        assert_eq!(LapTime::parse("0'41.878").unwrap().as_millis(), 41_878);
        assert_eq!(LapTime::parse("1:23").unwrap().as_millis(), 83_000);
        assert_eq!(LapTime::parse(" 2:05.5 ").unwrap().as_millis(), 125_500);
    }

    #[test]
    fn test_parse_rounds_sub_millisecond() {
        assert_eq!(LapTime::parse("1:00.0005").unwrap().as_millis(), 60_001);
        assert_eq!(LapTime::parse("1:00.0004").unwrap().as_millis(), 60_000);
        assert_eq!(LapTime::parse("59.9995").unwrap().as_millis(), 60_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(LapTime::parse("").is_none());
        assert!(LapTime::parse("abc").is_none());
        assert!(LapTime::parse("1:2:3").is_none());
        assert!(LapTime::parse("-1.5").is_none());
        assert!(LapTime::parse("1:xx").is_none());
        assert!(LapTime::parse(".").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(LapTime::from_millis(101_878).to_string(), "1:41.878");
        assert_eq!(LapTime::from_millis(5_007).to_string(), "0:05.007");
        assert_eq!(LapTime::from_millis(3_600_000).to_string(), "60:00.000");
    }

    #[test]
    fn test_seconds_round_trip() {
        for seconds in [0.001, 41.878, 59.999, 60.0, 101.5, 754.321] {
            let lap = LapTime::from_secs_f64(seconds).unwrap();
            let reparsed = LapTime::parse(&lap.to_string()).unwrap();
            assert!((reparsed.as_secs_f64() - seconds).abs() < 0.0005, "{seconds}");
        }
        assert!(LapTime::from_secs_f64(-1.0).is_none());
        assert!(LapTime::from_secs_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_gap_and_seconds_string() {
        let best = LapTime::from_millis(100_000);
        let lap = LapTime::from_millis(101_234);
        assert_eq!(lap.gap_to(best).seconds_string(), "1.234");
        assert_eq!(best.gap_to(lap), LapTime::default());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&vec![LapTime::from_millis(61_000)]).unwrap();
        assert_eq!(json, r#"["1:01.000"]"#);
        let back: Vec<LapTime> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].as_millis(), 61_000);
        assert!(serde_json::from_str::<LapTime>(r#""nope""#).is_err());
    }

    #[test]
    fn test_valid_format() {
        assert!(is_valid_lap_time_format("1:23.456"));
        assert!(is_valid_lap_time_format("83.456"));
        assert!(is_valid_lap_time_format("1:23"));
        assert!(is_valid_lap_time_format("83"));
        assert!(!is_valid_lap_time_format("0'41.878"));
        assert!(!is_valid_lap_time_format("1:23.4.5"));
        assert!(!is_valid_lap_time_format("lap 1"));
    }

    #[test]
    fn test_rank_suffix() {
        assert_eq!(rank_suffix(1), "st");
        assert_eq!(rank_suffix(2), "nd");
        assert_eq!(rank_suffix(3), "rd");
        assert_eq!(rank_suffix(4), "th");
        assert_eq!(rank_suffix(11), "th");
        assert_eq!(rank_suffix(12), "th");
        assert_eq!(rank_suffix(13), "th");
        assert_eq!(rank_suffix(21), "st");
        assert_eq!(rank_suffix(112), "th");
        assert_eq!(rank_suffix(0), "");
    }
}
