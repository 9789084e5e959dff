//! Lap statistics for display and comparison.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::time::{rank_suffix, LapTime};
use crate::error::{Error, Result};

/// Order of [`LapStats::details`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapSort {
    /// As recorded.
    #[default]
    RecordAsc,
    /// Fastest first.
    TimeAsc,
    /// Slowest first.
    TimeDesc,
}

impl std::str::FromStr for LapSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "record_asc" => Ok(Self::RecordAsc),
            "time_asc" => Ok(Self::TimeAsc),
            "time_desc" => Ok(Self::TimeDesc),
            other => Err(Error::validation("sort", format!("unknown lap order '{other}'"))),
        }
    }
}

/// One row of the lap table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapDetail {
    /// 1-based position in the recorded list.
    pub lap_num: usize,
    /// The lap time.
    pub time: LapTime,
    /// `+D.DDD (Nth)` relative to the best lap, empty for the best lap.
    pub gap: String,
    /// Whether this equals the best lap.
    pub is_best: bool,
}

/// Best, average and per-lap breakdown of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapStats {
    /// Fastest lap.
    pub best: LapTime,
    /// Mean of the counted laps, rounded to the millisecond.
    pub average: LapTime,
    /// Counted laps in the requested order.
    pub details: Vec<LapDetail>,
}

fn mean(laps: &[LapTime]) -> Option<LapTime> {
    if laps.is_empty() {
        return None;
    }
    let total: u64 = laps.iter().map(LapTime::as_millis).sum();
    let count = laps.len() as u64;
    Some(LapTime::from_millis((total + count / 2) / count))
}

/// Statistics over lap times given as text.
///
/// Unparseable and zero laps are skipped but keep their recorded number.
/// Returns `None` when nothing usable remains.
#[must_use]
pub fn lap_stats<S: AsRef<str>>(lap_times: &[S], sort: LapSort) -> Option<LapStats> {
    let counted: Vec<(usize, LapTime)> = lap_times
        .iter()
        .enumerate()
        .filter_map(|(index, text)| {
            LapTime::parse(text.as_ref())
                .filter(LapTime::is_positive)
                .map(|lap| (index + 1, lap))
        })
        .collect();

    let times: Vec<LapTime> = counted.iter().map(|(_, lap)| *lap).collect();
    let best = times.iter().min().copied()?;
    let average = mean(&times)?;

    let mut ranked = counted.clone();
    ranked.sort_by_key(|(lap_num, lap)| (*lap, *lap_num));

    let mut details: Vec<LapDetail> = counted
        .iter()
        .map(|&(lap_num, time)| {
            let is_best = time == best;
            let gap = if is_best {
                String::new()
            } else {
                let rank = ranked
                    .iter()
                    .position(|(num, _)| *num == lap_num)
                    .map_or(0, |position| position + 1);
                format!(
                    "+{} ({rank}{})",
                    time.gap_to(best).seconds_string(),
                    rank_suffix(rank)
                )
            };
            LapDetail {
                lap_num,
                time,
                gap,
                is_best,
            }
        })
        .collect();

    match sort {
        LapSort::RecordAsc => {}
        LapSort::TimeAsc => details.sort_by_key(|detail| detail.time),
        LapSort::TimeDesc => details.sort_by_key(|detail| Reverse(detail.time)),
    }

    Some(LapStats {
        best,
        average,
        details,
    })
}

/// Fastest positive lap.
#[must_use]
pub fn best_lap(lap_times: &[LapTime]) -> Option<LapTime> {
    lap_times.iter().copied().filter(LapTime::is_positive).min()
}

#[allow(clippy::cast_precision_loss)]
fn median_millis(laps: &[LapTime]) -> Option<f64> {
    let mut millis: Vec<u64> = laps.iter().map(LapTime::as_millis).collect();
    millis.sort_unstable();
    let mid = millis.len() / 2;
    match millis.len() {
        0 => None,
        len if len % 2 == 1 => Some(millis[mid] as f64),
        _ => Some((millis[mid - 1] + millis[mid]) as f64 / 2.0),
    }
}

/// Drop laps slower than `multiplier` times the median lap.
///
/// Zero laps are always dropped. With fewer than three positive laps there
/// is no meaningful median and every positive lap is kept.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn filter_outlier_laps(lap_times: &[LapTime], multiplier: f64) -> Vec<LapTime> {
    let positive: Vec<LapTime> = lap_times
        .iter()
        .copied()
        .filter(LapTime::is_positive)
        .collect();
    if positive.len() < 3 {
        return positive;
    }
    let Some(median) = median_millis(&positive) else {
        return Vec::new();
    };
    let threshold = median * multiplier;

    positive
        .into_iter()
        .filter(|lap| lap.as_millis() as f64 <= threshold)
        .collect()
}

/// One session's line in a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionComparison {
    /// Session label.
    pub name: String,
    /// Fastest lap, if any.
    pub best: Option<LapTime>,
    /// Mean lap, if any.
    pub average: Option<LapTime>,
    /// `+S.mmm` behind the fastest best lap, empty for the leader.
    pub best_gap: String,
    /// `+S.mmm` behind the fastest average, empty for the leader.
    pub average_gap: String,
}

fn gap_string(value: Option<LapTime>, leader: Option<LapTime>) -> String {
    match (value, leader) {
        (Some(value), Some(leader)) if value > leader => {
            format!("+{}", value.gap_to(leader).seconds_string())
        }
        _ => String::new(),
    }
}

/// Compare sessions by best and average lap.
///
/// # Errors
///
/// Returns [`Error::Validation`] when fewer than two sessions are given.
pub fn compare_sessions(sessions: &[(String, Vec<LapTime>)]) -> Result<Vec<SessionComparison>> {
    if sessions.len() < 2 {
        return Err(Error::validation(
            "sessions",
            "select at least two sessions to compare",
        ));
    }

    let summaries: Vec<(String, Option<LapTime>, Option<LapTime>)> = sessions
        .iter()
        .map(|(name, laps)| {
            let positive: Vec<LapTime> =
                laps.iter().copied().filter(LapTime::is_positive).collect();
            (name.clone(), best_lap(&positive), mean(&positive))
        })
        .collect();

    let fastest_best = summaries.iter().filter_map(|(_, best, _)| *best).min();
    let fastest_average = summaries.iter().filter_map(|(_, _, avg)| *avg).min();

    Ok(summaries
        .into_iter()
        .map(|(name, best, average)| SessionComparison {
            best_gap: gap_string(best, fastest_best),
            average_gap: gap_string(average, fastest_average),
            name,
            best,
            average,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laps(millis: &[u64]) -> Vec<LapTime> {
        millis.iter().copied().map(LapTime::from_millis).collect()
    }

    #[test]
    fn test_lap_stats_record_order() {
        let stats = lap_stats(&["1:42.000", "1:40.500", "bad", "0:00.000", "1:41.000"], LapSort::RecordAsc)
            .unwrap();
        assert_eq!(stats.best.to_string(), "1:40.500");
        // (102000 + 100500 + 101000) / 3 = 101166.67
        assert_eq!(stats.average.as_millis(), 101_167);

        let nums: Vec<usize> = stats.details.iter().map(|d| d.lap_num).collect();
        assert_eq!(nums, vec![1, 2, 5]);
        assert_eq!(stats.details[0].gap, "+1.500 (3rd)");
        assert_eq!(stats.details[1].gap, "");
        assert!(stats.details[1].is_best);
        assert_eq!(stats.details[2].gap, "+0.500 (2nd)");
    }

    #[test]
    fn test_lap_stats_sorting() {
        let input = ["1:42.000", "1:40.500", "1:41.000"];
        let asc = lap_stats(&input, LapSort::TimeAsc).unwrap();
        let nums: Vec<usize> = asc.details.iter().map(|d| d.lap_num).collect();
        assert_eq!(nums, vec![2, 3, 1]);

        let desc = lap_stats(&input, LapSort::TimeDesc).unwrap();
        let nums: Vec<usize> = desc.details.iter().map(|d| d.lap_num).collect();
        assert_eq!(nums, vec![1, 3, 2]);
    }

    #[test]
    fn test_lap_stats_empty() {
        assert!(lap_stats::<&str>(&[], LapSort::RecordAsc).is_none());
        assert!(lap_stats(&["x", "0"], LapSort::RecordAsc).is_none());
    }

    #[test]
    fn test_lap_sort_from_str() {
        assert_eq!("time_desc".parse::<LapSort>().unwrap(), LapSort::TimeDesc);
        assert!("fastest".parse::<LapSort>().is_err());
    }

    #[test]
    fn test_best_lap_ignores_zero() {
        assert_eq!(best_lap(&laps(&[0, 61_000, 60_500])), Some(LapTime::from_millis(60_500)));
        assert_eq!(best_lap(&laps(&[0])), None);
        assert_eq!(best_lap(&[]), None);
    }

    #[test]
    fn test_filter_keeps_small_sets() {
        let two = laps(&[60_000, 500_000]);
        assert_eq!(filter_outlier_laps(&two, 2.0), two);
    }

    #[test]
    fn test_filter_counts_only_positive_laps() {
        // Two real laps plus a zero: no median, so both real laps survive
        let input = laps(&[0, 60_000, 200_000]);
        assert_eq!(filter_outlier_laps(&input, 1.5), laps(&[60_000, 200_000]));
    }

    #[test]
    fn test_filter_removes_slow_laps() {
        let input = laps(&[60_000, 61_000, 200_000, 62_000]);
        // median 61_500, threshold 123_000
        assert_eq!(filter_outlier_laps(&input, 2.0), laps(&[60_000, 61_000, 62_000]));
        assert_eq!(filter_outlier_laps(&input, 4.0), input);
    }

    #[test]
    fn test_filter_keeps_lap_at_threshold() {
        let input = laps(&[50_000, 50_000, 100_000]);
        assert_eq!(filter_outlier_laps(&input, 2.0), input);
    }

    #[test]
    fn test_compare_sessions() {
        let sessions = vec![
            ("Sport 1".to_string(), laps(&[62_000, 61_000])),
            ("Sport 2".to_string(), laps(&[60_000, 64_000])),
            ("Empty".to_string(), Vec::new()),
        ];
        let result = compare_sessions(&sessions).unwrap();
        assert_eq!(result[0].best_gap, "+1.000");
        assert_eq!(result[0].average_gap, "");
        assert_eq!(result[1].best_gap, "");
        assert_eq!(result[1].average_gap, "+0.500");
        assert_eq!(result[2].best, None);
        assert_eq!(result[2].best_gap, "");

        assert!(compare_sessions(&sessions[..1]).is_err());
    }
}
