//! Off-peak label parsing
//!
//! Supply points carry a compact schedule label such as
//! `"HC 00H30-06H30 14H30-16H30"`: a leading type tag followed by any number
//! of `HHhMM-HHhMM` ranges. Parsing never fails; malformed ranges are
//! skipped and an absent label yields an empty schedule.

use crate::logging::get_logger;
use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const MINUTES_PER_DAY: u32 = 24 * 60;

static TYPE_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^([A-Z]+)").ok());
static RANGE_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(\d+)H(\d+)-(\d+)H(\d+)").ok());

/// One daily off-peak interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Minute of day, 0..=1439
    pub start_minutes: u32,
    /// Minute of day, 0..=1439
    pub end_minutes: u32,
    pub duration_minutes: u32,
    pub duration_hours: f64,
    /// The interval wraps past midnight (also set when start == end)
    pub cross_midnight: bool,
}

impl TimeRange {
    fn from_parts(start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> Option<Self> {
        let start = NaiveTime::from_hms_opt(start_hour, start_min, 0)?;
        let end = NaiveTime::from_hms_opt(end_hour, end_min, 0)?;

        let start_minutes = start_hour * 60 + start_min;
        let end_minutes = end_hour * 60 + end_min;
        let cross_midnight = end_minutes <= start_minutes;
        let duration_minutes = if cross_midnight {
            (MINUTES_PER_DAY - start_minutes) + end_minutes
        } else {
            end_minutes - start_minutes
        };

        Some(Self {
            start,
            end,
            start_minutes,
            end_minutes,
            duration_minutes,
            duration_hours: round2(f64::from(duration_minutes) / 60.0),
            cross_midnight,
        })
    }

    /// `HH:MM` rendering of the start time
    pub fn start_label(&self) -> String {
        self.start.format("%H:%M").to_string()
    }

    /// `HH:MM` rendering of the end time
    pub fn end_label(&self) -> String {
        self.end.format("%H:%M").to_string()
    }

    /// Whether a minute of day falls inside `[start, end)`
    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.cross_midnight {
            minute_of_day >= self.start_minutes || minute_of_day < self.end_minutes
        } else {
            minute_of_day >= self.start_minutes && minute_of_day < self.end_minutes
        }
    }
}

/// Structured form of an off-peak label. Derived on demand, never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffPeakSchedule {
    /// Leading uppercase tag ("HC", "HP", ...)
    pub kind: Option<String>,
    /// Ranges in label order, not sorted by time
    pub ranges: Vec<TimeRange>,
    pub total_hours: f64,
    pub range_count: usize,
}

impl OffPeakSchedule {
    /// Parse a label. `None` or an empty label yields the empty schedule.
    pub fn parse(label: Option<&str>) -> Self {
        let Some(label) = label.filter(|l| !l.is_empty()) else {
            return Self::default();
        };
        let logger = get_logger("offpeak");

        let (Some(type_re), Some(range_re)) = (TYPE_PATTERN.as_ref(), RANGE_PATTERN.as_ref())
        else {
            logger.warn(&format!(
                "Failed to parse off-peak hours '{}': patterns unavailable",
                label
            ));
            return Self::default();
        };

        let kind = type_re
            .captures(label)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let mut ranges = Vec::new();
        for caps in range_re.captures_iter(label) {
            let parts: Option<Vec<u32>> = (1..=4)
                .map(|i| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok()))
                .collect();
            let range = parts.and_then(|p| TimeRange::from_parts(p[0], p[1], p[2], p[3]));
            match range {
                Some(r) => ranges.push(r),
                None => logger.warn(&format!(
                    "Failed to parse off-peak range '{}' in label '{}'",
                    caps.get(0).map_or("", |m| m.as_str()),
                    label
                )),
            }
        }

        let total_minutes: u32 = ranges.iter().map(|r| r.duration_minutes).sum();
        Self {
            kind,
            range_count: ranges.len(),
            total_hours: round2(f64::from(total_minutes) / 60.0),
            ranges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether the wall-clock time falls inside any range
    pub fn is_off_peak_at(&self, time: NaiveTime) -> bool {
        let minute = time.hour() * 60 + time.minute();
        self.ranges.iter().any(|r| r.contains(minute))
    }
}

/// Convenience wrapper over [`OffPeakSchedule::parse`]
pub fn parse_off_peak_hours(label: Option<&str>) -> OffPeakSchedule {
    OffPeakSchedule::parse(label)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
