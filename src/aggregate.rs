//! Monthly aggregation over snapshot readings
//!
//! Readings arrive unsorted. Every function here is total: readings with
//! missing or unparsable timestamps are skipped, missing statistics or cost
//! substructures contribute zero, and an empty input yields `0.0`.

use crate::logging::get_logger;
use crate::snapshot::Reading;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone};

/// Statistic label marking a single-rate contract
pub const LABEL_CONSO_BASE: &str = "CONSO_BASE";
/// Statistic label of the peak-hours rate
pub const LABEL_CONSO_HP: &str = "CONSO_HEURES_PLEINES";
/// Statistic label of the off-peak-hours rate
pub const LABEL_CONSO_HC: &str = "CONSO_HEURES_CREUSES";

/// Tariff structure inferred from reading statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffType {
    Base,
    Hphc,
    Unknown,
}

impl TariffType {
    pub fn from_label(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "BASE" => Self::Base,
            "HPHC" => Self::Hphc,
            _ => Self::Unknown,
        }
    }
}

/// Infer the tariff from the statistics of the last reading *as delivered*.
///
/// The list is not sorted first: if the API ever returns readings out of
/// order this looks at whichever reading happens to be last.
pub fn detect_tariff(readings: &[Reading]) -> TariffType {
    let Some(latest) = readings.last() else {
        return TariffType::Unknown;
    };
    let labels: Vec<&str> = latest
        .statistics()
        .iter()
        .filter_map(|s| s.label.as_deref())
        .collect();

    if labels.contains(&LABEL_CONSO_BASE) {
        TariffType::Base
    } else if labels.contains(&LABEL_CONSO_HP) && labels.contains(&LABEL_CONSO_HC) {
        TariffType::Hphc
    } else {
        TariffType::Unknown
    }
}

/// Parse an ISO-8601 timestamp, keeping its own wall-clock fields.
///
/// Accepts RFC 3339 with offset or `Z`, hour-only offsets, naive date-times,
/// and bare dates.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M%:z",
        // Offsets without minutes, e.g. `+01`
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M%#z",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.naive_local());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `YYYY-MM` of a reading start timestamp
pub fn reading_month(start_at: &str) -> Option<String> {
    parse_timestamp(start_at).map(|dt| format!("{:04}-{:02}", dt.year(), dt.month()))
}

/// `YYYY-MM` of the given instant in its own timezone
pub fn current_month<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let local = now.naive_local();
    format!("{:04}-{:02}", local.year(), local.month())
}

/// Convert an ISO-8601 timestamp to `YYYY-MM-DD`
pub fn convert_sensor_date(value: Option<&str>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    parse_timestamp(value).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Round to `precision` decimal places
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(15) as i32);
    (value * factor).round() / factor
}

fn readings_in_month<'a>(
    readings: &'a [Reading],
    month: &'a str,
) -> impl Iterator<Item = &'a Reading> + 'a {
    readings.iter().filter(move |reading| {
        let Some(start_at) = reading.start_at.as_deref().filter(|s| !s.is_empty()) else {
            return false;
        };
        match reading_month(start_at) {
            Some(m) => m == month,
            None => {
                get_logger("aggregate").debug(&format!("Date parsing error {}", start_at));
                false
            }
        }
    })
}

/// Sum matching statistics of readings that start in `month` (`YYYY-MM`).
///
/// With `as_cost` each matching statistic contributes its estimated cost
/// converted from cents; otherwise its consumption value in kWh.
pub fn aggregate(
    readings: &[Reading],
    target_labels: &[&str],
    as_cost: bool,
    month: &str,
    precision: Option<u32>,
) -> f64 {
    let mut total = 0.0;
    for reading in readings_in_month(readings, month) {
        for stat in reading.statistics() {
            let Some(label) = stat.label.as_deref() else {
                continue;
            };
            if !target_labels.contains(&label) {
                continue;
            }
            let contribution = if as_cost {
                stat.cost_incl_tax
                    .as_ref()
                    .and_then(|c| c.estimated_amount)
                    .map(|cents| cents / 100.0)
            } else {
                stat.value
            };
            total += contribution.unwrap_or(0.0);
        }
    }
    precision.map_or(total, |p| round_to(total, p))
}

/// Sum of gas reading values that start in `month`
pub fn gas_monthly_total(readings: &[Reading], month: &str, precision: Option<u32>) -> f64 {
    let total: f64 = readings_in_month(readings, month)
        .map(|r| r.value.unwrap_or(0.0))
        .sum();
    precision.map_or(total, |p| round_to(total, p))
}

/// Earliest/latest start timestamp and count of readings having one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    pub start: Option<String>,
    pub end: Option<String>,
    pub count: usize,
}

pub fn window_info(readings: &[Reading]) -> WindowInfo {
    let mut starts: Vec<&str> = readings
        .iter()
        .filter_map(|r| r.start_at.as_deref())
        .filter(|s| !s.is_empty())
        .collect();
    starts.sort_unstable();
    WindowInfo {
        start: starts.first().map(|s| s.to_string()),
        end: starts.last().map(|s| s.to_string()),
        count: starts.len(),
    }
}
