//! CF time-axis handling
//!
//! Time coordinates are stored as offsets from a reference instant, described
//! by a `units` attribute such as `"days since 2019-01-01 00:00:00"`. Only the
//! standard (proleptic Gregorian) calendar is supported.

use crate::errors::{MldError, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::fmt;

/// Name of the time dimension and coordinate variable
pub const TIME_DIM: &str = "time";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Step size of a CF time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Some(Self::Days),
            "hours" | "hour" | "hr" | "h" => Some(Self::Hours),
            "minutes" | "minute" | "min" => Some(Self::Minutes),
            "seconds" | "second" | "sec" | "s" => Some(Self::Seconds),
            _ => None,
        }
    }

    const fn millis(self) -> f64 {
        match self {
            Self::Days => 86_400_000.0,
            Self::Hours => 3_600_000.0,
            Self::Minutes => 60_000.0,
            Self::Seconds => 1_000.0,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }
}

/// Parsed `"<unit> since <reference>"` units string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
}

impl TimeUnits {
    pub fn new(unit: TimeUnit, reference: NaiveDateTime) -> Self {
        Self { unit, reference }
    }

    /// Parse a CF units attribute
    pub fn parse(units: &str) -> Result<Self> {
        let invalid = || MldError::InvalidTime {
            message: format!("unsupported time units '{}'", units),
        };

        let (unit, reference) = units.trim().split_once(" since ").ok_or_else(invalid)?;
        let unit = TimeUnit::parse(unit.trim()).ok_or_else(invalid)?;
        let reference = parse_timestamp(reference)?;

        Ok(Self { unit, reference })
    }

    /// Convert a stored offset into a timestamp, rounded to the millisecond
    pub fn decode(&self, value: f64) -> Result<NaiveDateTime> {
        if !value.is_finite() {
            return Err(MldError::InvalidTime {
                message: format!("non-finite time value {}", value),
            });
        }

        let millis = (value * self.unit.millis()).round() as i64;
        TimeDelta::try_milliseconds(millis)
            .and_then(|delta| self.reference.checked_add_signed(delta))
            .ok_or_else(|| MldError::InvalidTime {
                message: format!("time value {} overflows from {}", value, self.reference),
            })
    }

    /// Convert a timestamp into an offset in these units
    pub fn encode(&self, time: NaiveDateTime) -> f64 {
        let millis = time.signed_duration_since(self.reference).num_milliseconds();
        millis as f64 / self.unit.millis()
    }
}

impl Default for TimeUnits {
    fn default() -> Self {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self::new(TimeUnit::Days, epoch)
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.reference.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Parse a timestamp such as `2019-01-02`, `2019-01-02 06:00` or `2019-01-02T06:00:00Z`
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let trimmed = s.trim();
    let trimmed = trimmed
        .strip_suffix(" UTC")
        .or_else(|| trimmed.strip_suffix('Z'))
        .unwrap_or(trimmed)
        .trim();

    for format in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(t);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| MldError::InvalidTime {
            message: format!("cannot parse timestamp '{}'", s),
        })
}

/// Midnight of a calendar date
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}
