//! Selection of the simulated day from a WRF time coordinate
//!
//! WRF stores its times as strings such as `2016-07-01_00:00:00`. Each string is
//! reduced to a `YYYYMMDDHH` key, and the window starts at hour 00 of the run date.

use crate::errors::{InmapError, InmapResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Number of hourly steps in one simulated day
pub const STEPS_PER_DAY: usize = 24;

/// The day being converted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDate(NaiveDate);

impl RunDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDDHH` key for the given hour of this day
    pub fn key(&self, hour: u32) -> String {
        format!(
            "{:04}{:02}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day(),
            hour
        )
    }
}

impl FromStr for RunDate {
    type Err = InmapError;

    /// Parse `YYYYMMDD`, or `YYYYMMDDHH` where the hour is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = match s.len() {
            8 => s,
            10 => s
                .get(..8)
                .ok_or_else(|| InmapError::InvalidRunDate(s.to_string()))?,
            _ => return Err(InmapError::InvalidRunDate(s.to_string())),
        };
        NaiveDate::parse_from_str(digits, "%Y%m%d")
            .map(RunDate)
            .map_err(|_| InmapError::InvalidRunDate(s.to_string()))
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

/// How the end of the daily window is found
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindowConvention {
    /// Run through the step whose key is hour 23 of the run date, inclusive
    #[default]
    ThroughHour23,
    /// Always take exactly 24 steps from the start
    Fixed24,
}

impl FromStr for TimeWindowConvention {
    type Err = InmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour23" | "through_hour23" => Ok(TimeWindowConvention::ThroughHour23),
            "fixed24" => Ok(TimeWindowConvention::Fixed24),
            _ => Err(InmapError::Config(format!(
                "Unknown time window convention '{}'. Expected hour23 or fixed24",
                s
            ))),
        }
    }
}

/// Reduce a WRF time string to its `YYYYMMDDHH` key
///
/// Returns `None` for strings too short to hold a date and hour.
pub fn time_key(timestamp: &str) -> Option<String> {
    let t = timestamp.trim_end_matches(&['\0', ' '][..]);
    if t.len() < 13 || !t.is_ascii() {
        return None;
    }
    Some(format!("{}{}{}{}", &t[0..4], &t[5..7], &t[8..10], &t[11..13]))
}

/// Locate the daily window for `date` in a list of WRF time strings
///
/// The returned range always lies within `times`.
pub fn find_time_window(
    times: &[String],
    date: RunDate,
    convention: TimeWindowConvention,
) -> InmapResult<Range<usize>> {
    let keys: Vec<Option<String>> = times.iter().map(|t| time_key(t)).collect();
    let position = |key: &str| keys.iter().position(|k| k.as_deref() == Some(key));

    let start_key = date.key(0);
    let start = position(&start_key).ok_or(InmapError::RunDateNotFound(start_key))?;

    let end = match convention {
        TimeWindowConvention::ThroughHour23 => {
            let end_key = date.key(23);
            position(&end_key).ok_or(InmapError::RunDateNotFound(end_key))? + 1
        }
        TimeWindowConvention::Fixed24 => start + STEPS_PER_DAY,
    };

    if end > times.len() || end <= start {
        return Err(InmapError::TimeWindowOutOfRange {
            start,
            end,
            available: times.len(),
        });
    }
    Ok(start..end)
}
