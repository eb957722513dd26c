//! # Scan Timestamp Parsing
//!
//! GOES ABI file names end with underscore-separated time tokens, e.g.
//! `OR_ABI-L2-LSTF-M6_G18_s20240151200210_e20240151209518_c20240151211332.nc`.
//! The scan time is taken from the last token: the 3-character extension is
//! stripped, the name is split on `_`, the last segment loses its one-letter
//! tag, and the leading `YYYYDDDHHMMSS` digits are decoded.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use thiserror::Error;

/// Number of digits in `YYYYDDDHHMMSS`
const STAMP_LEN: usize = 13;

/// Length of the `.nc` suffix removed before splitting
const SUFFIX_LEN: usize = 3;

/// Reasons a scan filename cannot be decoded into a timestamp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("'{0}' has no file name component")]
    NoFileName(String),

    #[error("'{name}' is too short: time token '{token}' needs at least {STAMP_LEN} digits after its tag")]
    TooShort { name: String, token: String },

    #[error("'{name}': field {field} ('{value}') is not numeric")]
    NotNumeric {
        name: String,
        field: &'static str,
        value: String,
    },

    #[error("'{name}': day-of-year {day} is not valid for year {year}")]
    DayOutOfRange { name: String, year: i32, day: u32 },

    #[error("'{name}': time {hour:02}:{minute:02}:{second:02} is out of range")]
    TimeOutOfRange {
        name: String,
        hour: u32,
        minute: u32,
        second: u32,
    },
}

/// Extracts the scan time encoded in a GOES file name or path.
///
/// # Examples
///
/// ```rust
/// use goes2json::timestamp::parse_scan_time;
/// use chrono::NaiveDate;
///
/// let t = parse_scan_time("OR_ABI-L2-LSTF-M6_G18_s2024015123045.nc")?;
/// let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(12, 30, 45).unwrap();
/// assert_eq!(t, expected);
/// # Ok::<(), goes2json::timestamp::TimestampError>(())
/// ```
pub fn parse_scan_time<P: AsRef<Path>>(path: P) -> Result<NaiveDateTime, TimestampError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TimestampError::NoFileName(path.display().to_string()))?;

    let too_short = || TimestampError::TooShort {
        name: name.to_string(),
        token: String::new(),
    };

    let stem_end = name
        .char_indices()
        .rev()
        .nth(SUFFIX_LEN - 1)
        .map(|(i, _)| i)
        .ok_or_else(too_short)?;
    let stem = &name[..stem_end];

    let token = stem.rsplit('_').next().unwrap_or(stem);
    let digits = token.get(1..).filter(|d| d.len() >= STAMP_LEN).ok_or_else(|| {
        TimestampError::TooShort {
            name: name.to_string(),
            token: token.to_string(),
        }
    })?;

    let year = field(name, digits, "year", 0, 4)? as i32;
    let day = field(name, digits, "day-of-year", 4, 7)?;
    let hour = field(name, digits, "hour", 7, 9)?;
    let minute = field(name, digits, "minute", 9, 11)?;
    let second = field(name, digits, "second", 11, 13)?;

    let date = NaiveDate::from_yo_opt(year, day).ok_or_else(|| TimestampError::DayOutOfRange {
        name: name.to_string(),
        year,
        day,
    })?;

    date.and_hms_opt(hour, minute, second)
        .ok_or_else(|| TimestampError::TimeOutOfRange {
            name: name.to_string(),
            hour,
            minute,
            second,
        })
}

fn field(
    name: &str,
    digits: &str,
    label: &'static str,
    start: usize,
    end: usize,
) -> Result<u32, TimestampError> {
    let not_numeric = || TimestampError::NotNumeric {
        name: name.to_string(),
        field: label,
        value: digits.get(start..end).unwrap_or_default().to_string(),
    };

    let slice = digits.get(start..end).ok_or_else(not_numeric)?;
    if !slice.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_numeric());
    }
    slice.parse::<u32>().map_err(|_| not_numeric())
}
