//! Wall-clock helpers.
//!
//! Timestamps throughout textfile-exporter are milliseconds since the Unix
//! epoch, the native unit of the Prometheus text format. Anything that needs
//! "now" takes it as a parameter; only the outermost loops call `now()`.

use chrono::Utc;
use std::error;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The current wall-clock time in milliseconds since the Unix epoch.
pub fn now() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a `Duration` into whole milliseconds, saturating at `i64::MAX`.
pub fn millis(dur: Duration) -> i64 {
    let ms = dur.as_millis();
    if ms > i64::max_value() as u128 {
        i64::max_value()
    } else {
        ms as i64
    }
}

/// Convert a `SystemTime` into milliseconds since the Unix epoch. Times
/// before the epoch are negative.
pub fn system_time_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(dur) => millis(dur),
        Err(e) => -millis(e.duration()),
    }
}

/// Error returned by `parse_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseDurationError {
    input: String,
}

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid duration {:?}, expected e.g. \"30s\", \"6h\" or \"1h30m\"",
            self.input
        )
    }
}

impl error::Error for ParseDurationError {}

/// Parse a human duration
///
/// Accepts one or more `<integer><unit>` groups where unit is one of `ms`,
/// `s`, `m`, `h` or `d`, for example `30s`, `25h` or `1h30m`. A bare integer
/// is taken to be seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let err = || ParseDurationError {
        input: input.to_string(),
    };
    let s = input.trim();
    if s.is_empty() {
        return Err(err());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let bytes = s.as_bytes();
    let mut total = Duration::from_secs(0);
    let mut idx = 0;
    while idx < bytes.len() {
        let start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if start == idx {
            return Err(err());
        }
        let amount: u64 = s[start..idx].parse().map_err(|_| err())?;
        let unit_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        let unit_ms: u64 = match &s[unit_start..idx] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return Err(err()),
        };
        let part = amount.checked_mul(unit_ms).ok_or_else(err)?;
        total = total
            .checked_add(Duration::from_millis(part))
            .ok_or_else(err)?;
    }
    Ok(total)
}
