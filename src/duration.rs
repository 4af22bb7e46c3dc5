//! Compact timespan tokens such as `"6h"` or `"90"`.
//!
//! A token is either a bare integer (seconds) or an integer followed by one
//! unit suffix: `s`, `m`, `h`, `d` or `w`.

use std::time::Duration;

use crate::error::ConfigError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(MINUTE),
        'h' => Some(HOUR),
        'd' => Some(DAY),
        'w' => Some(WEEK),
        _ => None,
    }
}

/// Parses a timespan token into a number of seconds.
///
/// # Example
/// ```
/// use mountvisor::duration::parse_seconds;
///
/// assert_eq!(parse_seconds("6h").unwrap(), 21_600);
/// assert_eq!(parse_seconds("45").unwrap(), 45);
/// assert!(parse_seconds("6x").is_err());
/// ```
pub fn parse_seconds(token: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        token: token.to_string(),
    };

    let (number, per_unit) = match token.chars().last() {
        Some(c) if c.is_ascii_digit() => (token, 1),
        Some(unit) => {
            let per_unit = unit_seconds(unit).ok_or_else(invalid)?;
            (&token[..token.len() - unit.len_utf8()], per_unit)
        }
        None => return Err(invalid()),
    };

    // `u64::from_str` tolerates a leading '+'; only plain digits are accepted.
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    number
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(per_unit))
        .ok_or_else(invalid)
}

/// Parses a timespan token into a [`Duration`].
pub fn parse_duration(token: &str) -> Result<Duration, ConfigError> {
    parse_seconds(token).map(Duration::from_secs)
}
