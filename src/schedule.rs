//! Move schedule: how often the mover runs and which bandwidth limit applies
//! at a given time of day.
//!
//! The bandwidth timetable uses the storage client's notation: whitespace
//! separated `HH:MM,RATE` entries in ascending order, where `RATE` is a
//! rate such as `1M`, `512k`, `10M:1M` (upload:download) or `off`. A bare
//! rate with no time applies all day. Each window lasts until the next one
//! starts; the last window wraps past midnight into the first.

use std::fmt;
use std::time::Duration;

use chrono::NaiveTime;

use crate::error::ConfigError;

/// Rate limit in effect during one window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimit {
    /// No limit.
    Off,
    /// Limit passed verbatim to the move command.
    Limit(String),
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimit::Off => f.write_str("off"),
            RateLimit::Limit(rate) => f.write_str(rate),
        }
    }
}

/// One `(time-of-day, rate-limit)` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandwidthWindow {
    /// Time of day the window starts.
    pub start: NaiveTime,
    /// Limit applied from `start` until the next window.
    pub limit: RateLimit,
}

/// Immutable mover schedule, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleSpec {
    /// Pause between two move runs.
    pub period: Duration,
    /// Bandwidth timetable, sorted by start time. Empty means unlimited.
    pub windows: Vec<BandwidthWindow>,
}

impl ScheduleSpec {
    /// Builds a schedule from a period and a timetable in storage-client notation.
    pub fn new(period: Duration, timetable: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            period,
            windows: parse_windows(timetable)?,
        })
    }

    /// Returns the limit to apply at `now`, or `None` when unlimited.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use chrono::NaiveTime;
    /// use mountvisor::schedule::ScheduleSpec;
    ///
    /// let s = ScheduleSpec::new(Duration::from_secs(60), "07:00,1M 23:00,off").unwrap();
    /// let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    /// assert_eq!(s.limit_at(at(8, 0)), Some("1M"));
    /// assert_eq!(s.limit_at(at(23, 30)), None);
    /// ```
    pub fn limit_at(&self, now: NaiveTime) -> Option<&str> {
        let window = self
            .windows
            .iter()
            .rev()
            .find(|w| w.start <= now)
            .or_else(|| self.windows.last())?;
        match &window.limit {
            RateLimit::Off => None,
            RateLimit::Limit(rate) => Some(rate.as_str()),
        }
    }
}

/// Parses a bandwidth timetable into ordered windows.
pub fn parse_windows(timetable: &str) -> Result<Vec<BandwidthWindow>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSchedule {
        spec: timetable.to_string(),
        reason,
    };

    let entries: Vec<&str> = timetable.split_whitespace().collect();
    if let [single] = entries.as_slice() {
        if !single.contains(',') {
            if NaiveTime::parse_from_str(single, "%H:%M").is_ok() {
                return Err(invalid(format!("entry {single:?} has no rate")));
            }
            let limit = parse_rate(single).map_err(invalid)?;
            return Ok(vec![BandwidthWindow {
                start: NaiveTime::MIN,
                limit,
            }]);
        }
    }

    let mut windows: Vec<BandwidthWindow> = Vec::with_capacity(entries.len());
    for entry in entries {
        let (time, rate) = entry
            .split_once(',')
            .ok_or_else(|| invalid(format!("entry {entry:?} is not HH:MM,RATE")))?;
        let start = NaiveTime::parse_from_str(time, "%H:%M")
            .map_err(|e| invalid(format!("bad time {time:?}: {e}")))?;
        let limit = parse_rate(rate).map_err(invalid)?;

        if let Some(prev) = windows.last() {
            if start <= prev.start {
                return Err(invalid(format!(
                    "{time} does not come after {}",
                    prev.start.format("%H:%M")
                )));
            }
        }
        windows.push(BandwidthWindow { start, limit });
    }
    Ok(windows)
}

fn parse_rate(rate: &str) -> Result<RateLimit, String> {
    if rate.eq_ignore_ascii_case("off") {
        return Ok(RateLimit::Off);
    }
    let well_formed = rate.split(':').all(|part| {
        part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
    });
    if rate.is_empty() || !well_formed {
        return Err(format!("bad rate {rate:?}"));
    }
    Ok(RateLimit::Limit(rate.to_string()))
}
