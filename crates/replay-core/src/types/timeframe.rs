//! Timeframe definitions for bars and replay cadence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Fixed bar interval, stored in milliseconds.
///
/// Parsed from strings such as `"1m"`, `"15m"`, `"4h"`, `"1d"`, `"1w"`,
/// `"1M"` (30 days) and `"1y"` (365 days). Units are case sensitive only
/// for `m` (minute) versus `M` (month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    millis: i64,
}

impl Timeframe {
    /// One minute bars.
    pub const MINUTE_1: Timeframe = Timeframe { millis: MINUTE };
    /// Fifteen minute bars.
    pub const MINUTE_15: Timeframe = Timeframe { millis: 15 * MINUTE };
    /// One hour bars.
    pub const HOUR_1: Timeframe = Timeframe { millis: HOUR };
    /// Daily bars.
    pub const DAILY: Timeframe = Timeframe { millis: DAY };

    /// Create a timeframe from a positive millisecond duration.
    pub fn from_millis(millis: i64) -> Result<Self, DataError> {
        if millis <= 0 {
            return Err(DataError::InvalidTimeframe(format!(
                "duration must be positive, got {millis}ms"
            )));
        }
        Ok(Self { millis })
    }

    /// Duration in milliseconds.
    #[inline]
    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Duration in whole minutes (rounded down), as used in bar file names.
    pub fn as_minutes(&self) -> i64 {
        self.millis / MINUTE
    }

    /// How often a cadence-driven consumer should poll a window of this
    /// size: a thirtieth of the interval, capped at one second.
    pub fn poll_cadence_millis(&self) -> i64 {
        (self.millis / 30).clamp(1, SECOND)
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::MINUTE_1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [
            (YEAR, "y"),
            (MONTH, "M"),
            (WEEK, "w"),
            (DAY, "d"),
            (HOUR, "h"),
            (MINUTE, "m"),
            (SECOND, "s"),
        ];
        for (size, unit) in units {
            if self.millis % size == 0 {
                return write!(f, "{}{}", self.millis / size, unit);
            }
        }
        write!(f, "{}ms", self.millis)
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DataError::InvalidTimeframe(s.to_string());

        let (amount, unit) = match s.strip_suffix("ms") {
            Some(amount) => (amount, "ms"),
            None => {
                let split = s
                    .char_indices()
                    .last()
                    .map(|(idx, _)| idx)
                    .ok_or_else(invalid)?;
                s.split_at(split)
            }
        };

        let amount: i64 = amount.parse().map_err(|_| invalid())?;
        let unit_millis = match unit {
            "ms" => 1,
            "s" => SECOND,
            "m" => MINUTE,
            "h" | "H" => HOUR,
            "d" | "D" => DAY,
            "w" | "W" => WEEK,
            "M" => MONTH,
            "y" | "Y" => YEAR,
            _ => return Err(invalid()),
        };

        amount
            .checked_mul(unit_millis)
            .ok_or_else(invalid)
            .and_then(Timeframe::from_millis)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("1m".parse::<Timeframe>().unwrap().as_millis(), 60_000);
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::MINUTE_15);
        assert_eq!("4h".parse::<Timeframe>().unwrap().as_millis(), 4 * HOUR);
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::DAILY);
        assert_eq!("1M".parse::<Timeframe>().unwrap().as_millis(), MONTH);
        assert_eq!("250ms".parse::<Timeframe>().unwrap().as_millis(), 250);
    }

    #[test]
    fn test_timeframe_parse_rejects_garbage() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("m".parse::<Timeframe>().is_err());
        assert!("10x".parse::<Timeframe>().is_err());
        assert!("0m".parse::<Timeframe>().is_err());
        assert!("-5m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_display() {
        assert_eq!(Timeframe::MINUTE_1.to_string(), "1m");
        assert_eq!(Timeframe::HOUR_1.to_string(), "1h");
        assert_eq!(Timeframe::from_millis(90_000).unwrap().to_string(), "90s");
        assert_eq!(Timeframe::from_millis(1_500).unwrap().to_string(), "1500ms");
    }

    #[test]
    fn test_poll_cadence() {
        assert_eq!(Timeframe::MINUTE_1.poll_cadence_millis(), 1_000);
        assert_eq!(Timeframe::from_millis(3_000).unwrap().poll_cadence_millis(), 100);
        assert_eq!(Timeframe::from_millis(10).unwrap().poll_cadence_millis(), 1);
    }

    #[test]
    fn test_timeframe_serde() {
        let tf: Timeframe = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(tf, Timeframe::MINUTE_15);
        assert_eq!(serde_json::to_string(&tf).unwrap(), "\"15m\"");
    }
}
