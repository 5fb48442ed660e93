//! Error types for the schedule crate.

use std::fmt;

/// Errors from building an operating-hours policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The time zone name is not a known IANA zone.
    InvalidTimezone { timezone: String },
    /// The hour range is empty or outside a day.
    InvalidHours { start: u32, end: u32 },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimezone { timezone } => {
                write!(f, "invalid timezone: {timezone}")
            }
            Self::InvalidHours { start, end } => {
                write!(f, "invalid service hours: {start}..={end}")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_error_display() {
        let err = ScheduleError::InvalidTimezone {
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(err.to_string().contains("Mars/Olympus"));

        let err = ScheduleError::InvalidHours { start: 20, end: 8 };
        assert_eq!(err.to_string(), "invalid service hours: 20..=8");
    }
}
