//! Service hours: weekdays, within an inclusive hour range, in one time zone.

use crate::error::ScheduleError;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;

/// Operating-hours configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceHoursConfig {
    /// Disables the gate entirely, e.g. for local development.
    #[serde(default)]
    pub bypass: bool,

    /// First hour of the day (local time) the relay answers.
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,

    /// Last hour of the day (local time) the relay answers. The whole hour is
    /// included, so `19` means until 19:59.
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
}

fn default_start_hour() -> u32 {
    8
}

fn default_end_hour() -> u32 {
    19
}

impl Default for ServiceHoursConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
        }
    }
}

/// The operating-hours policy. A pure function of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHours {
    timezone: Tz,
    start_hour: u32,
    end_hour: u32,
    bypass: bool,
}

impl ServiceHours {
    /// Creates a policy for the named IANA time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone is unknown or the hour range is empty or
    /// does not fit in a day.
    pub fn new(timezone: &str, start_hour: u32, end_hour: u32) -> Result<Self, ScheduleError> {
        let timezone = timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| ScheduleError::InvalidTimezone {
                timezone: timezone.to_string(),
            })?;

        if start_hour > end_hour || end_hour > 23 {
            return Err(ScheduleError::InvalidHours {
                start: start_hour,
                end: end_hour,
            });
        }

        Ok(Self {
            timezone,
            start_hour,
            end_hour,
            bypass: false,
        })
    }

    /// Creates a policy from configuration.
    ///
    /// # Errors
    ///
    /// See [`ServiceHours::new`].
    pub fn from_config(timezone: &str, config: &ServiceHoursConfig) -> Result<Self, ScheduleError> {
        Ok(Self::new(timezone, config.start_hour, config.end_hour)?.with_bypass(config.bypass))
    }

    /// Enables or disables the bypass.
    #[must_use]
    pub fn with_bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    /// Returns the configured time zone.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Converts an instant to local time in the configured zone.
    #[must_use]
    pub fn local_time(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Returns true when the relay should answer at `now`.
    #[must_use]
    pub fn is_within_service_hours(&self, now: DateTime<Utc>) -> bool {
        if self.bypass {
            return true;
        }

        let local = self.local_time(now);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        (self.start_hour..=self.end_hour).contains(&local.hour())
    }
}
