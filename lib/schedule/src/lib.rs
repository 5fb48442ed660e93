//! Operating-hours policy.
//!
//! This crate provides:
//!
//! - **Service Hours**: Decides whether the relay answers at a given instant,
//!   evaluated in a configured IANA time zone

pub mod error;
pub mod hours;

pub use error::ScheduleError;
pub use hours::{ServiceHours, ServiceHoursConfig};
