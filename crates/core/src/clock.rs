//! Sources of "today" for the validity engine.

use chrono::{Datelike, Local};
use greenpass_types::CalendarDate;

/// Supplies the current calendar date.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn today(&self) -> CalendarDate;
}

/// The host's local date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> CalendarDate {
        let now = Local::now().date_naive();
        // day() and month() are at most 31 and 12
        CalendarDate::new(now.day() as i32, now.month() as i32, now.year())
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub CalendarDate);

impl Clock for FixedClock {
    fn today(&self) -> CalendarDate {
        self.0
    }
}
