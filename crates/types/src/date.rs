use std::fmt;

/// A day/month/year triple.
///
/// The fields are deliberately unvalidated: months are 1-based by convention, but no
/// range check or calendar normalisation is applied (day 31 in a 30-day month, or a
/// month of 17, are representable). The validity engine relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct CalendarDate {
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

impl CalendarDate {
    pub const fn new(day: i32, month: i32, year: i32) -> Self {
        Self { day, month, year }
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}
