//! Validity engine: issuance/expiry date arithmetic and the pass verdict.
//!
//! Everything in this module is pure. "Today" is always supplied by the caller (see
//! [`crate::clock`]), so results are deterministic.
//!
//! # Rule sets
//!
//! Two rule sets exist and are selected explicitly through [`ValidityRules`]:
//!
//! - [`ValidityRules::Legacy`] (default) reproduces the deployed arithmetic exactly:
//!   - expiry month is `month + 4`, with raw values 13..=16 wrapped into the next year
//!     and any other raw value passed through unchanged;
//!   - the day is never re-normalised for the destination month;
//!   - the verdict compares year, then month, then day *field by field* against the
//!     expiry date, each comparison on its own. A pass expiring on 10/01/2024 is
//!     therefore judged invalid on 20/09/2023 because `9 > 1`.
//! - [`ValidityRules::Calendar`] is the corrected behaviour: four calendar months with
//!   the day clamped to the destination month, and a chronological comparison.

use crate::constants::PASS_VALIDITY_MONTHS;
use crate::{PassError, PassResult};
use chrono::{Months, NaiveDate};
use greenpass_types::{CalendarDate, CertificateRecord, TestResult};
use std::{fmt, str::FromStr};

/// Result of checking a certificate record against a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Which date arithmetic and comparison the engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidityRules {
    #[default]
    Legacy,
    Calendar,
}

impl fmt::Display for ValidityRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Calendar => f.write_str("calendar"),
        }
    }
}

impl FromStr for ValidityRules {
    type Err = PassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "calendar" => Ok(Self::Calendar),
            other => Err(PassError::InvalidInput(format!(
                "unknown validity rules '{other}' (expected 'legacy' or 'calendar')"
            ))),
        }
    }
}

/// Issuance date for a pass issued on `today`.
///
/// Day, month and year are copied verbatim.
pub fn compute_issuance(today: CalendarDate) -> CalendarDate {
    today
}

/// Expiry date for a pass issued on `today`, using the legacy arithmetic.
pub fn compute_expiry(today: CalendarDate) -> CalendarDate {
    let raw_month = today.month + PASS_VALIDITY_MONTHS;

    // Only these four raw values roll over; anything else is kept as-is.
    let (month, year) = match raw_month {
        13..=16 => (raw_month - 12, today.year + 1),
        _ => (raw_month, today.year),
    };

    CalendarDate::new(today.day, month, year)
}

/// Legacy verdict: sequential field-wise comparison, then the test result.
pub fn is_valid(today: CalendarDate, record: &CertificateRecord) -> Verdict {
    let expiry = record.expires_on;

    if today.year > expiry.year {
        return Verdict::Invalid;
    }
    if today.month > expiry.month {
        return Verdict::Invalid;
    }
    if today.day > expiry.day {
        return Verdict::Invalid;
    }
    verdict_from_test_result(record.test_result)
}

/// Expiry date four calendar months after `today`, day clamped to the month's length.
pub fn compute_calendar_expiry(today: CalendarDate) -> CalendarDate {
    let zero_based = today.month - 1 + PASS_VALIDITY_MONTHS;
    let year = today.year + zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) + 1;

    let day = match days_in_month(year, month) {
        Some(last) if today.day > last => last,
        _ => today.day,
    };

    CalendarDate::new(day, month, year)
}

/// Calendar verdict: chronological comparison against the expiry date, then the test result.
pub fn is_valid_calendar(today: CalendarDate, record: &CertificateRecord) -> Verdict {
    let expiry = record.expires_on;
    if (today.year, today.month, today.day) > (expiry.year, expiry.month, expiry.day) {
        return Verdict::Invalid;
    }
    verdict_from_test_result(record.test_result)
}

fn verdict_from_test_result(test_result: TestResult) -> Verdict {
    match test_result {
        TestResult::Valid => Verdict::Valid,
        TestResult::Invalid => Verdict::Invalid,
    }
}

fn days_in_month(year: i32, month: i32) -> Option<i32> {
    let month = u32::try_from(month).ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    i32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Validity engine bound to one rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityEngine {
    rules: ValidityRules,
}

impl ValidityEngine {
    pub const fn new(rules: ValidityRules) -> Self {
        Self { rules }
    }

    pub const fn rules(&self) -> ValidityRules {
        self.rules
    }

    pub fn issuance(&self, today: CalendarDate) -> CalendarDate {
        compute_issuance(today)
    }

    pub fn expiry(&self, today: CalendarDate) -> CalendarDate {
        match self.rules {
            ValidityRules::Legacy => compute_expiry(today),
            ValidityRules::Calendar => compute_calendar_expiry(today),
        }
    }

    pub fn verdict(&self, today: CalendarDate, record: &CertificateRecord) -> Verdict {
        match self.rules {
            ValidityRules::Legacy => is_valid(today, record),
            ValidityRules::Calendar => is_valid_calendar(today, record),
        }
    }
}

/// Parse the validity rules from an optional configuration value.
///
/// `None` or a blank value selects [`ValidityRules::Legacy`].
pub fn validity_rules_from_env_value(value: Option<String>) -> PassResult<ValidityRules> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<ValidityRules>())
        .transpose()
        .map(Option::unwrap_or_default)
}
