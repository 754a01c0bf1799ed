//! The certificate record and its test-result flag.

use crate::{CalendarDate, HealthCardId, TypesError};

/// Outcome of the most recent test report for a record.
///
/// On the wire and on disk the flag is a single ASCII byte: `'1'` valid, `'0'` invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    #[default]
    Valid,
    Invalid,
}

impl TestResult {
    pub const VALID_BYTE: u8 = b'1';
    pub const INVALID_BYTE: u8 = b'0';

    /// Decodes a flag byte.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidTestResult`] for any byte other than `'0'` or `'1'`.
    pub fn from_byte(byte: u8) -> Result<Self, TypesError> {
        match byte {
            Self::VALID_BYTE => Ok(Self::Valid),
            Self::INVALID_BYTE => Ok(Self::Invalid),
            other => Err(TypesError::InvalidTestResult(other)),
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Valid => Self::VALID_BYTE,
            Self::Invalid => Self::INVALID_BYTE,
        }
    }

    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

/// A persisted health pass.
///
/// One record exists per health-card id. Creation overwrites any earlier record for the
/// same id; afterwards only [`CertificateRecord::test_result`] is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CertificateRecord {
    pub health_card_id: HealthCardId,
    pub test_result: TestResult,
    pub issued_on: CalendarDate,
    pub expires_on: CalendarDate,
}

impl CertificateRecord {
    /// Creates a record with the default (valid) test result.
    pub fn new(health_card_id: HealthCardId, issued_on: CalendarDate, expires_on: CalendarDate) -> Self {
        Self {
            health_card_id,
            test_result: TestResult::default(),
            issued_on,
            expires_on,
        }
    }

    /// Returns a copy of this record carrying `test_result`.
    #[must_use]
    pub fn with_test_result(mut self, test_result: TestResult) -> Self {
        self.test_result = test_result;
        self
    }
}
