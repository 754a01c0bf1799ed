//! # Greenpass Types
//!
//! Validated value types shared by every greenpass crate.
//!
//! - [`HealthCardId`]: the 16-character key of a certificate record
//! - [`CalendarDate`]: a day/month/year triple with no calendar normalisation
//! - [`TestResult`]: the test-result flag carried by a record
//! - [`CertificateRecord`]: the one durable entity of the system
//! - [`PersonName`]: a holder's name or surname, sized to its wire field
//!
//! The [`layout`] module holds the fixed byte layouts shared by the wire protocol and the
//! file-backed record store.

mod date;
mod health_card;
pub mod layout;
mod name;
mod record;

pub use date::CalendarDate;
pub use health_card::{HealthCardId, HEALTH_CARD_ID_LEN};
pub use name::PersonName;
pub use record::{CertificateRecord, TestResult};

/// Errors that can occur when constructing validated types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// A name or surname that is blank, too long for its field, or contains a NUL
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// The health-card id is not exactly 16 ASCII letters or digits
    #[error("Invalid health card id: {0}")]
    InvalidHealthCardId(String),

    /// A test-result flag byte other than `'0'` or `'1'`
    #[error("Invalid test result flag: {0:#04x}")]
    InvalidTestResult(u8),

    /// A fixed-layout buffer of the wrong size
    #[error("Invalid {what} layout: expected {expected} bytes, got {actual}")]
    InvalidLayout {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
