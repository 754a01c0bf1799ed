//! # Greenpass Core
//!
//! Core business logic for the greenpass services:
//! - Validity engine: issuance/expiry date arithmetic and the pass verdict
//! - Clock abstraction supplying "today" to the engine
//! - Startup configuration shared by every service binary
//!
//! **No transport or storage concerns**: sockets and wire layouts belong in
//! `greenpass-protocol`, persistence in `greenpass_store`.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod validity;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use error::{PassError, PassResult};
pub use validity::{ValidityEngine, ValidityRules, Verdict};

pub use greenpass_types::{CalendarDate, CertificateRecord, HealthCardId, PersonName, TestResult};
