//! # Issuance
//!
//! Issues green passes.
//!
//! Greets the caller with a length-prefixed text block, reads an identity submission,
//! computes the issuance and expiry dates with the validity engine and stores a new record
//! (test result valid) through the storage service. The caller always gets a 64-byte
//! acknowledgement: issued with the expiry date, invalid health card id, or storage failure.

#![warn(rust_2018_idioms)]

pub use service::IssuanceService;

pub mod client;
pub mod service;
