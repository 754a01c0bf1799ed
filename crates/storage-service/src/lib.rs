//! # Storage Service
//!
//! Network front of the greenpass record store.
//!
//! Handles:
//! - The issuance path (`'1'`): store a new certificate record
//! - The gateway path (`'0'`): fetch a record (`'1'`) or apply a test report (`'0'`)
//! - Explicit rejection (`'E'`) of unknown dispatch bytes and malformed requests
//!
//! Uses `greenpass_store` for persistence and `greenpass-protocol` for the wire format.

#![warn(rust_2018_idioms)]

pub use service::StorageService;

pub mod service;
