//! # Gateway
//!
//! The single public endpoint of greenpass.
//!
//! Handles:
//! - Verification (`'0'`): welcome, read the id, acknowledge, fetch from the storage service,
//!   run the validity check and answer valid / not valid / not found
//! - Test-report submission (`'1'`): forward to the storage service and answer applied or
//!   not found
//! - An explicit rejection block for any other role byte
//!
//! The [`client`] module holds the caller side of both exchanges.

#![warn(rust_2018_idioms)]

pub use service::GatewayService;

pub mod client;
pub mod service;
