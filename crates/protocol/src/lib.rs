//! # Greenpass Protocol
//!
//! The wire protocol shared by the issuance service, the storage service and the gateway.
//!
//! Handles:
//! - Exact-byte-count transfer ([`framing`])
//! - Fixed-layout messages ([`messages`]) and the dispatch/status bytes that open and
//!   answer every exchange ([`dispatch`])
//! - Fixed-width text blocks sent to human-facing clients ([`text`])
//! - The storage service client used by the upstream services ([`client`])
//! - The accept loop and cooperative shutdown every service runs ([`server`])
//!
//! There is no length prefix, version field or authentication: peers agree on every layout
//! size up front.

#![warn(rust_2018_idioms)]

pub mod client;
pub mod dispatch;
mod error;
pub mod framing;
pub mod messages;
pub mod server;
pub mod text;

pub use client::StorageClient;
pub use dispatch::{GatewayRole, StorageRequest};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{FixedLayout, IdentitySubmission, TestReportSubmission};
pub use server::{
    serve, shutdown_channel, wait_for_signal, Connection, ConnectionHandler, ShutdownToken,
    ShutdownTrigger,
};
pub use text::{IssuanceAck, ReportOutcome, VerificationOutcome};
