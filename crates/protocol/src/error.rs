//! Protocol error types.
//!
//! Every variant is fatal to the connection it occurred on and to nothing else: the accept
//! loop logs the error and keeps serving.

use greenpass_store::StoreError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection before a fixed-size read completed.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// The connection stopped accepting bytes before a fixed-size write completed.
    #[error("short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    /// A role or request byte outside the closed set of dispatch kinds.
    #[error("unknown dispatch byte {0:#04x}")]
    UnknownDispatch(u8),

    /// A field of a fixed-layout message did not hold a valid value.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A status byte the caller did not expect at this point of the exchange.
    #[error("unexpected status byte {byte:#04x} in reply to {request}")]
    UnexpectedStatus { request: &'static str, byte: u8 },

    /// The storage service explicitly rejected the request.
    #[error("request rejected by the storage service: {request}")]
    Rejected { request: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
