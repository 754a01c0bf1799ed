//! Dispatch and status bytes.
//!
//! Every exchange opens with one or two ASCII dispatch bytes naming the request kind; the set
//! of kinds is closed and anything else is rejected with [`ProtocolError::UnknownDispatch`].
//!
//! | Service  | Bytes        | Request |
//! |----------|--------------|---------|
//! | Storage  | `'1'`        | create (issuance path) |
//! | Storage  | `'0'` `'0'`  | apply test report (gateway path) |
//! | Storage  | `'0'` `'1'`  | fetch (gateway path) |
//! | Gateway  | `'0'`        | verification |
//! | Gateway  | `'1'`        | test-report submission |

use crate::framing::{read_byte, write_exactly};
use crate::{ProtocolError, ProtocolResult};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

const ISSUANCE_PATH: u8 = b'1';
const GATEWAY_PATH: u8 = b'0';
const APPLY_REPORT: u8 = b'0';
const FETCH: u8 = b'1';

/// Requests understood by the storage service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRequest {
    Create,
    ApplyReport,
    Fetch,
}

impl StorageRequest {
    /// The dispatch bytes that open this request.
    pub const fn prefix(self) -> &'static [u8] {
        match self {
            Self::Create => &[ISSUANCE_PATH],
            Self::ApplyReport => &[GATEWAY_PATH, APPLY_REPORT],
            Self::Fetch => &[GATEWAY_PATH, FETCH],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ApplyReport => "apply-report",
            Self::Fetch => "fetch",
        }
    }

    /// Reads the one or two dispatch bytes of a storage request.
    pub async fn read_from<R>(reader: &mut R) -> ProtocolResult<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match read_byte(reader).await? {
            ISSUANCE_PATH => Ok(Self::Create),
            GATEWAY_PATH => match read_byte(reader).await? {
                APPLY_REPORT => Ok(Self::ApplyReport),
                FETCH => Ok(Self::Fetch),
                other => Err(ProtocolError::UnknownDispatch(other)),
            },
            other => Err(ProtocolError::UnknownDispatch(other)),
        }
    }

    pub async fn write_to<W>(self, writer: &mut W) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        write_exactly(writer, self.prefix()).await
    }
}

impl fmt::Display for StorageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Roles accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRole {
    Verify,
    Report,
}

impl GatewayRole {
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Verify => b'0',
            Self::Report => b'1',
        }
    }

    pub fn from_byte(byte: u8) -> ProtocolResult<Self> {
        match byte {
            b'0' => Ok(Self::Verify),
            b'1' => Ok(Self::Report),
            other => Err(ProtocolError::UnknownDispatch(other)),
        }
    }
}

impl fmt::Display for GatewayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verify => f.write_str("verify"),
            Self::Report => f.write_str("report"),
        }
    }
}

/// Status bytes sent by the storage service.
pub mod status {
    /// Record written.
    pub const CREATED: u8 = b'0';
    /// Fetch: a record follows.
    pub const PRESENT: u8 = b'1';
    /// Fetch: no record for the id.
    pub const ABSENT: u8 = b'2';
    /// Test report applied.
    pub const APPLIED: u8 = b'0';
    /// Test report: no record for the id.
    pub const NOT_FOUND: u8 = b'1';
    /// The request could not be served.
    pub const REJECTED: u8 = b'E';
}
