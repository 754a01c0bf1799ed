//! Human-readable text blocks.
//!
//! Text travels in NUL-padded blocks of a fixed width known to both peers; the receiver
//! always reads the full width and keeps the text up to the first NUL. Text longer than
//! `width - 1` bytes is cut at a character boundary so a terminator always fits.
//!
//! The issuance greeting is the one block preceded by a byte count: a 4-byte little-endian
//! length followed by that many bytes.

use crate::framing::{read_exactly, read_vec, write_exactly};
use crate::{ProtocolError, ProtocolResult};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

pub const GATEWAY_WELCOME_LEN: usize = 108;
pub const GATEWAY_ACK_LEN: usize = 64;
pub const GATEWAY_OUTCOME_LEN: usize = 60;
pub const ISSUANCE_ACK_LEN: usize = 64;
pub const ISSUANCE_GREETING_LEN: usize = 1024;

pub const GATEWAY_WELCOME: &str =
    "Welcome to the green pass gateway. Send the 16-character health card id to verify.";
pub const GATEWAY_ACK: &str = "Health card id received, checking the green pass.";
pub const ISSUANCE_GREETING: &str =
    "Welcome to the green pass issuance service. Send name, surname and health card id.";

/// Pads `text` with NULs to `width` bytes.
pub fn encode_text(text: &str, width: usize) -> Vec<u8> {
    let mut end = text.len().min(width.saturating_sub(1));
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut block = vec![0u8; width];
    block[..end].copy_from_slice(&text.as_bytes()[..end]);
    block
}

/// Text up to the first NUL. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_text(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    String::from_utf8_lossy(&block[..end]).into_owned()
}

pub async fn write_text_block<W>(writer: &mut W, text: &str, width: usize) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_exactly(writer, &encode_text(text, width)).await
}

pub async fn read_text_block<R>(reader: &mut R, width: usize) -> ProtocolResult<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let block = read_vec(reader, width).await?;
    Ok(decode_text(&block))
}

/// Writes the length-prefixed issuance greeting.
pub async fn write_greeting<W>(writer: &mut W, text: &str) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = u32::try_from(ISSUANCE_GREETING_LEN)
        .map_err(|_| ProtocolError::InvalidField {
            field: "greeting length",
            reason: format!("{ISSUANCE_GREETING_LEN} does not fit in 4 bytes"),
        })?
        .to_le_bytes();
    write_exactly(writer, &header).await?;
    write_text_block(writer, text, ISSUANCE_GREETING_LEN).await
}

/// Reads the length-prefixed issuance greeting.
///
/// # Errors
///
/// Returns `ProtocolError::InvalidField` if the announced length exceeds
/// [`ISSUANCE_GREETING_LEN`].
pub async fn read_greeting<R>(reader: &mut R) -> ProtocolResult<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 4];
    read_exactly(reader, &mut header).await?;
    let len = u32::from_le_bytes(header) as usize;
    if len > ISSUANCE_GREETING_LEN {
        return Err(ProtocolError::InvalidField {
            field: "greeting length",
            reason: format!("{len} exceeds {ISSUANCE_GREETING_LEN} bytes"),
        });
    }
    read_text_block(reader, len).await
}

/// Outcome of a verification, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    Invalid,
    NotFound,
    /// The storage service could not be reached or failed.
    Unavailable,
}

impl VerificationOutcome {
    const ALL: [Self; 4] = [Self::Valid, Self::Invalid, Self::NotFound, Self::Unavailable];

    pub const fn message(self) -> &'static str {
        match self {
            Self::Valid => "The green pass is valid.",
            Self::Invalid => "The green pass is not valid.",
            Self::NotFound => "No green pass exists for this health card id.",
            Self::Unavailable => "The green pass could not be checked, try later.",
        }
    }

    /// Recognises a gateway outcome block.
    pub fn from_message(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.message() == text)
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a test-report submission, as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied,
    NotFound,
    /// The submission carried an invalid test-result flag.
    Rejected,
    Unavailable,
}

impl ReportOutcome {
    const ALL: [Self; 4] = [Self::Applied, Self::NotFound, Self::Rejected, Self::Unavailable];

    pub const fn message(self) -> &'static str {
        match self {
            Self::Applied => "Test report recorded, green pass updated.",
            Self::NotFound => "No green pass exists for this health card id.",
            Self::Rejected => "Test report rejected: invalid test result.",
            Self::Unavailable => "The test report could not be recorded, try later.",
        }
    }

    pub fn from_message(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.message() == text)
    }
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Sent by the gateway when the role byte is not recognised.
pub const GATEWAY_REJECTION: &str = "Request rejected: unknown request type.";

/// Outcome of an issuance, as acknowledged by the issuance service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceAck {
    /// The record was stored; carries the expiry date as printed.
    Issued { expires_on: String },
    InvalidId,
    InvalidName,
    Failed,
}

const ISSUED_PREFIX: &str = "Green pass issued, valid until ";

impl IssuanceAck {
    pub fn message(&self) -> String {
        match self {
            Self::Issued { expires_on } => format!("{ISSUED_PREFIX}{expires_on}."),
            Self::InvalidId => "Invalid health card id, green pass not issued.".to_string(),
            Self::InvalidName => "Invalid name or surname, green pass not issued.".to_string(),
            Self::Failed => "The green pass could not be stored, try later.".to_string(),
        }
    }

    pub fn from_message(text: &str) -> Option<Self> {
        if let Some(rest) = text.strip_prefix(ISSUED_PREFIX) {
            let expires_on = rest.strip_suffix('.').unwrap_or(rest).to_string();
            return Some(Self::Issued { expires_on });
        }
        [Self::InvalidId, Self::InvalidName, Self::Failed]
            .into_iter()
            .find(|ack| ack.message() == text)
    }

    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }
}

impl fmt::Display for IssuanceAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
