//! Fixed-layout messages.
//!
//! ```text
//! IdentitySubmission (2065 bytes)
//!      0  1024  name, NUL-padded
//!   1024  1024  surname, NUL-padded
//!   2048    17  health card id
//!
//! TestReportSubmission (18 bytes)
//!      0    17  health card id
//!     17     1  test result flag
//! ```
//!
//! The [`CertificateRecord`] layout is defined in [`greenpass_types::layout`] because the
//! file-backed store writes the same bytes to disk.

use crate::framing::{read_vec, write_exactly};
use crate::text::{decode_text, encode_text};
use crate::{ProtocolError, ProtocolResult};
use greenpass_types::layout::{
    decode_health_card_id, encode_health_card_id, CERTIFICATE_RECORD_LEN,
    HEALTH_CARD_ID_FIELD_LEN,
};
use greenpass_types::{CertificateRecord, HealthCardId, PersonName, TestResult};
use tokio::io::{AsyncRead, AsyncWrite};

/// Field name reported when a health-card id does not validate.
pub const FIELD_HEALTH_CARD_ID: &str = "health card id";
/// Field name reported when a test-result flag does not validate.
pub const FIELD_TEST_RESULT: &str = "test result";
pub const FIELD_NAME: &str = "name";
pub const FIELD_SURNAME: &str = "surname";

/// Width of a name or surname field.
pub const NAME_FIELD_LEN: usize = 1024;
pub const IDENTITY_SUBMISSION_LEN: usize = 2 * NAME_FIELD_LEN + HEALTH_CARD_ID_FIELD_LEN;
pub const TEST_REPORT_SUBMISSION_LEN: usize = HEALTH_CARD_ID_FIELD_LEN + 1;

/// A message with a fixed byte layout agreed by both peers.
pub trait FixedLayout: Sized {
    /// Encoded size in bytes.
    const LEN: usize;

    fn encode(&self) -> Vec<u8>;

    /// Decodes a buffer of exactly [`Self::LEN`] bytes.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self>;
}

/// Reads one fixed-layout message. All `T::LEN` bytes are consumed even if decoding fails.
pub async fn read_message<T, R>(reader: &mut R) -> ProtocolResult<T>
where
    T: FixedLayout,
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = read_vec(reader, T::LEN).await?;
    T::decode(&bytes)
}

pub async fn write_message<T, W>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    T: FixedLayout,
    W: AsyncWrite + Unpin + ?Sized,
{
    write_exactly(writer, &message.encode()).await
}

/// Reads a bare 17-byte health-card id field.
///
/// The field is returned undecoded so the caller decides what an invalid id means.
pub async fn read_id_field<R>(reader: &mut R) -> ProtocolResult<[u8; HEALTH_CARD_ID_FIELD_LEN]>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut field = [0u8; HEALTH_CARD_ID_FIELD_LEN];
    crate::framing::read_exactly(reader, &mut field).await?;
    Ok(field)
}

pub async fn write_id_field<W>(writer: &mut W, id: &HealthCardId) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_exactly(writer, &encode_health_card_id(id)).await
}

/// Decodes an id field, reporting failures as [`ProtocolError::InvalidField`].
pub fn decode_id_field(field: &[u8]) -> ProtocolResult<HealthCardId> {
    decode_health_card_id(field).map_err(|e| ProtocolError::InvalidField {
        field: FIELD_HEALTH_CARD_ID,
        reason: e.to_string(),
    })
}

/// True when `err` was caused by an invalid health-card id.
pub fn is_invalid_id(err: &ProtocolError) -> bool {
    matches!(
        err,
        ProtocolError::InvalidField {
            field: FIELD_HEALTH_CARD_ID,
            ..
        }
    )
}

/// True when `err` was caused by a name or surname that does not validate.
pub fn is_invalid_name(err: &ProtocolError) -> bool {
    matches!(
        err,
        ProtocolError::InvalidField {
            field: FIELD_NAME | FIELD_SURNAME,
            ..
        }
    )
}

/// Reads a record sent for creation. Its flag byte is not read; the record starts out valid.
pub async fn read_new_record<R>(reader: &mut R) -> ProtocolResult<CertificateRecord>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = read_vec(reader, CERTIFICATE_RECORD_LEN).await?;
    CertificateRecord::from_bytes_with_test_result(&bytes, TestResult::Valid).map_err(|e| {
        ProtocolError::InvalidField {
            field: "certificate record",
            reason: e.to_string(),
        }
    })
}

impl FixedLayout for CertificateRecord {
    const LEN: usize = CERTIFICATE_RECORD_LEN;

    fn encode(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        CertificateRecord::from_bytes(bytes).map_err(|e| ProtocolError::InvalidField {
            field: "certificate record",
            reason: e.to_string(),
        })
    }
}

/// Identity supplied to the issuance service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySubmission {
    pub name: PersonName,
    pub surname: PersonName,
    pub health_card_id: HealthCardId,
}

impl FixedLayout for IdentitySubmission {
    const LEN: usize = IDENTITY_SUBMISSION_LEN;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&encode_text(self.name.as_str(), NAME_FIELD_LEN));
        out.extend_from_slice(&encode_text(self.surname.as_str(), NAME_FIELD_LEN));
        out.extend_from_slice(&encode_health_card_id(&self.health_card_id));
        out
    }

    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        check_len("identity submission", bytes, Self::LEN)?;
        let (name, rest) = bytes.split_at(NAME_FIELD_LEN);
        let (surname, id) = rest.split_at(NAME_FIELD_LEN);
        let health_card_id = decode_id_field(id)?;
        Ok(Self {
            name: decode_name_field(FIELD_NAME, name)?,
            surname: decode_name_field(FIELD_SURNAME, surname)?,
            health_card_id,
        })
    }
}

/// A new test result for an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReportSubmission {
    pub health_card_id: HealthCardId,
    pub test_result: TestResult,
}

impl FixedLayout for TestReportSubmission {
    const LEN: usize = TEST_REPORT_SUBMISSION_LEN;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&encode_health_card_id(&self.health_card_id));
        out.push(self.test_result.as_byte());
        out
    }

    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        check_len("test report submission", bytes, Self::LEN)?;
        let health_card_id = decode_id_field(&bytes[..HEALTH_CARD_ID_FIELD_LEN])?;
        let test_result = TestResult::from_byte(bytes[HEALTH_CARD_ID_FIELD_LEN]).map_err(|e| {
            ProtocolError::InvalidField {
                field: FIELD_TEST_RESULT,
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            health_card_id,
            test_result,
        })
    }
}

fn decode_name_field(field: &'static str, bytes: &[u8]) -> ProtocolResult<PersonName> {
    PersonName::parse(&decode_text(bytes)).map_err(|e| ProtocolError::InvalidField {
        field,
        reason: e.to_string(),
    })
}

fn check_len(what: &'static str, bytes: &[u8], expected: usize) -> ProtocolResult<()> {
    if bytes.len() != expected {
        return Err(ProtocolError::InvalidField {
            field: what,
            reason: format!("expected {expected} bytes, got {}", bytes.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenpass_types::CalendarDate;
    use tokio::io::duplex;

    fn id() -> HealthCardId {
        HealthCardId::parse("RSSMRA80A01H501U").unwrap()
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(IdentitySubmission::LEN, 2065);
        assert_eq!(TestReportSubmission::LEN, 18);
        assert_eq!(<CertificateRecord as FixedLayout>::LEN, 44);
    }

    #[test]
    fn test_identity_submission_layout() {
        let submission = IdentitySubmission {
            name: PersonName::parse("Mario").unwrap(),
            surname: PersonName::parse("Rossi").unwrap(),
            health_card_id: id(),
        };
        let bytes = submission.encode();

        assert_eq!(bytes.len(), 2065);
        assert_eq!(&bytes[..5], b"Mario");
        assert!(bytes[5..1024].iter().all(|&b| b == 0));
        assert_eq!(&bytes[1024..1029], b"Rossi");
        assert_eq!(&bytes[2048..2064], b"RSSMRA80A01H501U");
        assert_eq!(bytes[2064], 0);
        assert_eq!(IdentitySubmission::decode(&bytes).unwrap(), submission);
    }

    #[test]
    fn test_identity_submission_with_bad_id() {
        let mut bytes = vec![0u8; IdentitySubmission::LEN];
        bytes[2048..2053].copy_from_slice(b"SHORT");

        let err = IdentitySubmission::decode(&bytes).unwrap_err();
        assert!(is_invalid_id(&err));
    }

    #[test]
    fn test_identity_submission_with_blank_surname() {
        let mut bytes = vec![0u8; IdentitySubmission::LEN];
        bytes[..5].copy_from_slice(b"Mario");
        bytes[1024..1027].copy_from_slice(b"   ");
        bytes[2048..2064].copy_from_slice(b"RSSMRA80A01H501U");

        let err = IdentitySubmission::decode(&bytes).unwrap_err();
        assert!(is_invalid_name(&err));
        assert!(matches!(
            err,
            ProtocolError::InvalidField {
                field: FIELD_SURNAME,
                ..
            }
        ));
    }

    #[test]
    fn test_report_submission_layout() {
        let submission = TestReportSubmission {
            health_card_id: id(),
            test_result: TestResult::Invalid,
        };
        let bytes = submission.encode();

        assert_eq!(&bytes[..16], b"RSSMRA80A01H501U");
        assert_eq!(bytes[16], 0);
        assert_eq!(bytes[17], b'0');
        assert_eq!(TestReportSubmission::decode(&bytes).unwrap(), submission);
    }

    #[test]
    fn test_report_submission_rejects_bad_flag() {
        let mut bytes = TestReportSubmission {
            health_card_id: id(),
            test_result: TestResult::Valid,
        }
        .encode();
        bytes[17] = b'Y';

        let err = TestReportSubmission::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidField {
                field: FIELD_TEST_RESULT,
                ..
            }
        ));
        assert!(!is_invalid_id(&err));
    }

    #[tokio::test]
    async fn test_record_over_a_stream() {
        let record = CertificateRecord::new(
            id(),
            CalendarDate::new(10, 9, 2023),
            CalendarDate::new(10, 1, 2024),
        );
        let (mut client, mut server) = duplex(128);

        write_message(&mut client, &record).await.unwrap();
        let received: CertificateRecord = read_message(&mut server).await.unwrap();

        assert_eq!(received, record);
    }

    #[tokio::test]
    async fn test_new_record_ignores_padding_flag() {
        let record = CertificateRecord::new(
            id(),
            CalendarDate::new(10, 9, 2023),
            CalendarDate::new(10, 1, 2024),
        );
        let mut bytes = record.to_bytes();
        bytes[17] = 0;
        let (mut client, mut server) = duplex(128);

        write_exactly(&mut client, &bytes).await.unwrap();
        let received = read_new_record(&mut server).await.unwrap();

        assert_eq!(received, record);
        assert_eq!(received.test_result, TestResult::Valid);
    }

    #[tokio::test]
    async fn test_id_field_is_consumed_even_when_invalid() {
        let (mut client, mut server) = duplex(64);
        write_exactly(&mut client, b"not-a-valid-id!!\0tail").await.unwrap();

        let field = read_id_field(&mut server).await.unwrap();
        assert!(is_invalid_id(&decode_id_field(&field).unwrap_err()));

        let rest = read_vec(&mut server, 4).await.unwrap();
        assert_eq!(rest, b"tail");
    }
}
