//! Fixed byte layouts shared by the wire protocol and the on-disk record format.
//!
//! All integers are 4-byte little-endian. Text fields are NUL-padded.
//!
//! ```text
//! CertificateRecord (44 bytes)
//! offset  size  field
//!      0    17  health card id (16 chars + NUL)
//!     17     1  test result flag ('1' valid, '0' invalid)
//!     18     2  reserved, zero (struct alignment kept for legacy peers)
//!     20    12  issued on  (day, month, year)
//!     32    12  expires on (day, month, year)
//! ```

use crate::{CalendarDate, CertificateRecord, HealthCardId, TestResult, TypesError, HEALTH_CARD_ID_LEN};

/// Width of a health-card id field: 16 characters plus the NUL terminator.
pub const HEALTH_CARD_ID_FIELD_LEN: usize = HEALTH_CARD_ID_LEN + 1;

/// Width of an encoded [`CalendarDate`].
pub const CALENDAR_DATE_LEN: usize = 12;

/// Width of an encoded [`CertificateRecord`].
pub const CERTIFICATE_RECORD_LEN: usize = 44;

const FLAG_OFFSET: usize = HEALTH_CARD_ID_FIELD_LEN;
const ISSUED_OFFSET: usize = 20;
const EXPIRES_OFFSET: usize = ISSUED_OFFSET + CALENDAR_DATE_LEN;

/// Encodes an id into its NUL-terminated field.
pub fn encode_health_card_id(id: &HealthCardId) -> [u8; HEALTH_CARD_ID_FIELD_LEN] {
    let mut field = [0u8; HEALTH_CARD_ID_FIELD_LEN];
    field[..HEALTH_CARD_ID_LEN].copy_from_slice(id.as_bytes());
    field
}

/// Decodes an id field, reading up to the first NUL.
///
/// # Errors
///
/// Returns [`TypesError::InvalidLayout`] if `field` is not 17 bytes, or
/// [`TypesError::InvalidHealthCardId`] if the text before the NUL is not a valid id.
pub fn decode_health_card_id(field: &[u8]) -> Result<HealthCardId, TypesError> {
    check_len("health card id", field, HEALTH_CARD_ID_FIELD_LEN)?;

    let text_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..text_len]).map_err(|_| {
        TypesError::InvalidHealthCardId(format!("not valid UTF-8: {:?}", &field[..text_len]))
    })?;
    HealthCardId::parse(text)
}

pub fn encode_calendar_date(date: CalendarDate) -> [u8; CALENDAR_DATE_LEN] {
    let mut out = [0u8; CALENDAR_DATE_LEN];
    out[0..4].copy_from_slice(&date.day.to_le_bytes());
    out[4..8].copy_from_slice(&date.month.to_le_bytes());
    out[8..12].copy_from_slice(&date.year.to_le_bytes());
    out
}

pub fn decode_calendar_date(bytes: &[u8]) -> Result<CalendarDate, TypesError> {
    check_len("calendar date", bytes, CALENDAR_DATE_LEN)?;
    let int_at = |offset: usize| {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[offset..offset + 4]);
        i32::from_le_bytes(raw)
    };
    Ok(CalendarDate::new(int_at(0), int_at(4), int_at(8)))
}

impl CertificateRecord {
    /// Encodes the record into its fixed 44-byte layout.
    pub fn to_bytes(&self) -> [u8; CERTIFICATE_RECORD_LEN] {
        let mut out = [0u8; CERTIFICATE_RECORD_LEN];
        out[..HEALTH_CARD_ID_FIELD_LEN].copy_from_slice(&encode_health_card_id(&self.health_card_id));
        out[FLAG_OFFSET] = self.test_result.as_byte();
        out[ISSUED_OFFSET..EXPIRES_OFFSET].copy_from_slice(&encode_calendar_date(self.issued_on));
        out[EXPIRES_OFFSET..].copy_from_slice(&encode_calendar_date(self.expires_on));
        out
    }

    /// Decodes a record from its fixed 44-byte layout. The reserved bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`TypesError`] if the length is wrong, the id is invalid, or the flag byte is
    /// neither `'0'` nor `'1'`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        check_len("certificate record", bytes, CERTIFICATE_RECORD_LEN)?;
        Ok(Self {
            health_card_id: decode_health_card_id(&bytes[..HEALTH_CARD_ID_FIELD_LEN])?,
            test_result: TestResult::from_byte(bytes[FLAG_OFFSET])?,
            issued_on: decode_calendar_date(&bytes[ISSUED_OFFSET..EXPIRES_OFFSET])?,
            expires_on: decode_calendar_date(&bytes[EXPIRES_OFFSET..])?,
        })
    }

    /// Decodes a record whose flag byte is not meaningful, giving it `test_result`.
    ///
    /// Issuers built against the older layout leave offset 17 as uninitialised padding, so
    /// the byte is not inspected.
    ///
    /// # Errors
    ///
    /// Returns a [`TypesError`] if the length is wrong or the id is invalid.
    pub fn from_bytes_with_test_result(
        bytes: &[u8],
        test_result: TestResult,
    ) -> Result<Self, TypesError> {
        check_len("certificate record", bytes, CERTIFICATE_RECORD_LEN)?;
        Ok(Self {
            health_card_id: decode_health_card_id(&bytes[..HEALTH_CARD_ID_FIELD_LEN])?,
            test_result,
            issued_on: decode_calendar_date(&bytes[ISSUED_OFFSET..EXPIRES_OFFSET])?,
            expires_on: decode_calendar_date(&bytes[EXPIRES_OFFSET..])?,
        })
    }
}

fn check_len(what: &'static str, bytes: &[u8], expected: usize) -> Result<(), TypesError> {
    if bytes.len() != expected {
        return Err(TypesError::InvalidLayout {
            what,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
