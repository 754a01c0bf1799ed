//! Health-card identifiers.
//!
//! A health-card id is the sole key of a certificate record. Because the file-backed
//! record store derives a path from it, the id is validated before it is ever used:
//!
//! - Length: exactly 16
//! - Characters: ASCII letters and digits only
//! - Case is preserved and lookups are exact-match (no normalisation)
//!
//! ## Sharded directory layout
//! For an id `c`, records live under:
//! `parent_dir/<c[0..2]>/<c[2..4]>/`
//!
//! Example:
//! `greenpass_data/RS/SM/RSSMRA80A01H501U.gp`

use crate::TypesError;
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Number of characters in a health-card id.
pub const HEALTH_CARD_ID_LEN: usize = 16;

/// A validated 16-character health-card id.
///
/// Once constructed, the id is guaranteed to be exactly [`HEALTH_CARD_ID_LEN`] ASCII
/// alphanumerics, which makes it safe to embed in a filesystem path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HealthCardId(String);

impl HealthCardId {
    /// Validates and wraps a health-card id.
    ///
    /// The input is not trimmed or case-folded: callers must supply the exact id.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidHealthCardId`] if `input` is not exactly 16 ASCII
    /// letters or digits.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        if Self::is_well_formed(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(TypesError::InvalidHealthCardId(format!(
            "must be exactly {} ASCII letters or digits, got: '{}'",
            HEALTH_CARD_ID_LEN,
            input.escape_default()
        )))
    }

    /// Returns true if `input` is a well-formed health-card id.
    pub fn is_well_formed(input: &str) -> bool {
        input.len() == HEALTH_CARD_ID_LEN && input.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the id as raw bytes (always 16 bytes long).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns `parent_dir/<s1>/<s2>` where `s1`/`s2` are the first two character pairs.
    pub fn shard_dir(&self, parent_dir: &Path) -> PathBuf {
        let s1 = &self.0[0..2];
        let s2 = &self.0[2..4];
        parent_dir.join(s1).join(s2)
    }
}

impl fmt::Display for HealthCardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HealthCardId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HealthCardId::parse(s)
    }
}

impl AsRef<str> for HealthCardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for HealthCardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for HealthCardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HealthCardId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let id = HealthCardId::parse("RSSMRA80A01H501U").unwrap();
        assert_eq!(id.as_str(), "RSSMRA80A01H501U");
        assert_eq!(id.to_string(), "RSSMRA80A01H501U");
    }

    #[test]
    fn test_parse_preserves_case() {
        let upper = HealthCardId::parse("ABCDEFGHIJKLMNOP").unwrap();
        let lower = HealthCardId::parse("abcdefghijklmnop").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(HealthCardId::parse("").is_err());
        assert!(HealthCardId::parse("RSSMRA80A01H501").is_err());
        assert!(HealthCardId::parse("RSSMRA80A01H501UX").is_err());
    }

    #[test]
    fn test_parse_rejects_path_characters() {
        for candidate in ["../../etc/passw", "RSSMRA80/01H501U", "RSSMRA80.01H501U", "RSSMRA80 01H501U"] {
            let padded = format!("{:<16}", candidate);
            let result = HealthCardId::parse(&padded);
            assert!(
                matches!(result, Err(TypesError::InvalidHealthCardId(_))),
                "accepted {padded:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_multibyte_characters() {
        // 16 bytes, but not ASCII
        assert!(HealthCardId::parse("RSSMRA80A01H50è").is_err());
    }

    #[test]
    fn test_shard_dir() {
        let id = HealthCardId::parse("RSSMRA80A01H501U").unwrap();
        let dir = id.shard_dir(Path::new("/data"));
        assert_eq!(dir, PathBuf::from("/data/RS/SM"));
    }

    #[test]
    fn test_serde_rejects_invalid_id() {
        let result: Result<HealthCardId, _> = serde_json::from_str("\"short\"");
        assert!(result.is_err());

        let ok: HealthCardId = serde_json::from_str("\"RSSMRA80A01H501U\"").unwrap();
        assert_eq!(ok.as_str(), "RSSMRA80A01H501U");
    }
}
