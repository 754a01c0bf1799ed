//! Holder names carried by an identity submission.

use crate::TypesError;

/// A holder's name or surname.
///
/// Trimmed, non-empty and free of NUL bytes, and short enough to fit a NUL-padded
/// 1024-byte wire field with its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonName(String);

impl PersonName {
    /// Longest accepted name in bytes.
    pub const MAX_LEN: usize = 1023;

    /// # Errors
    ///
    /// Returns [`TypesError::InvalidName`] if the trimmed input is empty, longer than
    /// [`Self::MAX_LEN`] bytes, or contains a NUL byte.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TypesError::InvalidName("name cannot be empty".into()));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TypesError::InvalidName(format!(
                "{} bytes, at most {} allowed",
                trimmed.len(),
                Self::MAX_LEN
            )));
        }
        if trimmed.contains('\0') {
            return Err(TypesError::InvalidName("name contains a NUL byte".into()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PersonName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
