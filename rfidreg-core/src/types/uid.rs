//! Tag UID type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_UID_LEN, UID_HEX_PREFIX};
use crate::error::{RegistryError, Result};

/// Identifier physically encoded on an RFID tag.
///
/// Opaque to the registry. UIDs delivered as raw bytes by the reader are
/// rendered as `0x` followed by uppercase hex, so `0x04a1b2c3` and
/// `0x04A1B2C3` name the same tag. Any other non-empty string is kept as-is
/// (after trimming).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagUid(String);

impl TagUid {
    /// Parses a UID from user or device input.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidInput`] for empty, oversized or
    /// control-character input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();

        if trimmed.is_empty() {
            return Err(RegistryError::InvalidInput("uid cannot be empty".into()));
        }
        if trimmed.len() > MAX_UID_LEN {
            return Err(RegistryError::InvalidInput(format!(
                "uid too long: {} bytes, maximum {}",
                trimmed.len(),
                MAX_UID_LEN
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(RegistryError::InvalidInput(
                "uid contains control characters".into(),
            ));
        }

        Ok(Self(Self::normalize(trimmed)))
    }

    /// Builds a UID from the raw bytes returned by the reader's anticollision step.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{}{}", UID_HEX_PREFIX, hex::encode_upper(bytes)))
    }

    /// Returns the raw bytes if this UID is in `0x…` hex form.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        self.0
            .strip_prefix(UID_HEX_PREFIX)
            .and_then(|digits| hex::decode(digits).ok())
    }

    /// Returns the UID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn normalize(s: &str) -> String {
        let digits = s
            .strip_prefix(UID_HEX_PREFIX)
            .or_else(|| s.strip_prefix("0X"));

        match digits {
            Some(d) if !d.is_empty() && d.len() % 2 == 0 && d.chars().all(|c| c.is_ascii_hexdigit()) => {
                format!("{}{}", UID_HEX_PREFIX, d.to_ascii_uppercase())
            }
            _ => s.to_string(),
        }
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagUid({})", self.0)
    }
}

impl FromStr for TagUid {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TagUid {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TagUid> for String {
    fn from(uid: TagUid) -> Self {
        uid.0
    }
}

impl AsRef<str> for TagUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
