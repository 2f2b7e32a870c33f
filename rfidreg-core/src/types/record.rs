//! Tag records and registration requests.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_USERNAME_LEN;
use crate::error::{RegistryError, Result};
use crate::types::TagUid;

/// A registered credential: one tag bound to one username.
///
/// Records are created by a successful registration and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Tag identifier (unique within a store)
    pub uid: TagUid,
    /// Display name of the tag owner
    pub username: String,
    /// Server time at bind, UTC, second precision
    pub registered_at: DateTime<Utc>,
}

impl TagRecord {
    /// Creates a record after validating the username.
    ///
    /// The timestamp is truncated to whole seconds.
    pub fn new(uid: TagUid, username: &str, registered_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            uid,
            username: validate_username(username)?,
            registered_at: registered_at.trunc_subsecs(0),
        })
    }
}

/// Validates and trims a username.
///
/// # Errors
/// Returns [`RegistryError::InvalidInput`] if the name is blank, too long
/// or contains control characters.
pub fn validate_username(username: &str) -> Result<String> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput("username cannot be empty".into()));
    }
    if trimmed.len() > MAX_USERNAME_LEN {
        return Err(RegistryError::InvalidInput(format!(
            "username too long: {} bytes, maximum {}",
            trimmed.len(),
            MAX_USERNAME_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(RegistryError::InvalidInput(
            "username contains control characters".into(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Current server time truncated to whole seconds.
pub fn server_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Input to a registration attempt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Name to bind the next scanned tag to
    pub username: String,
    /// Client clock at submission. Advisory only: logged, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
}

impl RegistrationRequest {
    /// Creates a request without a client timestamp.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            timestamp: None,
        }
    }

    /// Returns the trimmed username, or an error if it is not acceptable.
    pub fn validated_username(&self) -> Result<String> {
        validate_username(&self.username)
    }
}
