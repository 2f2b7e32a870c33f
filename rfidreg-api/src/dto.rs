//! DTOs for API requests and responses.

use serde::{Deserialize, Serialize};
use rfidreg_core::types::{AttemptState, TagRecord, TagUid};

/// Response for the tag listing.
#[derive(Debug, Serialize)]
pub struct ListTagsResponse {
    /// Registered tags in registration order
    pub tags: Vec<TagRecord>,
    /// Number of tags
    pub total: usize,
}

/// Response for a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterTagResponse {
    /// Always true; failures use the error body
    pub success: bool,
    /// The stored record
    pub record: TagRecord,
}

/// Query for tag removal.
#[derive(Debug, Deserialize)]
pub struct RemoveTagQuery {
    /// UID to remove; absent means "remove the next scanned tag"
    pub uid: Option<String>,
}

/// Response for tag removal.
#[derive(Debug, Serialize)]
pub struct RemoveTagResponse {
    /// True if a record was removed
    pub success: bool,
    /// Scanned UID, for removal by scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<TagUid>,
}

/// Response for an access check.
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    /// Presented UID
    pub uid: TagUid,
    /// True if the tag is registered
    pub authorized: bool,
}

/// Response for reader status.
#[derive(Debug, Serialize)]
pub struct ReaderStatusResponse {
    /// A scan is in progress
    pub armed: bool,
    /// Current or last attempt state
    pub state: AttemptState,
}

/// Response for cancelling a registration.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// True if an armed attempt was cancelled
    pub success: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the tag store cannot be read
    pub status: String,
    /// API version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Number of registered tags (0 when degraded)
    pub tag_count: u64,
    /// A scan is in progress
    pub reader_armed: bool,
}
