//! Error types for the tag registry.
//!
//! One variant per failure kind the presentation layer has to tell apart,
//! plus the store-internal and infrastructure failures behind them.

use thiserror::Error;

use crate::types::TagUid;

/// Result type alias using `RegistryError`.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for all registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CALLER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Request input failed validation. No hardware interaction was performed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// No tag was presented to the reader before the deadline.
    #[error("No tag presented within {seconds}s")]
    ScanTimeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },

    /// The scanned tag is already bound to a user.
    #[error("Tag {uid} is already registered to '{username}'")]
    AlreadyRegistered {
        /// The scanned tag.
        uid: TagUid,
        /// Current owner of the tag.
        username: String,
    },

    /// The attempt was aborted by the caller before a tag was scanned.
    #[error("Registration cancelled")]
    Cancelled,

    // ═══════════════════════════════════════════════════════════════════════════
    // READER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Another caller is already waiting on the reader.
    #[error("Reader is busy with another scan")]
    ReaderBusy,

    /// The reader hardware is disconnected or faulted.
    #[error("Reader unavailable: {0}")]
    ReaderUnavailable(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A record with this UID already exists in the store.
    ///
    /// Store-internal; the coordinator converts it to [`RegistryError::AlreadyRegistered`].
    #[error("Duplicate tag UID: {0}")]
    DuplicateUid(TagUid),

    /// The store could not be read or written.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store file format version mismatch.
    #[error("Store version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build writes.
        expected: u8,
        /// Version found in the file.
        actual: u8,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // STARTUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::InvalidInput(_) => "INVALID_INPUT",
            RegistryError::ScanTimeout { .. } => "SCAN_TIMEOUT",
            RegistryError::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            RegistryError::Cancelled => "CANCELLED",
            RegistryError::ReaderBusy => "READER_BUSY",
            RegistryError::ReaderUnavailable(_) => "READER_UNAVAILABLE",
            // Never leaves the coordinator in practice; reported like its public form.
            RegistryError::DuplicateUid(_) => "ALREADY_REGISTERED",
            RegistryError::StoreUnavailable(_)
            | RegistryError::VersionMismatch { .. }
            | RegistryError::Io(_)
            | RegistryError::Json(_) => "STORE_UNAVAILABLE",
            RegistryError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RegistryError::ScanTimeout { .. } | RegistryError::ReaderBusy
        )
    }

    /// Returns true if this error comes from the storage layer.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            RegistryError::StoreUnavailable(_)
                | RegistryError::VersionMismatch { .. }
                | RegistryError::Io(_)
                | RegistryError::Json(_)
        )
    }

    /// Returns true if this error is the caller's to fix.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            RegistryError::InvalidInput(_)
                | RegistryError::AlreadyRegistered { .. }
                | RegistryError::DuplicateUid(_)
        )
    }
}
