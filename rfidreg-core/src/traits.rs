//! Common traits for the tag registry.
//!
//! These traits define the seams between the coordinator and its two
//! collaborators, the tag store and the reader hardware, so each side can
//! be swapped for tests or other deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{TagRecord, TagUid};

// ═══════════════════════════════════════════════════════════════════════════════
// TAG STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Durable mapping from tag UID to owner.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - A snapshot file (single-node deployments)
///
/// # Contract
///
/// - At most one record per UID. `insert` is an atomic insert-if-absent.
/// - Mutations are durable before they return `Ok` (write-then-acknowledge).
/// - `list` returns a consistent snapshot in insertion order.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Returns all records in insertion order.
    async fn list(&self) -> Result<Vec<TagRecord>>;

    /// Binds `uid` to `username`.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateUid`](crate::RegistryError::DuplicateUid) if
    /// the UID is already present; the existing record is left untouched.
    async fn insert(
        &self,
        uid: TagUid,
        username: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<TagRecord>;

    /// Removes the record for `uid`.
    ///
    /// Returns whether a record existed. Removing an absent UID is not an error.
    async fn remove(&self, uid: &TagUid) -> Result<bool>;

    /// Retrieves a record by UID.
    async fn get(&self, uid: &TagUid) -> Result<Option<TagRecord>>;

    /// Returns the number of records.
    async fn count(&self) -> Result<u64>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// READER DEVICE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// One physical (or simulated) RFID reader.
///
/// The device is polled: each call performs a single request to the
/// hardware and reports whatever tag is in the field at that moment. The
/// reader adapter owns the timing, deadline and exclusivity.
#[async_trait]
pub trait ReaderDevice: Send + Sync {
    /// Performs one request cycle.
    ///
    /// Returns `Ok(None)` when no tag is in the field.
    ///
    /// # Errors
    /// [`RegistryError::ReaderUnavailable`](crate::RegistryError::ReaderUnavailable)
    /// when the hardware is disconnected or faulted.
    async fn poll(&self) -> Result<Option<TagUid>>;

    /// Called when a listener stops waiting (scan delivered, timeout or
    /// cancellation). Devices release any per-session hardware state here.
    fn release(&self) {}

    /// Human-readable device description for logs.
    fn describe(&self) -> String {
        "reader".into()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTUATOR TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// The lock released for an authorized tag (the cash register relay).
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Pulses the lock open. Returns once the pulse is over.
    ///
    /// # Errors
    /// [`RegistryError::ReaderUnavailable`](crate::RegistryError::ReaderUnavailable)
    /// when the output cannot be driven.
    async fn open(&self) -> Result<()>;

    /// Human-readable description for logs.
    fn describe(&self) -> String {
        "actuator".into()
    }
}
