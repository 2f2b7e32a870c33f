//! Registry service façade.

use std::sync::Arc;

use tracing::{debug, instrument};

use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::{Actuator, TagStore};
use rfidreg_core::types::{AttemptState, RegistrationRequest, TagRecord, TagUid};
use rfidreg_reader::ReaderAdapter;

use crate::coordinator::{CoordinatorConfig, RegistrationCoordinator};
use crate::monitor::AccessMonitor;

/// Snapshot of the reader for status displays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderStatus {
    /// An attempt is currently waiting for a tag
    pub armed: bool,
    /// Current or last attempt state
    pub state: AttemptState,
}

/// Operations exposed to external callers.
///
/// Reads and removals go to the store directly; anything that needs the
/// reader goes through the coordinator.
pub struct RegistryService {
    store: Arc<dyn TagStore>,
    coordinator: RegistrationCoordinator,
}

impl RegistryService {
    /// Creates a service over a store and a reader.
    pub fn new(store: Arc<dyn TagStore>, reader: ReaderAdapter, config: CoordinatorConfig) -> Self {
        let coordinator = RegistrationCoordinator::new(store.clone(), reader, config);
        Self { store, coordinator }
    }

    /// Lists all registered tags in insertion order.
    pub async fn list_tags(&self) -> Result<Vec<TagRecord>> {
        self.store.list().await.map_err(store_unavailable)
    }

    /// Waits for a tag and binds it to the requested username.
    pub async fn register_tag(&self, request: &RegistrationRequest) -> Result<TagRecord> {
        self.coordinator.register(request).await
    }

    /// Removes a tag by UID. Returns false if it was not registered.
    #[instrument(skip(self))]
    pub async fn remove_tag(&self, uid: &TagUid) -> Result<bool> {
        self.store.remove(uid).await.map_err(store_unavailable)
    }

    /// Waits for a tag and removes it.
    pub async fn remove_scanned_tag(&self) -> Result<(TagUid, bool)> {
        self.coordinator.scan_for_removal().await
    }

    /// Looks up a single tag.
    pub async fn get_tag(&self, uid: &TagUid) -> Result<Option<TagRecord>> {
        self.store.get(uid).await.map_err(store_unavailable)
    }

    /// Returns true if the presented tag may open the cash register.
    pub async fn is_authorized(&self, uid: &TagUid) -> Result<bool> {
        let authorized = self.get_tag(uid).await?.is_some();
        debug!(%uid, authorized, "Access check");
        Ok(authorized)
    }

    /// Number of registered tags.
    pub async fn tag_count(&self) -> Result<u64> {
        self.store.count().await.map_err(store_unavailable)
    }

    /// Aborts the armed registration, if any.
    pub fn cancel_registration(&self) -> bool {
        self.coordinator.cancel()
    }

    /// Reports whether the reader is waiting for a tag.
    pub fn reader_status(&self) -> ReaderStatus {
        ReaderStatus {
            armed: self.coordinator.is_armed(),
            state: self.coordinator.state(),
        }
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &RegistrationCoordinator {
        &self.coordinator
    }

    /// Builds an access monitor over this service's reader and store.
    pub fn access_monitor(&self, actuator: Arc<dyn Actuator>) -> AccessMonitor {
        AccessMonitor::new(self.coordinator.reader().clone(), self.store.clone(), actuator)
    }
}

fn store_unavailable(err: RegistryError) -> RegistryError {
    if err.is_store_error() {
        match err {
            RegistryError::StoreUnavailable(_) => err,
            other => RegistryError::StoreUnavailable(other.to_string()),
        }
    } else {
        err
    }
}
