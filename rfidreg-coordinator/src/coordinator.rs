//! Registration coordinator.
//!
//! ```text
//! IDLE -> ARMED -> (SCANNED | TIMED_OUT | CANCELLED | READER_ERROR)
//! ```
//!
//! Only one attempt may be armed at a time. The reader token and the
//! cancel handle live in a [`PendingScan`] whose `Drop` runs on every exit
//! path, including the caller dropping the request future.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use rfidreg_core::constants::{DEFAULT_SCAN_TIMEOUT, MAX_SCAN_TIMEOUT};
use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::TagStore;
use rfidreg_core::types::{server_timestamp, AttemptState, RegistrationRequest, TagRecord, TagUid};
use rfidreg_reader::{ArmedReader, ReaderAdapter};

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// How long an armed reader waits for a tag
    pub scan_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scan timeout.
    ///
    /// # Errors
    /// [`RegistryError::Config`] for a zero timeout or one above
    /// [`MAX_SCAN_TIMEOUT`].
    pub fn scan_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() || timeout > MAX_SCAN_TIMEOUT {
            return Err(RegistryError::Config(format!(
                "scan timeout must be between 1ms and {}s, got {:?}",
                MAX_SCAN_TIMEOUT.as_secs(),
                timeout
            )));
        }
        self.scan_timeout = timeout;
        Ok(self)
    }
}

/// Drives registration attempts against one reader and one store.
pub struct RegistrationCoordinator {
    store: Arc<dyn TagStore>,
    reader: ReaderAdapter,
    config: CoordinatorConfig,
    state: Mutex<AttemptState>,
    /// Cancel handle of the armed attempt, tagged with its id
    cancel_slot: Mutex<Option<(Uuid, oneshot::Sender<()>)>>,
}

impl RegistrationCoordinator {
    /// Creates a coordinator.
    pub fn new(store: Arc<dyn TagStore>, reader: ReaderAdapter, config: CoordinatorConfig) -> Self {
        Self {
            store,
            reader,
            config,
            state: Mutex::new(AttemptState::Idle),
            cancel_slot: Mutex::new(None),
        }
    }

    /// Runs one registration attempt.
    ///
    /// The username is validated before the reader is touched. On a scan
    /// the UID is bound with the server's current time; the client's
    /// timestamp is never stored.
    ///
    /// # Errors
    /// - [`RegistryError::InvalidInput`]: blank or oversized username
    /// - [`RegistryError::ReaderBusy`]: another attempt is armed
    /// - [`RegistryError::ScanTimeout`]: no tag before the deadline
    /// - [`RegistryError::Cancelled`]: [`cancel`](Self::cancel) was called
    /// - [`RegistryError::ReaderUnavailable`]: reader fault
    /// - [`RegistryError::AlreadyRegistered`]: the scanned tag has an owner
    /// - [`RegistryError::StoreUnavailable`]: the bind could not be persisted
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegistrationRequest) -> Result<TagRecord> {
        let username = request.validated_username()?;

        if let Some(client_ts) = &request.timestamp {
            debug!(%client_ts, "Ignoring advisory client timestamp");
        }

        let mut pending = self.arm()?;
        let uid = pending.wait_for_tag(self.config.scan_timeout).await?;

        match self.store.insert(uid, &username, server_timestamp()).await {
            Ok(record) => {
                info!(
                    attempt = %pending.attempt,
                    uid = %record.uid,
                    username = %record.username,
                    "Tag registered"
                );
                Ok(record)
            }
            Err(RegistryError::DuplicateUid(uid)) => {
                let owner = match self.store.get(&uid).await {
                    Ok(Some(existing)) => existing.username,
                    Ok(None) => String::new(),
                    Err(e) => {
                        warn!(attempt = %pending.attempt, %uid, error = %e, "Failed to look up tag owner");
                        String::new()
                    }
                };
                warn!(attempt = %pending.attempt, %uid, %owner, "Scanned tag already registered");
                Err(RegistryError::AlreadyRegistered { uid, username: owner })
            }
            Err(e) => {
                warn!(attempt = %pending.attempt, error = %e, "Failed to store tag record");
                Err(e)
            }
        }
    }

    /// Waits for a tag and removes its record.
    ///
    /// Uses the same single-flight discipline as [`register`](Self::register).
    /// Returns the scanned UID and whether a record existed.
    #[instrument(skip(self))]
    pub async fn scan_for_removal(&self) -> Result<(TagUid, bool)> {
        let mut pending = self.arm()?;
        let uid = pending.wait_for_tag(self.config.scan_timeout).await?;

        let removed = self.store.remove(&uid).await?;
        info!(attempt = %pending.attempt, %uid, removed, "Removal by scan");
        Ok((uid, removed))
    }

    /// Cancels the armed attempt, if any.
    ///
    /// Returns false when nothing was armed. Calling it repeatedly is harmless.
    pub fn cancel(&self) -> bool {
        match self.cancel_slot.lock().take() {
            Some((attempt, tx)) => {
                let delivered = tx.send(()).is_ok();
                info!(%attempt, delivered, "Registration cancel requested");
                delivered
            }
            None => {
                debug!("Cancel requested with no armed attempt");
                false
            }
        }
    }

    /// Current state: `Armed` while an attempt waits, otherwise how the last one ended.
    pub fn state(&self) -> AttemptState {
        *self.state.lock()
    }

    /// Returns true while an attempt holds the reader.
    pub fn is_armed(&self) -> bool {
        self.reader.is_armed()
    }

    /// Returns the shared reader.
    pub fn reader(&self) -> &ReaderAdapter {
        &self.reader
    }

    /// Returns the configured scan timeout.
    pub fn scan_timeout(&self) -> Duration {
        self.config.scan_timeout
    }

    fn arm(&self) -> Result<PendingScan<'_>> {
        let armed = self.reader.arm()?;
        let attempt = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        *self.cancel_slot.lock() = Some((attempt, tx));
        *self.state.lock() = AttemptState::Armed;

        info!(%attempt, timeout_s = self.config.scan_timeout.as_secs(), "Reader armed, waiting for tag");

        Ok(PendingScan {
            coordinator: self,
            armed,
            attempt,
            cancel_rx: rx,
            finished: false,
        })
    }

    /// Empties the slot if it still belongs to `attempt`.
    ///
    /// Returns false if [`cancel`](Self::cancel) took it first.
    fn take_cancel_slot(&self, attempt: Uuid) -> bool {
        let mut slot = self.cancel_slot.lock();
        if matches!(slot.as_ref(), Some((id, _)) if *id == attempt) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for RegistrationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationCoordinator")
            .field("reader", &self.reader)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// One armed attempt. Never persisted.
struct PendingScan<'a> {
    coordinator: &'a RegistrationCoordinator,
    armed: ArmedReader,
    attempt: Uuid,
    cancel_rx: oneshot::Receiver<()>,
    finished: bool,
}

impl PendingScan<'_> {
    async fn wait_for_tag(&mut self, timeout: Duration) -> Result<TagUid> {
        let result = tokio::select! {
            res = self.armed.await_scan(timeout) => res,
            Ok(()) = &mut self.cancel_rx => Err(RegistryError::Cancelled),
        };

        // A cancel acknowledged to its caller must win, even over a scan
        // that completed in the meantime.
        let result = if self.coordinator.take_cancel_slot(self.attempt) {
            result
        } else {
            if let Ok(uid) = &result {
                info!(attempt = %self.attempt, %uid, "Scan discarded, attempt was cancelled");
            }
            Err(RegistryError::Cancelled)
        };

        let terminal = match &result {
            Ok(_) => AttemptState::Scanned,
            Err(RegistryError::ScanTimeout { .. }) => AttemptState::TimedOut,
            Err(RegistryError::Cancelled) => AttemptState::Cancelled,
            Err(_) => AttemptState::ReaderError,
        };
        self.finish(terminal);

        result
    }

    fn finish(&mut self, terminal: AttemptState) {
        self.finished = true;
        self.coordinator.take_cancel_slot(self.attempt);
        *self.coordinator.state.lock() = terminal;
        debug!(attempt = %self.attempt, state = %terminal, "Attempt finished");
    }
}

impl Drop for PendingScan<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Caller went away while armed (request future dropped).
            self.finish(AttemptState::Cancelled);
            info!(attempt = %self.attempt, "Attempt abandoned by caller");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rfidreg_reader::{ReaderConfig, ScriptedReader};
    use rfidreg_store::MemoryTagStore;

    struct Harness {
        device: Arc<ScriptedReader>,
        store: Arc<MemoryTagStore>,
        coordinator: Arc<RegistrationCoordinator>,
    }

    fn harness() -> Harness {
        let device = Arc::new(ScriptedReader::new());
        let store = Arc::new(MemoryTagStore::new());
        let reader = ReaderAdapter::with_config(
            device.clone(),
            ReaderConfig::new().poll_interval(Duration::from_millis(50)),
        );
        let config = CoordinatorConfig::new()
            .scan_timeout(Duration::from_secs(10))
            .unwrap();
        let coordinator = Arc::new(RegistrationCoordinator::new(store.clone(), reader, config));
        Harness { device, store, coordinator }
    }

    fn uid(s: &str) -> TagUid {
        TagUid::new(s).unwrap()
    }

    fn request(name: &str) -> RegistrationRequest {
        RegistrationRequest::new(name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_binds_scanned_tag() {
        let h = harness();
        h.device.present(uid("TAG1"));

        let before = server_timestamp();
        let record = h.coordinator.register(&request("alice")).await.unwrap();

        assert_eq!(record.uid, uid("TAG1"));
        assert_eq!(record.username, "alice");
        assert!(record.registered_at >= before);
        assert_eq!(h.coordinator.state(), AttemptState::Scanned);
        assert!(!h.coordinator.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_timestamp_is_not_persisted() {
        let h = harness();
        h.device.present(uid("TAG1"));

        let req = RegistrationRequest {
            username: "alice".into(),
            timestamp: Some("1999-01-01T00:00:00Z".into()),
        };
        let record = h.coordinator.register(&req).await.unwrap();
        assert!(record.registered_at.format("%Y").to_string() != "1999");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_username_never_arms_reader() {
        let h = harness();
        h.device.present(uid("TAG1"));

        let err = h.coordinator.register(&request("  ")).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
        assert_eq!(h.device.poll_count(), 0);
        assert_eq!(h.device.pending(), 1);
        assert_eq!(h.coordinator.state(), AttemptState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_store_unchanged() {
        let h = harness();

        let err = h.coordinator.register(&request("carol")).await.unwrap_err();
        assert!(matches!(err, RegistryError::ScanTimeout { seconds: 10 }));
        assert_eq!(h.coordinator.state(), AttemptState::TimedOut);
        assert!(h.store.is_empty());
        assert!(!h.coordinator.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_scan_reports_owner() {
        let h = harness();
        h.device.present(uid("TAG1"));
        h.coordinator.register(&request("alice")).await.unwrap();

        h.device.present(uid("TAG1"));
        let err = h.coordinator.register(&request("bob")).await.unwrap_err();
        match err {
            RegistryError::AlreadyRegistered { uid: u, username } => {
                assert_eq!(u, uid("TAG1"));
                assert_eq!(username, "alice");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let records = h.store.all_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alice");
        assert!(!h.coordinator.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_fault_leaves_store_unchanged() {
        let h = harness();
        h.device.disconnect();

        let err = h.coordinator.register(&request("dave")).await.unwrap_err();
        assert!(matches!(err, RegistryError::ReaderUnavailable(_)));
        assert_eq!(h.coordinator.state(), AttemptState::ReaderError);
        assert!(h.store.is_empty());
        assert!(!h.coordinator.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_register_fails_fast_while_armed() {
        let h = harness();

        let coordinator = h.coordinator.clone();
        let first = tokio::spawn(async move { coordinator.register(&request("alice")).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.coordinator.state(), AttemptState::Armed);

        let start = tokio::time::Instant::now();
        let err = h.coordinator.register(&request("bob")).await.unwrap_err();
        assert!(matches!(err, RegistryError::ReaderBusy));
        assert_eq!(start.elapsed(), Duration::ZERO);

        // The busy rejection does not disturb the armed attempt
        assert_eq!(h.coordinator.state(), AttemptState::Armed);
        h.device.present(uid("TAG1"));
        let record = first.await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_reader_without_mutation() {
        let h = harness();

        let coordinator = h.coordinator.clone();
        let attempt = tokio::spawn(async move { coordinator.register(&request("erin")).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.coordinator.cancel());

        let err = attempt.await.unwrap().unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
        assert_eq!(h.coordinator.state(), AttemptState::Cancelled);
        assert!(!h.coordinator.is_armed());
        assert!(h.store.is_empty());

        // Idempotent once nothing is armed
        assert!(!h.coordinator.cancel());
        assert!(!h.coordinator.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_releases_reader() {
        let h = harness();

        let coordinator = h.coordinator.clone();
        let attempt = tokio::spawn(async move { coordinator.register(&request("frank")).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.coordinator.is_armed());

        attempt.abort();
        let _ = attempt.await;

        assert!(!h.coordinator.is_armed());
        assert_eq!(h.coordinator.state(), AttemptState::Cancelled);
        assert!(!h.coordinator.cancel());

        // The next attempt is not locked out
        h.device.present(uid("TAG9"));
        let record = h.coordinator.register(&request("frank")).await.unwrap();
        assert_eq!(record.uid, uid("TAG9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_scan_is_noop() {
        let h = harness();
        h.device.present(uid("TAG1"));
        h.coordinator.register(&request("alice")).await.unwrap();

        assert!(!h.coordinator.cancel());
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledged_cancel_beats_ready_scan() {
        // The tag is already under the reader when cancel lands, so either
        // select branch may be ready first. Cancel must win every time.
        for _ in 0..20 {
            let h = harness();
            let mut pending = h.coordinator.arm().unwrap();
            h.device.present(uid("TAG1"));

            assert!(h.coordinator.cancel());
            let err = pending.wait_for_tag(Duration::from_secs(10)).await.unwrap_err();
            drop(pending);

            assert!(matches!(err, RegistryError::Cancelled));
            assert_eq!(h.coordinator.state(), AttemptState::Cancelled);
            assert!(!h.coordinator.is_armed());
            assert!(h.store.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_for_removal() {
        let h = harness();
        h.device.present(uid("TAG1"));
        h.coordinator.register(&request("alice")).await.unwrap();

        h.device.present(uid("TAG1"));
        let (scanned, removed) = h.coordinator.scan_for_removal().await.unwrap();
        assert_eq!(scanned, uid("TAG1"));
        assert!(removed);
        assert!(h.store.is_empty());

        h.device.present(uid("TAG1"));
        let (_, removed) = h.coordinator.scan_for_removal().await.unwrap();
        assert!(!removed);
    }

    struct FailingStore;

    #[async_trait]
    impl TagStore for FailingStore {
        async fn list(&self) -> Result<Vec<TagRecord>> {
            Err(RegistryError::StoreUnavailable("disk full".into()))
        }

        async fn insert(&self, _: TagUid, _: &str, _: DateTime<Utc>) -> Result<TagRecord> {
            Err(RegistryError::StoreUnavailable("disk full".into()))
        }

        async fn remove(&self, _: &TagUid) -> Result<bool> {
            Err(RegistryError::StoreUnavailable("disk full".into()))
        }

        async fn get(&self, _: &TagUid) -> Result<Option<TagRecord>> {
            Ok(None)
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_releases_reader() {
        let device = Arc::new(ScriptedReader::with_tags([uid("TAG1")]));
        let reader = ReaderAdapter::new(device.clone());
        let coordinator =
            RegistrationCoordinator::new(Arc::new(FailingStore), reader, CoordinatorConfig::default());

        let err = coordinator.register(&request("alice")).await.unwrap_err();
        assert!(matches!(err, RegistryError::StoreUnavailable(_)));
        assert!(!coordinator.is_armed());
    }

    /// Holds one record but cannot read it back.
    struct UnreadableStore {
        inner: MemoryTagStore,
    }

    #[async_trait]
    impl TagStore for UnreadableStore {
        async fn list(&self) -> Result<Vec<TagRecord>> {
            self.inner.list().await
        }

        async fn insert(&self, uid: TagUid, username: &str, at: DateTime<Utc>) -> Result<TagRecord> {
            self.inner.insert(uid, username, at).await
        }

        async fn remove(&self, uid: &TagUid) -> Result<bool> {
            self.inner.remove(uid).await
        }

        async fn get(&self, _: &TagUid) -> Result<Option<TagRecord>> {
            Err(RegistryError::StoreUnavailable("read error".into()))
        }

        async fn count(&self) -> Result<u64> {
            self.inner.count().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_with_unreadable_owner_still_rejected() {
        let store = Arc::new(UnreadableStore { inner: MemoryTagStore::new() });
        store.insert(uid("TAG1"), "alice", server_timestamp()).await.unwrap();

        let device = Arc::new(ScriptedReader::with_tags([uid("TAG1")]));
        let coordinator =
            RegistrationCoordinator::new(store.clone(), ReaderAdapter::new(device), CoordinatorConfig::default());

        match coordinator.register(&request("bob")).await.unwrap_err() {
            RegistryError::AlreadyRegistered { uid: u, username } => {
                assert_eq!(u, uid("TAG1"));
                assert!(username.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.inner.all_records()[0].username, "alice");
        assert!(!coordinator.is_armed());
    }

    #[test]
    fn test_config_rejects_out_of_range_timeouts() {
        assert!(CoordinatorConfig::new().scan_timeout(Duration::ZERO).is_err());
        assert!(CoordinatorConfig::new()
            .scan_timeout(MAX_SCAN_TIMEOUT + Duration::from_secs(1))
            .is_err());
        assert!(CoordinatorConfig::new().scan_timeout(Duration::from_secs(5)).is_ok());
    }
}
