//! Reader adapter with a single-listener token.
//!
//! Two locks guard the reader. The listener token is taken without waiting
//! by whoever needs the next tag (registration, removal by scan) and is what
//! makes a second listener fail with `ReaderBusy`. The bus lock is held only
//! for the duration of one device request, so the access monitor can poll
//! between listeners without ever owning the token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use rfidreg_core::constants::DEFAULT_POLL_INTERVAL;
use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::ReaderDevice;
use rfidreg_core::types::TagUid;

/// Reader adapter configuration.
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    /// Interval between two hardware polls while armed
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ReaderConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval. Zero is raised to one millisecond.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

/// Shared handle to one reader.
///
/// Cloning is cheap; all clones share the device and the single token.
#[derive(Clone)]
pub struct ReaderAdapter {
    device: Arc<dyn ReaderDevice>,
    token: Arc<Semaphore>,
    bus: Arc<Mutex<()>>,
    config: ReaderConfig,
}

impl ReaderAdapter {
    /// Creates an adapter with the default configuration.
    pub fn new(device: Arc<dyn ReaderDevice>) -> Self {
        Self::with_config(device, ReaderConfig::default())
    }

    /// Creates an adapter with a custom configuration.
    pub fn with_config(device: Arc<dyn ReaderDevice>, config: ReaderConfig) -> Self {
        Self {
            device,
            token: Arc::new(Semaphore::new(1)),
            bus: Arc::new(Mutex::new(())),
            config,
        }
    }

    /// Takes the reader's token without waiting.
    ///
    /// # Errors
    /// [`RegistryError::ReaderBusy`] if another listener holds it.
    pub fn arm(&self) -> Result<ArmedReader> {
        let permit = match self.token.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err(RegistryError::ReaderBusy),
            Err(TryAcquireError::Closed) => {
                return Err(RegistryError::ReaderUnavailable("reader shut down".into()))
            }
        };

        debug!(device = %self.device.describe(), "Reader armed");

        Ok(ArmedReader {
            device: self.device.clone(),
            bus: self.bus.clone(),
            poll_interval: self.config.poll_interval,
            armed_at: Instant::now(),
            _permit: permit,
        })
    }

    /// Arms the reader and waits for the next tag.
    pub async fn await_scan(&self, timeout: Duration) -> Result<TagUid> {
        let armed = self.arm()?;
        armed.await_scan(timeout).await
    }

    /// Performs one request cycle on behalf of a background poller.
    ///
    /// Never takes the listener token. Returns `Ok(None)` without touching
    /// the device while a listener is armed or another request is on the bus.
    pub async fn poll_idle(&self) -> Result<Option<TagUid>> {
        let Ok(_bus) = self.bus.try_lock() else {
            return Ok(None);
        };
        // Checked under the bus lock: a listener armed from here on polls
        // only after this request completes.
        if self.is_armed() {
            return Ok(None);
        }
        self.device.poll().await
    }

    /// Returns true while a listener holds the token.
    pub fn is_armed(&self) -> bool {
        self.token.available_permits() == 0
    }

    /// Stops accepting listeners. Armed listeners finish normally.
    pub fn shutdown(&self) {
        self.token.close();
    }

    /// Returns the configured poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

impl std::fmt::Debug for ReaderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderAdapter")
            .field("device", &self.device.describe())
            .field("armed", &self.is_armed())
            .field("config", &self.config)
            .finish()
    }
}

/// A listener holding the reader's token.
///
/// The token is released when this value is dropped, whichever way the
/// surrounding operation ends.
pub struct ArmedReader {
    device: Arc<dyn ReaderDevice>,
    bus: Arc<Mutex<()>>,
    poll_interval: Duration,
    armed_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl ArmedReader {
    /// Waits for the next tag presented to the reader.
    ///
    /// Dropping the returned future stops polling; no tag is consumed
    /// after that point.
    ///
    /// # Errors
    /// - [`RegistryError::ScanTimeout`] if no tag arrives within `timeout`
    /// - [`RegistryError::ReaderUnavailable`] on a device fault
    #[instrument(skip(self), fields(device = %self.device.describe()))]
    pub async fn await_scan(&self, timeout: Duration) -> Result<TagUid> {
        match tokio::time::timeout(timeout, self.poll_until_tag()).await {
            Ok(Ok(uid)) => {
                debug!(%uid, "Tag scanned");
                Ok(uid)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Reader fault while armed");
                Err(e)
            }
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Scan timed out");
                Err(RegistryError::ScanTimeout {
                    seconds: timeout.as_secs_f64().ceil() as u64,
                })
            }
        }
    }

    async fn poll_until_tag(&self) -> Result<TagUid> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let _bus = self.bus.lock().await;
            if let Some(uid) = self.device.poll().await? {
                return Ok(uid);
            }
        }
    }

    /// Time since the reader was armed.
    pub fn elapsed(&self) -> Duration {
        self.armed_at.elapsed()
    }
}

impl Drop for ArmedReader {
    fn drop(&mut self) {
        self.device.release();
        debug!(
            held_ms = self.armed_at.elapsed().as_millis() as u64,
            "Reader released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedReader;

    fn adapter() -> (Arc<ScriptedReader>, ReaderAdapter) {
        let device = Arc::new(ScriptedReader::new());
        let reader = ReaderAdapter::with_config(
            device.clone(),
            ReaderConfig::new().poll_interval(Duration::from_millis(10)),
        );
        (device, reader)
    }

    fn uid(s: &str) -> TagUid {
        TagUid::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_returns_presented_tag() {
        let (device, reader) = adapter();
        device.present(uid("TAG1"));

        let scanned = reader.await_scan(Duration::from_secs(5)).await.unwrap();
        assert_eq!(scanned, uid("TAG1"));
        assert!(!reader.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_waits_for_late_tag() {
        let (device, reader) = adapter();

        let presenter = device.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            presenter.present(TagUid::new("LATE").unwrap());
        });

        let scanned = reader.await_scan(Duration::from_secs(5)).await.unwrap();
        assert_eq!(scanned, uid("LATE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_timeout() {
        let (_device, reader) = adapter();

        let err = reader.await_scan(Duration::from_secs(3)).await.unwrap_err();
        assert!(matches!(err, RegistryError::ScanTimeout { seconds: 3 }));
        assert!(!reader.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_listener_is_rejected() {
        let (_device, reader) = adapter();

        let first = reader.arm().unwrap();
        assert!(reader.is_armed());
        assert!(matches!(reader.arm(), Err(RegistryError::ReaderBusy)));
        assert!(matches!(
            reader.await_scan(Duration::from_secs(1)).await,
            Err(RegistryError::ReaderBusy)
        ));

        drop(first);
        assert!(!reader.is_armed());
        assert!(reader.arm().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_fault_surfaces_unavailable() {
        let (device, reader) = adapter();
        device.disconnect();

        let err = reader.await_scan(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, RegistryError::ReaderUnavailable(_)));
        assert!(!reader.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_releases_token_and_consumes_nothing() {
        let (device, reader) = adapter();

        let waiting = reader.clone();
        let handle = tokio::spawn(async move { waiting.await_scan(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(reader.is_armed());

        handle.abort();
        let _ = handle.await;
        assert!(!reader.is_armed());
        assert_eq!(device.release_count(), 1);

        // A tag presented after cancellation is still there for the next listener
        device.present(uid("TAG2"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(device.pending(), 1);
        assert_eq!(reader.await_scan(Duration::from_secs(1)).await.unwrap(), uid("TAG2"));
    }

    #[tokio::test]
    async fn test_poll_idle_hands_out_tags_without_arming() {
        let (device, reader) = adapter();
        device.present(uid("TAG3"));

        assert_eq!(reader.poll_idle().await.unwrap(), Some(uid("TAG3")));
        assert_eq!(reader.poll_idle().await.unwrap(), None);
        assert!(!reader.is_armed());
        assert_eq!(device.release_count(), 0);
    }

    #[tokio::test]
    async fn test_poll_idle_skips_while_armed() {
        let (device, reader) = adapter();
        device.present(uid("TAG4"));

        let armed = reader.arm().unwrap();
        let polls = device.poll_count();
        assert_eq!(reader.poll_idle().await.unwrap(), None);
        assert_eq!(device.poll_count(), polls);
        assert_eq!(device.pending(), 1);

        // The listener still gets the tag
        assert_eq!(armed.await_scan(Duration::from_secs(1)).await.unwrap(), uid("TAG4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_polling_never_blocks_arm() {
        let (device, reader) = adapter();

        let poller = reader.clone();
        let background = tokio::spawn(async move {
            loop {
                let _ = poller.poll_idle().await;
                tokio::task::yield_now().await;
            }
        });

        for _ in 0..20 {
            let armed = reader.arm().unwrap();
            device.present(uid("TAG5"));
            assert_eq!(armed.await_scan(Duration::from_secs(1)).await.unwrap(), uid("TAG5"));
        }

        background.abort();
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_listeners() {
        let (_device, reader) = adapter();
        reader.shutdown();
        assert!(matches!(reader.arm(), Err(RegistryError::ReaderUnavailable(_))));
    }
}
