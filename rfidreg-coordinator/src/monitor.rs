//! Access monitor: the cash register's resting loop.
//!
//! Between registrations the reader is polled in the background; every
//! presented tag is checked against the store and, if registered, the
//! relay is pulsed. The monitor never takes the listener token, so a
//! registration can always arm and always receives the next tag.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use rfidreg_core::error::Result;
use rfidreg_core::traits::{Actuator, TagStore};
use rfidreg_core::types::TagUid;
use rfidreg_reader::ReaderAdapter;

/// Outcome of one access check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessEvent {
    /// Presented tag
    pub uid: TagUid,
    /// The tag is registered and the relay was pulsed
    pub granted: bool,
}

/// Background access loop over a shared reader.
pub struct AccessMonitor {
    reader: ReaderAdapter,
    store: Arc<dyn TagStore>,
    actuator: Arc<dyn Actuator>,
    interval: Duration,
}

impl AccessMonitor {
    /// Creates a monitor polling at the reader's poll interval.
    pub fn new(reader: ReaderAdapter, store: Arc<dyn TagStore>, actuator: Arc<dyn Actuator>) -> Self {
        let interval = reader.poll_interval();
        Self {
            reader,
            store,
            actuator,
            interval,
        }
    }

    /// Runs one cycle: poll, look up, pulse.
    ///
    /// Returns `Ok(None)` when no tag was read, including cycles skipped
    /// because a registration holds the reader.
    pub async fn check_once(&self) -> Result<Option<AccessEvent>> {
        let Some(uid) = self.reader.poll_idle().await? else {
            return Ok(None);
        };

        let granted = self.store.get(&uid).await?.is_some();
        if granted {
            info!(%uid, "Tag authorized, opening cash register");
            self.actuator.open().await?;
        } else {
            info!(%uid, "Unknown tag presented, access denied");
        }

        Ok(Some(AccessEvent { uid, granted }))
    }

    /// Polls forever. Errors are logged and the loop carries on.
    #[instrument(skip(self), fields(actuator = %self.actuator.describe()))]
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "Access monitor started");
        loop {
            ticker.tick().await;
            match self.check_once().await {
                Ok(Some(event)) => debug!(uid = %event.uid, granted = event.granted, "Access check"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Access check failed"),
            }
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
