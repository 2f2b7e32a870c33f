//! App state: registry service and config.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use rfidreg_coordinator::{CoordinatorConfig, RegistryService};
use rfidreg_core::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_SCAN_TIMEOUT};
use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::{ReaderDevice, TagStore};
use rfidreg_reader::{ReaderAdapter, ReaderConfig};
use rfidreg_store::{FileTagStore, MemoryTagStore};

/// Service configuration.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Store file; `None` keeps records in memory only
    pub store_path: Option<PathBuf>,
    /// How long a registration waits for a tag
    pub scan_timeout: Duration,
    /// Delay between reader polls
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from the environment (and `.env`, if present).
    ///
    /// - `RFIDREG_STORE_PATH`
    /// - `RFIDREG_SCAN_TIMEOUT_SECS`
    /// - `RFIDREG_POLL_INTERVAL_MS`
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self {
            store_path: std::env::var_os("RFIDREG_STORE_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            ..Self::default()
        };

        if let Some(secs) = parse_env("RFIDREG_SCAN_TIMEOUT_SECS")? {
            config.scan_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env("RFIDREG_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_env(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RegistryError::Config(format!("{} must be an integer, got '{}'", key, value))),
        Err(_) => Ok(None),
    }
}

/// Shared state behind every handler.
pub struct AppState {
    /// Active configuration
    pub config: ServiceConfig,
    /// Registry operations
    pub service: RegistryService,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Builds the state over an existing store and reader device.
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn TagStore>,
        device: Arc<dyn ReaderDevice>,
    ) -> Result<Self> {
        let coordinator = CoordinatorConfig::new().scan_timeout(config.scan_timeout)?;
        let reader = ReaderAdapter::with_config(
            device,
            ReaderConfig::new().poll_interval(config.poll_interval),
        );

        Ok(Self {
            service: RegistryService::new(store, reader, coordinator),
            config,
            started_at: Instant::now(),
        })
    }

    /// Opens the store named by the config and builds the state.
    pub async fn open(config: ServiceConfig, device: Arc<dyn ReaderDevice>) -> Result<Self> {
        let store: Arc<dyn TagStore> = match &config.store_path {
            Some(path) => {
                let store = FileTagStore::new(path).await?;
                info!(path = %path.display(), tags = store.len(), "Opened tag store");
                Arc::new(store)
            }
            None => {
                info!("Using in-memory tag store");
                Arc::new(MemoryTagStore::new())
            }
        };

        Self::new(config, store, device)
    }
}
