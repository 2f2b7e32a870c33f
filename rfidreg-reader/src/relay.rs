//! In-process cash register relay.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use rfidreg_core::constants::RELAY_PULSE;
use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::Actuator;

#[derive(Debug, Default)]
struct RelayState {
    pulses: u64,
    faults: u32,
}

/// Relay double that counts pulses instead of driving an output pin.
///
/// Used by tests and by the CLI's simulation mode.
#[derive(Debug)]
pub struct ScriptedRelay {
    pulse: Duration,
    state: Mutex<RelayState>,
}

impl ScriptedRelay {
    /// Creates a relay with the default pulse length.
    pub fn new() -> Self {
        Self::with_pulse(RELAY_PULSE)
    }

    /// Creates a relay whose `open` lasts `pulse`.
    pub fn with_pulse(pulse: Duration) -> Self {
        Self {
            pulse,
            state: Mutex::new(RelayState::default()),
        }
    }

    /// Makes the next `open` fail.
    pub fn fail_next(&self) {
        self.state.lock().faults += 1;
    }

    /// Number of completed pulses.
    pub fn pulse_count(&self) -> u64 {
        self.state.lock().pulses
    }
}

impl Default for ScriptedRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actuator for ScriptedRelay {
    async fn open(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.faults > 0 {
                state.faults -= 1;
                return Err(RegistryError::ReaderUnavailable("relay output fault".into()));
            }
        }

        tokio::time::sleep(self.pulse).await;

        let pulses = {
            let mut state = self.state.lock();
            state.pulses += 1;
            state.pulses
        };
        info!(pulses, pulse_ms = self.pulse.as_millis() as u64, "Cash register opened");
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted relay".into()
    }
}
