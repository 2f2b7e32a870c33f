//! Registry constants.
//!
//! Defaults shared by the reader adapter, the coordinator and the service
//! configuration.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// READER TIMING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default time an armed reader waits for a tag before giving up.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between two hardware polls while armed.
/// Matches the 250 ms request cycle of the reader firmware.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound accepted for a configured scan timeout.
pub const MAX_SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the cash register relay is held open for an authorized tag.
pub const RELAY_PULSE: Duration = Duration::from_millis(300);

// ═══════════════════════════════════════════════════════════════════════════════
// STORE FILE FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Magic bytes at the start of a tag store file.
pub const STORE_MAGIC: &[u8; 4] = b"RFID";

/// Current tag store file format version.
pub const STORE_VERSION: u8 = 1;

/// Size of the fixed store file header: magic (4) + version (1) + count (8).
pub const STORE_HEADER_SIZE: usize = 13;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum username length in UTF-8 bytes.
/// The reader firmware stores names in three 16-byte blocks.
pub const MAX_USERNAME_LEN: usize = 48;

/// Maximum UID length in characters (7-byte UIDs render as 16 chars with prefix).
pub const MAX_UID_LEN: usize = 64;

/// Prefix used when rendering raw hardware UIDs.
pub const UID_HEX_PREFIX: &str = "0x";
