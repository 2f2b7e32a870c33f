//! # rfidreg Core
//!
//! Core types, errors, and traits for the RFID tag registry.
//!
//! This crate provides the foundational building blocks used by all other rfidreg crates:
//!
//! - **Types**: Tag UIDs, tag records and registration requests
//! - **Errors**: The registry error taxonomy, one variant per user-visible failure kind
//! - **Constants**: Defaults for timeouts, polling and the store file format
//! - **Traits**: The tag store and reader device seams
//!
//! ## Example
//!
//! ```rust
//! use rfidreg_core::{TagRecord, TagUid};
//!
//! let uid = TagUid::from_bytes(&[0x04, 0xA1, 0xB2, 0xC3]);
//! assert_eq!(uid.as_str(), "0x04A1B2C3");
//!
//! let record = TagRecord::new(uid, "alice", chrono::Utc::now()).unwrap();
//! let json = serde_json::to_string(&record).unwrap();
//! assert!(json.contains("alice"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{RegistryError, Result};
pub use traits::*;
pub use types::*;
