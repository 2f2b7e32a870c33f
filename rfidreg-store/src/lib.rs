//! # rfidreg Store
//!
//! Tag record storage for the RFID tag registry.
//!
//! This crate provides two storage backends:
//!
//! - **Memory**: Fast in-memory storage for development and testing
//! - **File**: Durable snapshot file for single-node deployments; every
//!   mutation is on disk before it is acknowledged
//!
//! ## Example
//!
//! ```rust,ignore
//! use rfidreg_store::{MemoryTagStore, TagStore};
//!
//! let store = MemoryTagStore::new();
//! let record = store.insert(uid, "alice", server_timestamp()).await?;
//!
//! // A second insert of the same UID fails instead of overwriting
//! assert!(store.insert(uid, "bob", server_timestamp()).await.is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod file;

pub use memory::MemoryTagStore;
pub use file::FileTagStore;

// Re-export the trait from core
pub use rfidreg_core::traits::TagStore;
