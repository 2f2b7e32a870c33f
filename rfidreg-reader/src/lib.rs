//! # rfidreg Reader
//!
//! Adapter around a single RFID reader that exposes one capability: wait for
//! the next tag, with a deadline, to exactly one listener at a time.
//!
//! ## Features
//!
//! - **Exclusive token**: arming the reader takes its only token; a second
//!   listener fails immediately with `ReaderBusy` instead of queuing
//! - **Deadline**: every wait is bounded and ends in `ScanTimeout`
//! - **Cancellation**: dropping the wait (or the armed handle) stops polling
//!   and releases the token on every exit path
//! - **Background polling**: `poll_idle` lets the access monitor read tags
//!   between listeners without ever holding the token
//! - **Scripted devices**: an in-process reader and relay for tests and
//!   simulation
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rfidreg_reader::{ReaderAdapter, ScriptedReader};
//!
//! let device = Arc::new(ScriptedReader::new());
//! let reader = ReaderAdapter::new(device.clone());
//!
//! device.present("TAG1".parse()?);
//! let uid = reader.await_scan(Duration::from_secs(30)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod adapter;
mod relay;
mod scripted;

pub use adapter::{ArmedReader, ReaderAdapter, ReaderConfig};
pub use relay::ScriptedRelay;
pub use scripted::{ScriptEvent, ScriptedReader};
