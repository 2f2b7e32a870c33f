//! # rfidreg Coordinator
//!
//! Orchestrates "arm reader → wait for scan → bind UID to username →
//! persist" and exposes the registry operations to external callers.
//!
//! - [`RegistrationCoordinator`]: one attempt at a time, registry-wide,
//!   with timeout and cancellation
//! - [`RegistryService`]: thin façade used by the HTTP layer and the CLI
//! - [`AccessMonitor`]: between registrations, pulses the cash register
//!   relay for every registered tag presented to the reader
//!
//! ## Example
//!
//! ```rust,ignore
//! use rfidreg_coordinator::{CoordinatorConfig, RegistryService};
//!
//! let service = RegistryService::new(store, reader, CoordinatorConfig::default());
//! let record = service.register_tag(&RegistrationRequest::new("alice")).await?;
//! println!("{} is now bound to {}", record.uid, record.username);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod coordinator;
mod monitor;
mod service;

pub use coordinator::{CoordinatorConfig, RegistrationCoordinator};
pub use monitor::{AccessEvent, AccessMonitor};
pub use service::{ReaderStatus, RegistryService};
