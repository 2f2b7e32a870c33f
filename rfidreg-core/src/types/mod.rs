//! Domain types for the tag registry.
//!
//! - [`TagUid`]: Identifier read from a tag by the reader hardware
//! - [`TagRecord`]: A UID bound to a username
//! - [`RegistrationRequest`]: Input to a registration attempt
//! - [`AttemptState`]: Coordinator state of a registration attempt

mod uid;
mod record;
mod attempt;

pub use uid::*;
pub use record::*;
pub use attempt::*;
