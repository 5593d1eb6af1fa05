//! `campus-core` — configuration, errors and time primitives shared by every
//! campus backend crate.

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CampusConfig;
pub use error::{CampusError, Result};
