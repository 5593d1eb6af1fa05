//! `campus-transit` — arrival estimates from the city bus API.
//!
//! Only consulted when a reminder is created; the reminder engine itself never
//! talks to the transit API.

pub mod client;
pub mod error;
pub mod token;

pub use client::{ArrivalEstimator, TransitClient};
pub use error::{Result, TransitError};
pub use token::TokenCache;
