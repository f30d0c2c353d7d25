//! Warden Core: domain models, error taxonomy, clock and the
//! credential-store traits every other crate builds on.

pub mod clock;
pub mod error;
pub mod models;
pub mod repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{WardenError, WardenResult};
