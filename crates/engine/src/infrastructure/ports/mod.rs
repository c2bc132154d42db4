//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine; everything else is concrete
//! types. Ports exist for:
//! - World state storage (in-memory today, a database later)
//! - Clock (for testing)

mod error;
mod repos;
mod testing;

pub use error::RepoError;
pub use repos::*;
pub use testing::ClockPort;

#[cfg(test)]
pub use testing::MockClockPort;
