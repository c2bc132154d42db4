//! Infrastructure implementations.
//!
//! Contains port trait implementations: the system clock and the
//! in-memory repositories backing the world services.

pub mod clock;
pub mod memory;
pub mod ports;
