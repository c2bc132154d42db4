//! Gumshoe Engine library.
//!
//! This crate contains the server-side services and the client-side session
//! layer of the Gumshoe narrative engine.
//!
//! ## Structure
//!
//! - `use_cases/` - World services: snapshot, clock, travel, cases,
//!   progression, evidence, and the content pipeline
//! - `stores/` - Per-session state: dossier, quest log, inventory,
//!   interrogation desk, world session
//! - `session` - `GameSession`, the facade a frontend drives
//! - `infrastructure/` - Ports plus the in-memory adapters
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod session;
pub mod stores;
pub mod use_cases;

pub use app::App;
pub use session::GameSession;
