//! Use cases - world service orchestration.
//!
//! Each module covers one slice of the world service boundary. Use cases
//! orchestrate repositories and the clock to fulfill player-facing
//! operations; session-local state lives in the stores.

pub mod case;
pub mod content;
pub mod evidence;
pub mod progression;
pub mod travel;
pub mod world;

pub use case::CaseUseCases;
pub use content::{ContentError, ContentService, GameContent};
pub use evidence::EvidenceUseCases;
pub use progression::ProgressionUseCases;
pub use travel::TravelUseCases;
pub use world::WorldUseCases;
