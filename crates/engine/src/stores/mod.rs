//! Session stores.
//!
//! Narrative state that lives with the play session rather than in the
//! world service:
//! - `world_session`: server-backed world view, one operation in flight
//! - `dossier`: flags, casebook entries, evidence cards, point states
//! - `quest_log`: registered quests and per-player progress
//! - `inventory`: purse, item stacks, and the merchant trade loop
//! - `interrogation`: the tension machine plus suspect profiles

pub mod dossier;
pub mod interrogation;
pub mod inventory;
pub mod quest_log;
pub mod world_session;

pub use dossier::{Dossier, DossierEntry, EntryKind, EvidenceCard};
pub use interrogation::Interrogation;
pub use inventory::{Inventory, TradeContext, TradeError, TradeReceipt};
pub use quest_log::QuestLog;
pub use world_session::{
    CaseAdvanceRequest, OperationKind, SessionCall, TravelCall, TravelParams, WorldSession,
    WorldView,
};
