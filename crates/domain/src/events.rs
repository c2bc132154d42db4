//! Domain Events
//!
//! Coarse-grained events representing significant state changes. Every
//! mutating operation appends its events to a per-user, append-only log;
//! payloads stay JSON so the log can be replayed or shipped without
//! schema churn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DomainEventId, UserId};

/// The closed vocabulary of logged events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    WorldTickAdvanced,
    TravelStarted,
    TravelCompleted,
    CaseObjectiveAdvanced,
    FactionReputationChanged,
    CharacterRelationChanged,
    EvidenceDiscovered,
    ProgressionUpdated,
}

impl DomainEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainEventKind::WorldTickAdvanced => "world_tick_advanced",
            DomainEventKind::TravelStarted => "travel_started",
            DomainEventKind::TravelCompleted => "travel_completed",
            DomainEventKind::CaseObjectiveAdvanced => "case_objective_advanced",
            DomainEventKind::FactionReputationChanged => "faction_reputation_changed",
            DomainEventKind::CharacterRelationChanged => "character_relation_changed",
            DomainEventKind::EvidenceDiscovered => "evidence_discovered",
            DomainEventKind::ProgressionUpdated => "progression_updated",
        }
    }
}

impl std::fmt::Display for DomainEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One appended log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEventRecord {
    pub id: DomainEventId,
    pub user_id: UserId,
    /// World tick at append time, for replay ordering within a session.
    pub tick: u64,
    pub kind: DomainEventKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DomainEventRecord {
    pub fn new(
        user_id: UserId,
        tick: u64,
        kind: DomainEventKind,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DomainEventId::new(),
            user_id,
            tick,
            kind,
            payload,
            created_at,
        }
    }
}
