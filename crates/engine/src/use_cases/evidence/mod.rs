//! Evidence discovery use case.
//!
//! Discovery is an idempotent upsert against the authored catalog. A
//! conflict comes back when the new piece contradicts something already
//! held; holding both is allowed, the dossier just flags it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    conflict_for_discovery, DomainEventKind, DomainEventRecord, EvidenceConflict,
    EvidenceDefinition, EvidenceId, UserEvidence, UserId,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, RepoError, WorldRepo};
use crate::use_cases::world::ensure_clock;

/// Container for evidence use cases.
pub struct EvidenceUseCases {
    pub discover: Arc<DiscoverEvidence>,
}

impl EvidenceUseCases {
    pub fn new(discover: Arc<DiscoverEvidence>) -> Self {
        Self { discover }
    }
}

/// Errors from evidence operations.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("Unknown evidence id")]
    UnknownEvidence(EvidenceId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutcome {
    pub evidence: UserEvidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<EvidenceConflict>,
}

/// Record a piece of evidence as discovered at the current tick.
pub struct DiscoverEvidence {
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
    catalog: Arc<HashMap<EvidenceId, EvidenceDefinition>>,
}

impl DiscoverEvidence {
    pub fn new(
        world_repo: Arc<dyn WorldRepo>,
        event_log: Arc<dyn EventLogRepo>,
        clock: Arc<dyn ClockPort>,
        catalog: Arc<HashMap<EvidenceId, EvidenceDefinition>>,
    ) -> Self {
        Self {
            world_repo,
            event_log,
            clock,
            catalog,
        }
    }

    pub async fn execute(
        &self,
        user_id: UserId,
        evidence_id: EvidenceId,
        source_scene_id: Option<String>,
        source_event_id: Option<String>,
    ) -> Result<DiscoveryOutcome, EvidenceError> {
        let definition = self
            .catalog
            .get(&evidence_id)
            .ok_or_else(|| EvidenceError::UnknownEvidence(evidence_id.clone()))?;

        let world_clock = ensure_clock(self.world_repo.as_ref(), &user_id).await?;
        let held: Vec<EvidenceId> = self
            .world_repo
            .list_evidence(user_id.clone())
            .await?
            .into_iter()
            .map(|row| row.evidence_id)
            .collect();

        let record = UserEvidence {
            evidence_id: evidence_id.clone(),
            source_scene_id: source_scene_id.clone(),
            source_event_id: source_event_id.clone(),
            discovered_tick: world_clock.tick,
        };
        self.world_repo.save_evidence(user_id.clone(), &record).await?;

        let conflict = conflict_for_discovery(definition, |id| held.contains(id));

        self.event_log
            .append(&DomainEventRecord::new(
                user_id,
                world_clock.tick,
                DomainEventKind::EvidenceDiscovered,
                serde_json::json!({
                    "evidenceId": evidence_id,
                    "sourceSceneId": source_scene_id,
                    "sourceEventId": source_event_id,
                    "conflict": conflict.is_some(),
                }),
                self.clock.now(),
            ))
            .await?;

        Ok(DiscoveryOutcome {
            evidence: record,
            conflict,
        })
    }
}
