//! Progression use cases.
//!
//! One batch call updates every progression aggregate: player xp and
//! level, voice xp, faction reputation, and character relations. Each
//! aggregate change lands in the event log individually.

use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    CharacterRelation, DomainEventKind, DomainEventRecord, FactionDelta, FactionReputation,
    PlayerProgression, ProgressionInput, UserId, VoiceProgression,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, RepoError, WorldRepo};
use crate::use_cases::world::{ensure_clock, ensure_player};

/// Container for progression use cases.
pub struct ProgressionUseCases {
    pub apply: Arc<ApplyProgression>,
}

impl ProgressionUseCases {
    pub fn new(apply: Arc<ApplyProgression>) -> Self {
        Self { apply }
    }
}

/// Errors from progression operations.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Updated aggregates after a batch. Voices carry only the touched rows
/// when any were touched, otherwise the full list; factions and relations
/// are always the full lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionOutcome {
    pub player: PlayerProgression,
    pub voices: Vec<VoiceProgression>,
    pub factions: Vec<FactionReputation>,
    pub relations: Vec<CharacterRelation>,
}

/// Apply faction deltas against current reputation, logging one event per
/// faction touched, and return the full standing afterwards.
pub(crate) async fn apply_faction_deltas(
    world_repo: &dyn WorldRepo,
    event_log: &dyn EventLogRepo,
    clock: &dyn ClockPort,
    user_id: &UserId,
    tick: u64,
    deltas: &[FactionDelta],
) -> Result<Vec<FactionReputation>, RepoError> {
    for entry in deltas {
        let current = world_repo
            .get_faction(user_id.clone(), entry.faction_id.clone())
            .await?
            .map(|row| row.reputation)
            .unwrap_or(0);
        let next = FactionReputation {
            faction_id: entry.faction_id.clone(),
            reputation: current + entry.delta,
        };
        world_repo.save_faction(user_id.clone(), &next).await?;
        event_log
            .append(&DomainEventRecord::new(
                user_id.clone(),
                tick,
                DomainEventKind::FactionReputationChanged,
                serde_json::json!({
                    "factionId": next.faction_id,
                    "delta": entry.delta,
                    "reputation": next.reputation,
                }),
                clock.now(),
            ))
            .await?;
    }
    world_repo.list_factions(user_id.clone()).await
}

/// Apply one progression batch for a user.
pub struct ApplyProgression {
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
}

impl ApplyProgression {
    pub fn new(
        world_repo: Arc<dyn WorldRepo>,
        event_log: Arc<dyn EventLogRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            world_repo,
            event_log,
            clock,
        }
    }

    pub async fn execute(
        &self,
        user_id: UserId,
        input: ProgressionInput,
    ) -> Result<ProgressionOutcome, ProgressionError> {
        let world_clock = ensure_clock(self.world_repo.as_ref(), &user_id).await?;
        let mut player = ensure_player(self.world_repo.as_ref(), &user_id).await?;

        let xp_gain = input.clamped_xp_gain();
        player.gain_xp(xp_gain);
        self.world_repo.save_player(user_id.clone(), &player).await?;

        let mut updated_voices = Vec::new();
        for entry in &input.voice_xp {
            let mut voice = self
                .world_repo
                .get_voice(user_id.clone(), entry.voice_id.clone())
                .await?
                .unwrap_or_else(|| VoiceProgression::new(entry.voice_id.clone()));
            voice.gain_xp(entry.xp.max(0) as u64);
            self.world_repo.save_voice(user_id.clone(), &voice).await?;
            updated_voices.push(voice);
        }

        let factions = apply_faction_deltas(
            self.world_repo.as_ref(),
            self.event_log.as_ref(),
            self.clock.as_ref(),
            &user_id,
            world_clock.tick,
            &input.faction_delta,
        )
        .await?;

        for entry in &input.relation_delta {
            let current = self
                .world_repo
                .get_relation(user_id.clone(), entry.character_id.clone())
                .await?
                .map(|row| row.trust)
                .unwrap_or(0);
            let relation = CharacterRelation {
                character_id: entry.character_id.clone(),
                trust: current + entry.delta,
                last_interaction_tick: Some(world_clock.tick),
            };
            self.world_repo
                .save_relation(user_id.clone(), &relation)
                .await?;
            self.event_log
                .append(&DomainEventRecord::new(
                    user_id.clone(),
                    world_clock.tick,
                    DomainEventKind::CharacterRelationChanged,
                    serde_json::json!({
                        "characterId": relation.character_id,
                        "delta": entry.delta,
                        "trust": relation.trust,
                    }),
                    self.clock.now(),
                ))
                .await?;
        }

        self.event_log
            .append(&DomainEventRecord::new(
                user_id.clone(),
                world_clock.tick,
                DomainEventKind::ProgressionUpdated,
                serde_json::json!({
                    "xpGain": xp_gain,
                    "totalXp": player.xp,
                    "level": player.level,
                }),
                self.clock.now(),
            ))
            .await?;

        let voices = if updated_voices.is_empty() {
            self.world_repo.list_voices(user_id.clone()).await?
        } else {
            updated_voices
        };
        let relations = self.world_repo.list_relations(user_id).await?;

        Ok(ProgressionOutcome {
            player,
            voices,
            factions,
            relations,
        })
    }
}
