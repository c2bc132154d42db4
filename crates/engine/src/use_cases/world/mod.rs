//! World snapshot and clock use cases.
//!
//! The snapshot assembles everything a session hydrates from: clock,
//! location, progression aggregates, case state, and discovered evidence.
//! Ticking is the only way the world clock moves.

use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    CaseId, CaseObjective, CaseProgress, CharacterRelation, CityMap, DomainEventKind,
    DomainEventRecord, FactionReputation, LocationAvailability, LocationId, PlayerProgression,
    TickAction, UserEvidence, UserId, WorldClock,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, RepoError, TravelRepo, WorldRepo};

/// Container for world use cases.
pub struct WorldUseCases {
    pub get_snapshot: Arc<GetWorldSnapshot>,
    pub tick_time: Arc<TickTime>,
}

impl WorldUseCases {
    pub fn new(get_snapshot: Arc<GetWorldSnapshot>, tick_time: Arc<TickTime>) -> Self {
        Self {
            get_snapshot,
            tick_time,
        }
    }
}

/// Errors from world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

// =============================================================================
// Ensure helpers
// =============================================================================

/// Load the user's clock, seeding tick zero on first contact.
pub(crate) async fn ensure_clock(
    world_repo: &dyn WorldRepo,
    user_id: &UserId,
) -> Result<WorldClock, RepoError> {
    if let Some(clock) = world_repo.get_clock(user_id.clone()).await? {
        return Ok(clock);
    }
    let initial = WorldClock::default();
    world_repo.save_clock(user_id.clone(), &initial).await?;
    Ok(initial)
}

/// Load the user's progression, seeding the level-one default on first
/// contact.
pub(crate) async fn ensure_player(
    world_repo: &dyn WorldRepo,
    user_id: &UserId,
) -> Result<PlayerProgression, RepoError> {
    if let Some(player) = world_repo.get_player(user_id.clone()).await? {
        return Ok(player);
    }
    let initial = PlayerProgression::default();
    world_repo.save_player(user_id.clone(), &initial).await?;
    Ok(initial)
}

// =============================================================================
// World Snapshot
// =============================================================================

/// Everything a session needs to hydrate, in one read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub world_clock: WorldClock,
    pub current_location_id: LocationId,
    pub player: PlayerProgression,
    pub factions: Vec<FactionReputation>,
    pub relations: Vec<CharacterRelation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_case: Option<CaseProgress>,
    pub objectives: Vec<CaseObjective>,
    pub evidence: Vec<UserEvidence>,
    /// Availability of the current location at the current phase.
    pub location_availability: LocationAvailability,
}

/// Assemble the world snapshot for a user.
///
/// The current location is derived, not stored: the destination of the
/// most recently completed travel session, or the case's default start.
pub struct GetWorldSnapshot {
    world_repo: Arc<dyn WorldRepo>,
    travel_repo: Arc<dyn TravelRepo>,
    city: Arc<CityMap>,
}

impl GetWorldSnapshot {
    pub fn new(
        world_repo: Arc<dyn WorldRepo>,
        travel_repo: Arc<dyn TravelRepo>,
        city: Arc<CityMap>,
    ) -> Self {
        Self {
            world_repo,
            travel_repo,
            city,
        }
    }

    pub async fn execute(
        &self,
        user_id: UserId,
        case_id: Option<CaseId>,
    ) -> Result<WorldSnapshot, WorldError> {
        let world_clock = ensure_clock(self.world_repo.as_ref(), &user_id).await?;
        let player = ensure_player(self.world_repo.as_ref(), &user_id).await?;

        let factions = self.world_repo.list_factions(user_id.clone()).await?;
        let relations = self.world_repo.list_relations(user_id.clone()).await?;
        let evidence = self.world_repo.list_evidence(user_id.clone()).await?;
        let latest_completed = self.travel_repo.latest_completed(user_id.clone()).await?;

        let (active_case, mut objectives) = match &case_id {
            Some(case_id) => (
                self.world_repo
                    .get_case_progress(user_id.clone(), case_id.clone())
                    .await?,
                self.world_repo
                    .list_case_objectives(case_id.clone())
                    .await?,
            ),
            None => (None, Vec::new()),
        };
        objectives.sort_by_key(|objective| objective.sort_order);

        let current_location_id = latest_completed
            .map(|session| session.to_location_id)
            .unwrap_or_else(|| self.city.default_location_for_case(case_id.as_ref()));
        let location_availability = self
            .city
            .availability(&current_location_id, world_clock.phase);

        Ok(WorldSnapshot {
            world_clock,
            current_location_id,
            player,
            factions,
            relations,
            active_case,
            objectives,
            evidence,
            location_availability,
        })
    }
}

// =============================================================================
// Time Tick
// =============================================================================

/// Advance the world clock by the cost of a player action.
///
/// Travel ticks take their count from the payload; negatives clamp to
/// zero, so a hostile payload can at worst freeze the clock for one call.
pub struct TickTime {
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
}

impl TickTime {
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
        action: TickAction,
        ticks: Option<i64>,
    ) -> Result<WorldClock, WorldError> {
        let current = ensure_clock(self.world_repo.as_ref(), &user_id).await?;

        let payload_ticks = ticks.map(|t| t.max(0) as u64);
        let delta = action.tick_cost(payload_ticks);
        let next = current.advanced(delta);

        self.world_repo.save_clock(user_id.clone(), &next).await?;
        self.event_log
            .append(&DomainEventRecord::new(
                user_id,
                next.tick,
                DomainEventKind::WorldTickAdvanced,
                serde_json::json!({
                    "actionType": action.as_str(),
                    "delta": delta,
                    "fromTick": current.tick,
                    "toTick": next.tick,
                }),
                self.clock.now(),
            ))
            .await?;

        Ok(next)
    }
}
