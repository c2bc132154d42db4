//! World session store.
//!
//! Client-side view of the server-authoritative world: clock, location,
//! progression aggregates, and per-location availability. One operation may
//! be in flight at a time; a second caller gets a typed refusal naming the
//! holder instead of a silently dropped request. Every method snapshots what
//! it needs, releases the lock across the use-case call, and re-locks to
//! commit, so a slow repository never wedges readers.
//!
//! Travel runs in two phases against the server: open a session, then
//! complete it. A phase-two failure keeps the pending session and the next
//! travel call resumes completion; opening a fresh session there would only
//! earn a refusal for the overlap.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use gumshoe_domain::{
    Approach, CaseId, CaseObjective, CaseProgress, CharacterRelation, CityMap, EvidenceId,
    FactionId, FactionReputation, LocationAvailability, LocationId, ObjectiveId,
    PlayerProgression, ProgressionInput, TickAction, TravelBeat, TravelMode, TravelSession,
    UserEvidence, UserId, VoiceId, VoiceProgression, WorldClock,
};

use crate::use_cases::case::{CaseAdvanceOutcome, CaseError};
use crate::use_cases::evidence::{DiscoveryOutcome, EvidenceError};
use crate::use_cases::progression::ProgressionOutcome;
use crate::use_cases::{
    CaseUseCases, EvidenceUseCases, ProgressionUseCases, TravelUseCases, WorldUseCases,
};

/// Which operation currently holds the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Hydrate,
    Travel,
    TickTime,
    AdvanceCase,
    ApplyProgression,
    DiscoverEvidence,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Hydrate => "hydrate",
            OperationKind::Travel => "travel",
            OperationKind::TickTime => "tick_time",
            OperationKind::AdvanceCase => "advance_case",
            OperationKind::ApplyProgression => "apply_progression",
            OperationKind::DiscoverEvidence => "discover_evidence",
        }
    }
}

/// Parameters for a travel request. Only the destination is required.
#[derive(Debug, Clone)]
pub struct TravelParams {
    pub to_location_id: LocationId,
    pub mode: Option<TravelMode>,
    pub from_location_id: Option<LocationId>,
    pub case_id: Option<CaseId>,
}

impl TravelParams {
    pub fn to(to_location_id: impl Into<LocationId>) -> Self {
        Self {
            to_location_id: to_location_id.into(),
            mode: None,
            from_location_id: None,
            case_id: None,
        }
    }
}

/// Result of a travel call.
#[derive(Debug, Clone)]
pub enum TravelCall {
    /// Origin and destination match; nothing moved and no error was set.
    SameLocation,
    Arrived {
        session: TravelSession,
        world_clock: WorldClock,
        availability: LocationAvailability,
    },
    Busy {
        holder: OperationKind,
    },
    /// The failure reason is in the session error slot.
    Failed,
}

/// Result of a non-travel session call.
#[derive(Debug, Clone)]
pub enum SessionCall<T> {
    Done(T),
    Busy {
        holder: OperationKind,
    },
    /// The failure reason is in the session error slot.
    Failed,
}

impl<T> SessionCall<T> {
    pub fn done(self) -> Option<T> {
        match self {
            SessionCall::Done(value) => Some(value),
            _ => None,
        }
    }
}

/// Parameters for a case advance.
#[derive(Debug, Clone)]
pub struct CaseAdvanceRequest {
    pub case_id: CaseId,
    pub next_objective_id: ObjectiveId,
    pub location_id: Option<LocationId>,
    pub approach: Approach,
}

/// Point-in-time copy of the session for rendering.
#[derive(Debug, Clone)]
pub struct WorldView {
    pub hydrated: bool,
    pub world_clock: WorldClock,
    pub player: PlayerProgression,
    pub voices: Vec<VoiceProgression>,
    pub factions: Vec<FactionReputation>,
    pub relations: Vec<CharacterRelation>,
    pub evidence: Vec<UserEvidence>,
    pub objectives: Vec<CaseObjective>,
    pub active_case: Option<CaseProgress>,
    pub current_location_id: LocationId,
    pub last_travel_beat: Option<TravelBeat>,
    pub availability: HashMap<LocationId, LocationAvailability>,
    pub error: Option<String>,
}

impl WorldView {
    fn initial(current_location_id: LocationId) -> Self {
        Self {
            hydrated: false,
            world_clock: WorldClock::default(),
            player: PlayerProgression::default(),
            voices: Vec::new(),
            factions: Vec::new(),
            relations: Vec::new(),
            evidence: Vec::new(),
            objectives: Vec::new(),
            active_case: None,
            current_location_id,
            last_travel_beat: None,
            availability: HashMap::new(),
            error: None,
        }
    }
}

struct State {
    view: WorldView,
    in_flight: Option<OperationKind>,
    pending_travel: Option<TravelSession>,
}

/// See module docs.
pub struct WorldSession {
    user_id: UserId,
    case_id: Option<CaseId>,
    world: Arc<WorldUseCases>,
    travel: Arc<TravelUseCases>,
    cases: Arc<CaseUseCases>,
    progression: Arc<ProgressionUseCases>,
    evidence: Arc<EvidenceUseCases>,
    state: Mutex<State>,
}

impl WorldSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        case_id: Option<CaseId>,
        city: &CityMap,
        world: Arc<WorldUseCases>,
        travel: Arc<TravelUseCases>,
        cases: Arc<CaseUseCases>,
        progression: Arc<ProgressionUseCases>,
        evidence: Arc<EvidenceUseCases>,
    ) -> Self {
        let start = city.default_location_for_case(case_id.as_ref());
        Self {
            user_id,
            case_id,
            world,
            travel,
            cases,
            progression,
            evidence,
            state: Mutex::new(State {
                view: WorldView::initial(start),
                in_flight: None,
                pending_travel: None,
            }),
        }
    }

    /// Point-in-time copy of the session view.
    pub async fn view(&self) -> WorldView {
        self.state.lock().await.view.clone()
    }

    /// Faction standings keyed for merchant gates.
    pub async fn faction_reputation(&self) -> HashMap<FactionId, i64> {
        let state = self.state.lock().await;
        state
            .view
            .factions
            .iter()
            .map(|f| (f.faction_id.clone(), f.reputation))
            .collect()
    }

    /// Voice levels keyed for the interrogation sweet spot.
    pub async fn voice_levels(&self) -> HashMap<VoiceId, u32> {
        let state = self.state.lock().await;
        state
            .view
            .voices
            .iter()
            .map(|v| (v.voice_id.clone(), v.level))
            .collect()
    }

    /// Overrides the local location without touching the server. Teleport
    /// actions use this.
    pub async fn set_current_location(&self, location_id: LocationId) {
        let mut state = self.state.lock().await;
        state.view.current_location_id = location_id;
    }

    pub async fn clear_error(&self) {
        let mut state = self.state.lock().await;
        state.view.error = None;
    }

    async fn begin(&self, op: OperationKind) -> Result<(), OperationKind> {
        let mut state = self.state.lock().await;
        if let Some(holder) = state.in_flight {
            return Err(holder);
        }
        state.in_flight = Some(op);
        state.view.error = None;
        Ok(())
    }

    async fn fail(&self, message: &str) {
        let mut state = self.state.lock().await;
        state.in_flight = None;
        state.view.error = Some(message.to_string());
    }

    /// Fetches the world snapshot and replaces local state with it.
    pub async fn hydrate(&self) -> SessionCall<WorldView> {
        if let Err(holder) = self.begin(OperationKind::Hydrate).await {
            return SessionCall::Busy { holder };
        }

        let result = self
            .world
            .get_snapshot
            .execute(self.user_id.clone(), self.case_id.clone())
            .await;

        match result {
            Ok(snapshot) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                state.view.world_clock = snapshot.world_clock;
                state.view.player = snapshot.player;
                state.view.factions = snapshot.factions;
                state.view.relations = snapshot.relations;
                state.view.evidence = snapshot.evidence;
                state.view.objectives = snapshot.objectives;
                state.view.active_case = snapshot.active_case;
                state.view.current_location_id = snapshot.current_location_id.clone();
                state
                    .view
                    .availability
                    .insert(snapshot.current_location_id, snapshot.location_availability);
                state.view.hydrated = true;
                SessionCall::Done(state.view.clone())
            }
            Err(error) => {
                warn!(%error, "world snapshot fetch failed");
                self.fail("Failed to fetch world snapshot").await;
                SessionCall::Failed
            }
        }
    }

    /// Moves the detective, two phases against the server. The same-location
    /// no-op is checked before anything is touched.
    pub async fn travel(&self, params: TravelParams) -> TravelCall {
        enum Opening {
            Resume(TravelSession),
            Fresh(LocationId),
        }

        let opening = {
            let mut state = self.state.lock().await;
            if let Some(holder) = state.in_flight {
                return TravelCall::Busy { holder };
            }
            match state.pending_travel.clone() {
                Some(pending) => {
                    state.in_flight = Some(OperationKind::Travel);
                    state.view.error = None;
                    Opening::Resume(pending)
                }
                None => {
                    let from = params
                        .from_location_id
                        .clone()
                        .unwrap_or_else(|| state.view.current_location_id.clone());
                    if from == params.to_location_id {
                        return TravelCall::SameLocation;
                    }
                    state.in_flight = Some(OperationKind::Travel);
                    state.view.error = None;
                    Opening::Fresh(from)
                }
            }
        };

        let session = match opening {
            Opening::Resume(session) => session,
            Opening::Fresh(from) => {
                let mode = params.mode.unwrap_or_default();
                let case_id = params.case_id.clone().or_else(|| self.case_id.clone());
                let started = self
                    .travel
                    .start_travel
                    .execute(
                        self.user_id.clone(),
                        from,
                        params.to_location_id.clone(),
                        mode,
                        case_id,
                    )
                    .await;
                match started {
                    Ok(outcome) => {
                        let mut state = self.state.lock().await;
                        state.pending_travel = Some(outcome.session.clone());
                        outcome.session
                    }
                    Err(error) => {
                        warn!(%error, "travel start failed");
                        self.fail("Failed to start travel session").await;
                        return TravelCall::Failed;
                    }
                }
            }
        };

        let completed = self
            .travel
            .complete_travel
            .execute(self.user_id.clone(), session.id)
            .await;

        match completed {
            Ok(outcome) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                state.pending_travel = None;
                state.view.world_clock = outcome.world_clock;
                state.view.current_location_id = outcome.session.to_location_id.clone();
                state.view.last_travel_beat = Some(outcome.session.beat.clone());
                state.view.availability.insert(
                    outcome.session.to_location_id.clone(),
                    outcome.location_availability.clone(),
                );
                TravelCall::Arrived {
                    session: outcome.session,
                    world_clock: outcome.world_clock,
                    availability: outcome.location_availability,
                }
            }
            Err(error) => {
                warn!(%error, "travel completion failed; session stays pending");
                self.fail("Failed to complete travel session").await;
                TravelCall::Failed
            }
        }
    }

    /// Advances the world clock for a non-travel player action.
    pub async fn tick_time(
        &self,
        action: TickAction,
        ticks: Option<i64>,
    ) -> SessionCall<WorldClock> {
        if let Err(holder) = self.begin(OperationKind::TickTime).await {
            return SessionCall::Busy { holder };
        }

        let result = self
            .world
            .tick_time
            .execute(self.user_id.clone(), action, ticks)
            .await;

        match result {
            Ok(clock) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                state.view.world_clock = clock;
                SessionCall::Done(clock)
            }
            Err(error) => {
                warn!(%error, "world tick failed");
                self.fail("Failed to advance world clock").await;
                SessionCall::Failed
            }
        }
    }

    /// Attempts a case advance. A blocked advance is world-visible: the
    /// clock committed server-side, so it commits here too, along with the
    /// refusal reason and a closed availability entry for the location.
    pub async fn advance_case(
        &self,
        request: CaseAdvanceRequest,
    ) -> SessionCall<CaseAdvanceOutcome> {
        if let Err(holder) = self.begin(OperationKind::AdvanceCase).await {
            return SessionCall::Busy { holder };
        }

        let result: Result<CaseAdvanceOutcome, CaseError> = self
            .cases
            .advance_case
            .execute(
                self.user_id.clone(),
                request.case_id,
                request.next_objective_id,
                request.location_id.clone(),
                request.approach,
            )
            .await;

        match result {
            Ok(outcome) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                match &outcome {
                    CaseAdvanceOutcome::Blocked {
                        reason,
                        alternatives,
                        world_clock,
                    } => {
                        state.view.world_clock = *world_clock;
                        state.view.error = Some(reason.clone());
                        if let Some(location_id) = request.location_id {
                            state.view.availability.insert(
                                location_id,
                                LocationAvailability::closed(reason.clone(), alternatives.clone()),
                            );
                        }
                    }
                    CaseAdvanceOutcome::Advanced {
                        case_progress,
                        world_clock,
                        faction_reputation,
                    } => {
                        state.view.world_clock = *world_clock;
                        state.view.active_case = Some(case_progress.clone());
                        state.view.factions = faction_reputation.clone();
                        if let Some(location_id) = request.location_id {
                            state
                                .view
                                .availability
                                .insert(location_id, LocationAvailability::open());
                        }
                    }
                }
                SessionCall::Done(outcome)
            }
            Err(error) => {
                warn!(%error, "case advance failed");
                self.fail("Failed to advance case").await;
                SessionCall::Failed
            }
        }
    }

    /// Applies a progression batch and folds the returned aggregates in.
    /// Voices come back as touched rows only, so they upsert rather than
    /// replace.
    pub async fn apply_progression(
        &self,
        input: ProgressionInput,
    ) -> SessionCall<ProgressionOutcome> {
        if let Err(holder) = self.begin(OperationKind::ApplyProgression).await {
            return SessionCall::Busy { holder };
        }

        let result = self
            .progression
            .apply
            .execute(self.user_id.clone(), input)
            .await;

        match result {
            Ok(outcome) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                state.view.player = outcome.player;
                for voice in &outcome.voices {
                    match state
                        .view
                        .voices
                        .iter_mut()
                        .find(|v| v.voice_id == voice.voice_id)
                    {
                        Some(row) => *row = voice.clone(),
                        None => state.view.voices.push(voice.clone()),
                    }
                }
                state.view.factions = outcome.factions.clone();
                state.view.relations = outcome.relations.clone();
                SessionCall::Done(outcome)
            }
            Err(error) => {
                warn!(%error, "progression apply failed");
                self.fail("Failed to apply progression").await;
                SessionCall::Failed
            }
        }
    }

    /// Records an evidence discovery and upserts the returned row in place.
    pub async fn discover_evidence(
        &self,
        evidence_id: EvidenceId,
        source_scene_id: Option<String>,
        source_event_id: Option<String>,
    ) -> SessionCall<DiscoveryOutcome> {
        if let Err(holder) = self.begin(OperationKind::DiscoverEvidence).await {
            return SessionCall::Busy { holder };
        }

        let result = self
            .evidence
            .discover
            .execute(
                self.user_id.clone(),
                evidence_id,
                source_scene_id,
                source_event_id,
            )
            .await;

        match result {
            Ok(outcome) => {
                let mut state = self.state.lock().await;
                state.in_flight = None;
                let row = outcome.evidence.clone();
                match state
                    .view
                    .evidence
                    .iter_mut()
                    .find(|e| e.evidence_id == row.evidence_id)
                {
                    Some(existing) => *existing = row,
                    None => state.view.evidence.push(row),
                }
                SessionCall::Done(outcome)
            }
            Err(error @ EvidenceError::UnknownEvidence(_)) => {
                self.fail(&error.to_string()).await;
                SessionCall::Failed
            }
            Err(error) => {
                warn!(%error, "evidence discovery failed");
                self.fail("Failed to discover evidence").await;
                SessionCall::Failed
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn hold_for_test(&self, op: OperationKind) {
        self.state.lock().await.in_flight = Some(op);
    }

    #[cfg(test)]
    pub(crate) async fn release_for_test(&self) {
        self.state.lock().await.in_flight = None;
    }
}
