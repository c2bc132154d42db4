//! In-memory repository implementations
//!
//! DashMap-backed adapters for the repository ports. State lives for the
//! process lifetime; a database can replace these behind the same traits
//! without touching the use cases.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use gumshoe_domain::{
    voice_order, CaseId, CaseObjective, CaseProgress, CharacterId, CharacterRelation,
    DomainEventRecord, EvidenceId, FactionId, FactionReputation, LocationId, PlayerProgression,
    QuestState, Route, RouteId, TravelMode, TravelSession, TravelSessionId, TravelStatus,
    UserEvidence, UserId, VoiceId, VoiceProgression, WorldClock,
};

use super::ports::{
    EventLogRepo, RawInventorySnapshot, RawQuestSnapshot, RepoError, SaveGameRepo, TravelRepo,
    WorldRepo,
};

// =============================================================================
// World State
// =============================================================================

#[derive(Default)]
pub struct MemoryWorldRepo {
    clocks: DashMap<UserId, WorldClock>,
    players: DashMap<UserId, PlayerProgression>,
    voices: DashMap<(UserId, VoiceId), VoiceProgression>,
    factions: DashMap<(UserId, FactionId), FactionReputation>,
    relations: DashMap<(UserId, CharacterId), CharacterRelation>,
    evidence: DashMap<(UserId, EvidenceId), UserEvidence>,
    case_progress: DashMap<(UserId, CaseId), CaseProgress>,
    case_objectives: DashMap<CaseId, Vec<CaseObjective>>,
}

impl MemoryWorldRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the authored objective list for a case. Called once at
    /// startup from the content pack.
    pub fn seed_case_objectives(&self, case_id: CaseId, objectives: Vec<CaseObjective>) {
        self.case_objectives.insert(case_id, objectives);
    }
}

#[async_trait]
impl WorldRepo for MemoryWorldRepo {
    async fn get_clock(&self, user_id: UserId) -> Result<Option<WorldClock>, RepoError> {
        Ok(self.clocks.get(&user_id).map(|entry| *entry.value()))
    }

    async fn save_clock(&self, user_id: UserId, clock: &WorldClock) -> Result<(), RepoError> {
        self.clocks.insert(user_id, *clock);
        Ok(())
    }

    async fn get_player(&self, user_id: UserId) -> Result<Option<PlayerProgression>, RepoError> {
        Ok(self.players.get(&user_id).map(|entry| *entry.value()))
    }

    async fn save_player(
        &self,
        user_id: UserId,
        player: &PlayerProgression,
    ) -> Result<(), RepoError> {
        self.players.insert(user_id, *player);
        Ok(())
    }

    async fn list_voices(&self, user_id: UserId) -> Result<Vec<VoiceProgression>, RepoError> {
        let order = voice_order();
        let position =
            |id: &VoiceId| order.iter().position(|v| v == id).unwrap_or(order.len());

        let mut voices: Vec<VoiceProgression> = self
            .voices
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        voices.sort_by(|a, b| {
            position(&a.voice_id)
                .cmp(&position(&b.voice_id))
                .then_with(|| a.voice_id.cmp(&b.voice_id))
        });
        Ok(voices)
    }

    async fn get_voice(
        &self,
        user_id: UserId,
        voice_id: VoiceId,
    ) -> Result<Option<VoiceProgression>, RepoError> {
        Ok(self
            .voices
            .get(&(user_id, voice_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_voice(
        &self,
        user_id: UserId,
        voice: &VoiceProgression,
    ) -> Result<(), RepoError> {
        self.voices
            .insert((user_id, voice.voice_id.clone()), voice.clone());
        Ok(())
    }

    async fn list_factions(&self, user_id: UserId) -> Result<Vec<FactionReputation>, RepoError> {
        let mut factions: Vec<FactionReputation> = self
            .factions
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        factions.sort_by(|a, b| a.faction_id.cmp(&b.faction_id));
        Ok(factions)
    }

    async fn get_faction(
        &self,
        user_id: UserId,
        faction_id: FactionId,
    ) -> Result<Option<FactionReputation>, RepoError> {
        Ok(self
            .factions
            .get(&(user_id, faction_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_faction(
        &self,
        user_id: UserId,
        faction: &FactionReputation,
    ) -> Result<(), RepoError> {
        self.factions
            .insert((user_id, faction.faction_id.clone()), faction.clone());
        Ok(())
    }

    async fn list_relations(&self, user_id: UserId) -> Result<Vec<CharacterRelation>, RepoError> {
        let mut relations: Vec<CharacterRelation> = self
            .relations
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        relations.sort_by(|a, b| a.character_id.cmp(&b.character_id));
        Ok(relations)
    }

    async fn get_relation(
        &self,
        user_id: UserId,
        character_id: CharacterId,
    ) -> Result<Option<CharacterRelation>, RepoError> {
        Ok(self
            .relations
            .get(&(user_id, character_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_relation(
        &self,
        user_id: UserId,
        relation: &CharacterRelation,
    ) -> Result<(), RepoError> {
        self.relations
            .insert((user_id, relation.character_id.clone()), relation.clone());
        Ok(())
    }

    async fn list_evidence(&self, user_id: UserId) -> Result<Vec<UserEvidence>, RepoError> {
        let mut evidence: Vec<UserEvidence> = self
            .evidence
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        evidence.sort_by(|a, b| {
            a.discovered_tick
                .cmp(&b.discovered_tick)
                .then_with(|| a.evidence_id.cmp(&b.evidence_id))
        });
        Ok(evidence)
    }

    async fn save_evidence(
        &self,
        user_id: UserId,
        evidence: &UserEvidence,
    ) -> Result<(), RepoError> {
        self.evidence
            .insert((user_id, evidence.evidence_id.clone()), evidence.clone());
        Ok(())
    }

    async fn get_case_progress(
        &self,
        user_id: UserId,
        case_id: CaseId,
    ) -> Result<Option<CaseProgress>, RepoError> {
        Ok(self
            .case_progress
            .get(&(user_id, case_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_case_progress(
        &self,
        user_id: UserId,
        progress: &CaseProgress,
    ) -> Result<(), RepoError> {
        self.case_progress
            .insert((user_id, progress.case_id.clone()), progress.clone());
        Ok(())
    }

    async fn list_case_objectives(&self, case_id: CaseId) -> Result<Vec<CaseObjective>, RepoError> {
        Ok(self
            .case_objectives
            .get(&case_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

// =============================================================================
// Travel
// =============================================================================

#[derive(Default)]
pub struct MemoryTravelRepo {
    sessions: DashMap<TravelSessionId, TravelSession>,
    routes: DashMap<RouteId, Route>,
}

impl MemoryTravelRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_routes(&self, routes: Vec<Route>) {
        for route in routes {
            self.routes.insert(route.id.clone(), route);
        }
    }
}

#[async_trait]
impl TravelRepo for MemoryTravelRepo {
    async fn get_session(
        &self,
        session_id: TravelSessionId,
    ) -> Result<Option<TravelSession>, RepoError> {
        Ok(self
            .sessions
            .get(&session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save_session(&self, session: &TravelSession) -> Result<(), RepoError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_in_progress(
        &self,
        user_id: UserId,
    ) -> Result<Option<TravelSession>, RepoError> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| entry.value().user_id == user_id && entry.value().is_in_progress())
            .map(|entry| entry.value().clone()))
    }

    async fn latest_completed(
        &self,
        user_id: UserId,
    ) -> Result<Option<TravelSession>, RepoError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| {
                entry.value().user_id == user_id && entry.value().status == TravelStatus::Completed
            })
            .map(|entry| entry.value().clone())
            .max_by_key(|session| (session.arrival_tick.unwrap_or(0), session.started_tick)))
    }

    async fn find_route(
        &self,
        from: LocationId,
        to: LocationId,
        mode: TravelMode,
    ) -> Result<Option<Route>, RepoError> {
        let mut matches: Vec<Route> = self
            .routes
            .iter()
            .filter(|entry| entry.value().matches(&from, &to, mode))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.into_iter().next())
    }
}

// =============================================================================
// Event Log
// =============================================================================

#[derive(Default)]
pub struct MemoryEventLogRepo {
    records: RwLock<Vec<DomainEventRecord>>,
}

impl MemoryEventLogRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLogRepo for MemoryEventLogRepo {
    async fn append(&self, record: &DomainEventRecord) -> Result<(), RepoError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<DomainEventRecord>, RepoError> {
        let records = self.records.read().await;
        let mut recent: Vec<DomainEventRecord> = records
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        let start = recent.len().saturating_sub(limit);
        let mut recent = recent.split_off(start);
        recent.reverse();
        Ok(recent)
    }
}

// =============================================================================
// Save Games
// =============================================================================

#[derive(Default)]
pub struct MemorySaveGameRepo {
    quests: DashMap<UserId, Vec<RawQuestSnapshot>>,
    inventories: DashMap<UserId, RawInventorySnapshot>,
}

impl MemorySaveGameRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveGameRepo for MemorySaveGameRepo {
    async fn load_quests(&self, user_id: UserId) -> Result<Vec<RawQuestSnapshot>, RepoError> {
        Ok(self
            .quests
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn replace_quests(
        &self,
        user_id: UserId,
        quests: &[QuestState],
    ) -> Result<(), RepoError> {
        let rows: Vec<RawQuestSnapshot> = quests
            .iter()
            .map(|state| RawQuestSnapshot {
                quest_id: state.quest_id.as_str().to_string(),
                status: state.status.as_str().to_string(),
                stage: state.current_stage.as_str().to_string(),
                completed_objective_ids: state
                    .completed_objectives
                    .iter()
                    .map(|id| id.as_str().to_string())
                    .collect(),
                completed_at: state.completed_at_tick.map(|tick| tick as f64),
            })
            .collect();
        self.quests.insert(user_id, rows);
        Ok(())
    }

    async fn load_inventory(
        &self,
        user_id: UserId,
    ) -> Result<Option<RawInventorySnapshot>, RepoError> {
        Ok(self
            .inventories
            .get(&user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save_inventory(
        &self,
        user_id: UserId,
        snapshot: &RawInventorySnapshot,
    ) -> Result<(), RepoError> {
        self.inventories.insert(user_id, snapshot.clone());
        Ok(())
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// All in-memory adapters, shared across the use cases.
pub struct MemoryRepositories {
    pub world: Arc<MemoryWorldRepo>,
    pub travel: Arc<MemoryTravelRepo>,
    pub event_log: Arc<MemoryEventLogRepo>,
    pub save_game: Arc<MemorySaveGameRepo>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self {
            world: Arc::new(MemoryWorldRepo::new()),
            travel: Arc::new(MemoryTravelRepo::new()),
            event_log: Arc::new(MemoryEventLogRepo::new()),
            save_game: Arc::new(MemorySaveGameRepo::new()),
        }
    }
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gumshoe_domain::{DomainEventKind, QuestId, QuestStatus, StageId, TravelBeat};

    fn user() -> UserId {
        UserId::new("user_test")
    }

    #[tokio::test]
    async fn when_clock_missing_then_get_returns_none() {
        let repo = MemoryWorldRepo::new();

        assert_eq!(repo.get_clock(user()).await.unwrap(), None);

        let clock = WorldClock::new(5);
        repo.save_clock(user(), &clock).await.unwrap();
        assert_eq!(repo.get_clock(user()).await.unwrap(), Some(clock));
    }

    #[tokio::test]
    async fn when_voices_listed_then_display_order_wins_over_insertion() {
        let repo = MemoryWorldRepo::new();
        repo.save_voice(user(), &VoiceProgression::new(VoiceId::new("perception")))
            .await
            .unwrap();
        repo.save_voice(user(), &VoiceProgression::new(VoiceId::new("logic")))
            .await
            .unwrap();

        let voices = repo.list_voices(user()).await.unwrap();
        assert_eq!(voices[0].voice_id, VoiceId::new("logic"));
        assert_eq!(voices[1].voice_id, VoiceId::new("perception"));
    }

    #[tokio::test]
    async fn when_evidence_saved_twice_then_latest_row_wins() {
        let repo = MemoryWorldRepo::new();
        let first = UserEvidence {
            evidence_id: EvidenceId::new("evd_cell_key"),
            source_scene_id: None,
            source_event_id: None,
            discovered_tick: 1,
        };
        let second = UserEvidence {
            discovered_tick: 4,
            ..first.clone()
        };

        repo.save_evidence(user(), &first).await.unwrap();
        repo.save_evidence(user(), &second).await.unwrap();

        let evidence = repo.list_evidence(user()).await.unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].discovered_tick, 4);
    }

    #[tokio::test]
    async fn when_objectives_seeded_then_listed_for_their_case_only() {
        let repo = MemoryWorldRepo::new();
        let case = CaseId::new("case_01_bank");
        repo.seed_case_objectives(
            case.clone(),
            vec![CaseObjective {
                id: gumshoe_domain::ObjectiveId::new("obj_find_clara"),
                case_id: case.clone(),
                title: "Find Clara".to_string(),
                description: None,
                sort_order: 1,
                location_id: Some(LocationId::new("loc_freiburg_bank")),
            }],
        );

        assert_eq!(repo.list_case_objectives(case).await.unwrap().len(), 1);
        assert!(repo
            .list_case_objectives(CaseId::new("sandbox_karlsruhe"))
            .await
            .unwrap()
            .is_empty());
    }

    fn completed_session(to: &str, started: u64, arrival: u64) -> TravelSession {
        let mut session = TravelSession::start(
            user(),
            LocationId::new("loc_hbf"),
            LocationId::new(to),
            None,
            TravelMode::Walk,
            started,
            2,
            TravelBeat::None,
        );
        session.status = TravelStatus::Completed;
        session.arrival_tick = Some(arrival);
        session
    }

    #[tokio::test]
    async fn when_sessions_tie_on_arrival_then_later_start_wins() {
        let repo = MemoryTravelRepo::new();
        repo.save_session(&completed_session("loc_pub", 0, 6))
            .await
            .unwrap();
        repo.save_session(&completed_session("loc_tailor", 2, 6))
            .await
            .unwrap();
        repo.save_session(&completed_session("loc_apothecary", 1, 3))
            .await
            .unwrap();

        let latest = repo.latest_completed(user()).await.unwrap().unwrap();
        assert_eq!(latest.to_location_id, LocationId::new("loc_tailor"));
    }

    #[tokio::test]
    async fn when_route_duplicated_then_lowest_id_is_returned() {
        let repo = MemoryTravelRepo::new();
        let route = |id: &str, active: bool| Route {
            id: RouteId::new(id),
            from_location_id: LocationId::new("loc_hbf"),
            to_location_id: LocationId::new("loc_freiburg_bank"),
            mode: TravelMode::Tram,
            eta_ticks: 1,
            risk_level: 0,
            active,
        };
        repo.seed_routes(vec![route("route_b", true), route("route_a", true)]);

        let found = repo
            .find_route(
                LocationId::new("loc_hbf"),
                LocationId::new("loc_freiburg_bank"),
                TravelMode::Tram,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, RouteId::new("route_a"));

        let walking = repo
            .find_route(
                LocationId::new("loc_hbf"),
                LocationId::new("loc_freiburg_bank"),
                TravelMode::Walk,
            )
            .await
            .unwrap();
        assert!(walking.is_none());
    }

    #[tokio::test]
    async fn when_log_exceeds_limit_then_list_recent_returns_newest_first() {
        let repo = MemoryEventLogRepo::new();
        for tick in 0..5 {
            repo.append(&DomainEventRecord::new(
                user(),
                tick,
                DomainEventKind::WorldTickAdvanced,
                serde_json::json!({ "toTick": tick }),
                Utc::now(),
            ))
            .await
            .unwrap();
        }
        repo.append(&DomainEventRecord::new(
            UserId::new("someone_else"),
            9,
            DomainEventKind::TravelStarted,
            serde_json::json!({}),
            Utc::now(),
        ))
        .await
        .unwrap();

        let recent = repo.list_recent(user(), 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].tick, 4);
        assert_eq!(recent[2].tick, 2);
    }

    #[tokio::test]
    async fn when_quests_replaced_then_previous_rows_are_gone() {
        let repo = MemorySaveGameRepo::new();
        let state = QuestState {
            quest_id: QuestId::new("case01"),
            status: QuestStatus::Completed,
            current_stage: StageId::new("not_started"),
            completed_objectives: [gumshoe_domain::ObjectiveId::new("obj_intro")]
                .into_iter()
                .collect(),
            completed_at_tick: Some(7),
        };

        repo.replace_quests(user(), &[state.clone(), state.clone()])
            .await
            .unwrap();
        repo.replace_quests(user(), std::slice::from_ref(&state))
            .await
            .unwrap();

        let rows = repo.load_quests(user()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quest_id, "case01");
        assert_eq!(rows[0].status, "completed");
        assert_eq!(rows[0].stage, "not_started");
        assert_eq!(rows[0].completed_objective_ids, vec!["obj_intro"]);
        assert_eq!(rows[0].completed_at, Some(7.0));
    }

    #[tokio::test]
    async fn when_inventory_missing_then_load_returns_none() {
        let repo = MemorySaveGameRepo::new();
        assert!(repo.load_inventory(user()).await.unwrap().is_none());

        let snapshot = RawInventorySnapshot {
            money: Some(140.0),
            items: vec![],
        };
        repo.save_inventory(user(), &snapshot).await.unwrap();
        assert_eq!(
            repo.load_inventory(user()).await.unwrap().map(|s| s.money),
            Some(Some(140.0))
        );
    }
}
