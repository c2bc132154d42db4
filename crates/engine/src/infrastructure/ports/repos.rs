//! Repository port traits for persistent world state.

use async_trait::async_trait;
use gumshoe_domain::{
    CaseId, CaseObjective, CaseProgress, CharacterId, CharacterRelation, DomainEventRecord,
    FactionId, FactionReputation, LocationId, PlayerProgression, QuestState, RawItemStack, Route,
    TravelMode, TravelSession, TravelSessionId, UserEvidence, UserId, VoiceId, VoiceProgression,
    WorldClock,
};

use super::error::RepoError;

// =============================================================================
// World State
// =============================================================================

/// Per-user world state: clock, progression, factions, relations, evidence,
/// and case progress. Authored case objectives are seeded once and read-only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldRepo: Send + Sync {
    // World clock
    async fn get_clock(&self, user_id: UserId) -> Result<Option<WorldClock>, RepoError>;
    async fn save_clock(&self, user_id: UserId, clock: &WorldClock) -> Result<(), RepoError>;

    // Player progression
    async fn get_player(&self, user_id: UserId) -> Result<Option<PlayerProgression>, RepoError>;
    async fn save_player(
        &self,
        user_id: UserId,
        player: &PlayerProgression,
    ) -> Result<(), RepoError>;

    // Voice progression
    async fn list_voices(&self, user_id: UserId) -> Result<Vec<VoiceProgression>, RepoError>;
    async fn get_voice(
        &self,
        user_id: UserId,
        voice_id: VoiceId,
    ) -> Result<Option<VoiceProgression>, RepoError>;
    async fn save_voice(&self, user_id: UserId, voice: &VoiceProgression)
        -> Result<(), RepoError>;

    // Faction reputation
    async fn list_factions(&self, user_id: UserId) -> Result<Vec<FactionReputation>, RepoError>;
    async fn get_faction(
        &self,
        user_id: UserId,
        faction_id: FactionId,
    ) -> Result<Option<FactionReputation>, RepoError>;
    async fn save_faction(
        &self,
        user_id: UserId,
        faction: &FactionReputation,
    ) -> Result<(), RepoError>;

    // Character relations
    async fn list_relations(&self, user_id: UserId) -> Result<Vec<CharacterRelation>, RepoError>;
    async fn get_relation(
        &self,
        user_id: UserId,
        character_id: CharacterId,
    ) -> Result<Option<CharacterRelation>, RepoError>;
    async fn save_relation(
        &self,
        user_id: UserId,
        relation: &CharacterRelation,
    ) -> Result<(), RepoError>;

    // Discovered evidence
    async fn list_evidence(&self, user_id: UserId) -> Result<Vec<UserEvidence>, RepoError>;
    async fn save_evidence(&self, user_id: UserId, evidence: &UserEvidence)
        -> Result<(), RepoError>;

    // Case progression
    async fn get_case_progress(
        &self,
        user_id: UserId,
        case_id: CaseId,
    ) -> Result<Option<CaseProgress>, RepoError>;
    async fn save_case_progress(
        &self,
        user_id: UserId,
        progress: &CaseProgress,
    ) -> Result<(), RepoError>;

    /// Authored objectives for a case, unordered; callers sort by `sort_order`.
    async fn list_case_objectives(&self, case_id: CaseId) -> Result<Vec<CaseObjective>, RepoError>;
}

// =============================================================================
// Travel
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TravelRepo: Send + Sync {
    async fn get_session(
        &self,
        session_id: TravelSessionId,
    ) -> Result<Option<TravelSession>, RepoError>;
    async fn save_session(&self, session: &TravelSession) -> Result<(), RepoError>;

    /// The user's open session, if any. At most one is open at a time.
    async fn find_in_progress(&self, user_id: UserId)
        -> Result<Option<TravelSession>, RepoError>;

    /// Most recently completed session: latest arrival tick, ties broken by
    /// latest start tick. Determines the user's current location.
    async fn latest_completed(&self, user_id: UserId)
        -> Result<Option<TravelSession>, RepoError>;

    /// An active route matching endpoints and mode, if one is declared.
    async fn find_route(
        &self,
        from: LocationId,
        to: LocationId,
        mode: TravelMode,
    ) -> Result<Option<Route>, RepoError>;
}

// =============================================================================
// Event Log
// =============================================================================

/// Append-only journal of domain events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventLogRepo: Send + Sync {
    async fn append(&self, record: &DomainEventRecord) -> Result<(), RepoError>;

    /// The user's most recent records, newest first.
    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<DomainEventRecord>, RepoError>;
}

// =============================================================================
// Quest & Inventory Snapshots
// =============================================================================

/// Persisted quest state rows before sanitization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestSnapshot {
    pub quest_id: String,
    pub status: String,
    pub stage: String,
    #[serde(default)]
    pub completed_objective_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
}

/// Persisted inventory snapshot before sanitization.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInventorySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub money: Option<f64>,
    #[serde(default)]
    pub items: Vec<RawItemStack>,
}

/// Durable per-user save data for the session stores: quest log and
/// inventory. Writes replace the whole snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SaveGameRepo: Send + Sync {
    async fn load_quests(&self, user_id: UserId) -> Result<Vec<RawQuestSnapshot>, RepoError>;
    async fn replace_quests(
        &self,
        user_id: UserId,
        quests: &[QuestState],
    ) -> Result<(), RepoError>;

    async fn load_inventory(
        &self,
        user_id: UserId,
    ) -> Result<Option<RawInventorySnapshot>, RepoError>;
    async fn save_inventory(
        &self,
        user_id: UserId,
        snapshot: &RawInventorySnapshot,
    ) -> Result<(), RepoError>;
}
