pub mod action;
pub mod case;
pub mod condition;
pub mod error;
pub mod events;
pub mod evidence;
pub mod game_clock;
pub mod ids;
pub mod interaction;
pub mod location;
pub mod merchant;
pub mod progression;
pub mod quest;
pub mod tension;
pub mod travel;

pub use error::DomainError;

// Re-export all id types
pub use ids::{
    CaseId, CharacterId, DistrictId, DomainEventId, EntryId, EvidenceId, FactionId, ItemId,
    LocationId, MerchantId, ObjectiveId, PointGroupId, PointId, QuestId, RouteId, ScenarioId,
    StageId, TopicId, TravelSessionId, UserId, VoiceId,
};

// Condition evaluation and the quest-flag dialect
pub use condition::{all_conditions_met, Condition, EvalContext, QuestCondition, QuestStageView};

// Authored actions and map interactions
pub use action::{Action, ToastVariant};
pub use interaction::{
    parse_bindings, resolve_auto_interaction, resolve_interactions, resolve_qr_activation,
    PointBinding, PointState, QrActivation, ResolvedInteraction, TriggerKind,
};

// World clock, city map, travel
pub use game_clock::{TickAction, TimePhase, WorldClock, TICKS_PER_PHASE};
pub use location::{CityMap, DistrictAccessRule, LocationAvailability, DEFAULT_LOCATION_ID};
pub use travel::{travel_beat_for, Route, TravelBeat, TravelMode, TravelSession, TravelStatus};

// Case progression
pub use case::{night_gate, Approach, CaseAdvanceGate, CaseObjective, CaseProgress, CaseStatus};

// Player progression, factions, relations
pub use progression::{
    level_from_xp, voice_order, CharacterRelation, FactionDelta, FactionReputation,
    PlayerProgression, ProgressionInput, RelationDelta, VoiceProgression, VoiceXpGain,
};

// Evidence and the domain event log
pub use evidence::{conflict_for_discovery, EvidenceConflict, EvidenceDefinition, UserEvidence};
pub use events::{DomainEventKind, DomainEventRecord};

// Quests: logic, content merge, per-player state
pub use quest::{
    localized_text, merge_quest, normalize_completed_tick, normalize_objective_ids,
    normalize_stage_id, Locale, LocalizedText, Quest, QuestContent, QuestEvaluation, QuestLogic,
    QuestObjective, QuestRewards, QuestState, QuestStatus, StageAdvance, StageTransition,
    MISSING_TEXT, MISSING_TRANSLATION,
};

// Interrogation tension mechanics
pub use tension::{
    clamp_tension, effective_sweet_spot, in_sweet_spot, progress_tick, should_lockout,
    sweet_spot_visibility, EffectiveSweetSpot, InterrogationProfile, ProgressTickResult,
    StartInterrogation, SweetSpotVisibility, TensionApplyResult, TensionSession,
    DEFAULT_LOCKOUT_THRESHOLD,
};

// Items, merchants, starter inventory
pub use merchant::{
    merge_stocks, normalize_money, sanitize_item_stacks, standard_item_registry,
    standard_merchants, starter_item_stacks, ItemDefinition, ItemEffect, ItemKind, ItemRegistry,
    ItemStack, MerchantAccess, MerchantAccessRequirements, MerchantDefinition, MerchantEconomy,
    RawItemStack, StageStockRule, StockRuleMatch, StockRuleMode, STARTER_MONEY,
};
