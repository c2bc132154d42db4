use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::{QuestCondition, QuestStageView};
use crate::ids::{ObjectiveId, PointId, QuestId, StageId};

// ============================================================================
// Locales & Localized Text
// ============================================================================

/// Display languages supported by authored quest content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ru,
    De,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ru => "ru",
            Locale::De => "de",
        }
    }

    /// Maps a raw language tag to a supported locale, falling back to English.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "ru" => Locale::Ru,
            "de" => Locale::De,
            _ => Locale::En,
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-locale text variants for a single display string.
///
/// Backed by a `BTreeMap` so the "first available" fallback is deterministic.
pub type LocalizedText = BTreeMap<Locale, String>;

/// Placeholder shown when a text map is missing entirely.
pub const MISSING_TEXT: &str = "[MISSING TEXT]";
/// Placeholder shown when a text map exists but has no usable variant.
pub const MISSING_TRANSLATION: &str = "[MISSING TRANS]";

/// Resolves a localized string: requested locale, then English, then the
/// first available variant. Never fails; gaps resolve to placeholder labels.
pub fn localized_text(text: Option<&LocalizedText>, locale: Locale) -> String {
    let Some(text) = text else {
        return MISSING_TEXT.to_string();
    };
    text.get(&locale)
        .or_else(|| text.get(&Locale::En))
        .or_else(|| text.values().next())
        .cloned()
        .unwrap_or_else(|| MISSING_TRANSLATION.to_string())
}

// ============================================================================
// Quest Logic (language-agnostic mechanics)
// ============================================================================

/// A single trackable goal inside a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestObjective {
    pub id: ObjectiveId,
    /// Condition that marks the objective complete when it evaluates true.
    pub condition: QuestCondition,
    /// Stage this objective belongs to; objectives without a stage are
    /// relevant throughout the quest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageId>,
    /// Map point the journal highlights while the objective is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_point_id: Option<PointId>,
}

/// A legal stage move. Fires only from `from`, only when every flag in
/// `required_flags` is raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransition {
    pub from: StageId,
    pub to: StageId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_flags: Vec<String>,
    /// Actions executed by the caller when the transition fires.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trigger_actions: Vec<Action>,
}

/// Terminal payout granted once when a quest completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRewards {
    #[serde(default)]
    pub xp: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
}

/// The mechanical definition of a quest: stage sequence, transitions,
/// objectives, and the top-level completion condition.
///
/// Completion is deliberately decoupled from stages: a quest can complete on
/// its completion condition no matter which stage it is in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestLogic {
    pub id: QuestId,
    /// Ordered stage sequence; "past stage" comparisons use sequence index.
    #[serde(default)]
    pub stages: Vec<StageId>,
    pub initial_stage: StageId,
    #[serde(default)]
    pub stage_transitions: Vec<StageTransition>,
    #[serde(default)]
    pub objectives: Vec<QuestObjective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_condition: Option<QuestCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<QuestRewards>,
}

impl QuestLogic {
    pub fn stage_index(&self, stage: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    pub fn objective(&self, id: &ObjectiveId) -> Option<&QuestObjective> {
        self.objectives.iter().find(|o| &o.id == id)
    }

    pub fn transition(&self, from: &StageId, to: &StageId) -> Option<&StageTransition> {
        self.stage_transitions
            .iter()
            .find(|t| &t.from == from && &t.to == to)
    }

    /// Objectives relevant at `current_stage`: stage-scoped objectives match
    /// only their own stage, unscoped objectives are always relevant.
    pub fn relevant_objectives<'a>(
        &'a self,
        current_stage: &'a StageId,
    ) -> impl Iterator<Item = &'a QuestObjective> {
        self.objectives
            .iter()
            .filter(move |o| o.stage.as_ref().is_none_or(|s| s == current_stage))
    }

    /// Recomputes a single objective's completion against live flags.
    pub fn objective_complete(&self, id: &ObjectiveId, flags: &HashMap<String, bool>) -> bool {
        self.objective(id)
            .map(|o| o.condition.evaluate(flags))
            .unwrap_or(false)
    }

    /// Snapshot of this quest's stage position for condition evaluation.
    pub fn stage_view(&self, current: Option<&StageId>) -> QuestStageView {
        QuestStageView {
            current: current.cloned(),
            sequence: self.stages.clone(),
        }
    }
}

// ============================================================================
// Quest Content (per-locale display text)
// ============================================================================

/// Display text for one quest in one locale, keyed separately so content can
/// ship and change independently of logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub objectives: HashMap<ObjectiveId, String>,
}

/// A quest after logic and content are merged: mechanics plus resolved
/// per-locale text maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub logic: QuestLogic,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub objective_texts: HashMap<ObjectiveId, LocalizedText>,
}

impl Quest {
    pub fn title_text(&self, locale: Locale) -> String {
        localized_text(Some(&self.title), locale)
    }

    pub fn description_text(&self, locale: Locale) -> String {
        localized_text(Some(&self.description), locale)
    }

    pub fn objective_text(&self, id: &ObjectiveId, locale: Locale) -> String {
        localized_text(self.objective_texts.get(id), locale)
    }
}

/// Merges quest logic with per-locale content by objective id. Content keys
/// that reference no declared objective are dropped with a warning; logic ids
/// with no content resolve to placeholder labels at display time.
pub fn merge_quest(logic: QuestLogic, content: &BTreeMap<Locale, QuestContent>) -> Quest {
    let mut title = LocalizedText::new();
    let mut description = LocalizedText::new();
    let mut objective_texts: HashMap<ObjectiveId, LocalizedText> = logic
        .objectives
        .iter()
        .map(|o| (o.id.clone(), LocalizedText::new()))
        .collect();

    for (locale, pack) in content {
        title.insert(*locale, pack.title.clone());
        description.insert(*locale, pack.description.clone());
        for (objective_id, text) in &pack.objectives {
            match objective_texts.get_mut(objective_id) {
                Some(map) => {
                    map.insert(*locale, text.clone());
                }
                None => {
                    tracing::warn!(
                        quest_id = %logic.id,
                        objective_id = %objective_id,
                        locale = %locale,
                        "quest content references unknown objective"
                    );
                }
            }
        }
    }

    Quest {
        logic,
        title,
        description,
        objective_texts,
    }
}

// ============================================================================
// Quest State
// ============================================================================

/// Lifecycle of a started quest. Quests the player has not started have no
/// state entry at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }

    /// Maps a raw persisted status to a known one; anything unrecognized
    /// falls back to `Active`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim() {
            "completed" => QuestStatus::Completed,
            "failed" => QuestStatus::Failed,
            _ => QuestStatus::Active,
        }
    }
}

/// Result of asking a quest to move to a new stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageAdvance {
    /// The transition fired; `trigger_actions` are for the caller to execute.
    Advanced {
        to: StageId,
        trigger_actions: Vec<Action>,
    },
    /// The move was illegal; state is unchanged.
    Rejected { reason: String },
}

/// Outcome of one evaluation pass over a quest's objectives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestEvaluation {
    pub newly_completed: Vec<ObjectiveId>,
    pub just_completed: bool,
    /// Present exactly once, on the evaluation that completes the quest.
    pub rewards: Option<QuestRewards>,
}

/// Mutable per-player progress for a single quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestState {
    pub quest_id: QuestId,
    pub status: QuestStatus,
    pub current_stage: StageId,
    #[serde(default)]
    pub completed_objectives: BTreeSet<ObjectiveId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_tick: Option<u64>,
}

impl QuestState {
    /// Fresh state for a quest the player just accepted.
    pub fn started(logic: &QuestLogic) -> Self {
        Self {
            quest_id: logic.id.clone(),
            status: QuestStatus::Active,
            current_stage: logic.initial_stage.clone(),
            completed_objectives: BTreeSet::new(),
            completed_at_tick: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == QuestStatus::Active
    }

    /// Attempts the declared transition from the current stage to `to`.
    /// Fires only when the transition exists and every required flag is
    /// raised; otherwise the state is untouched and a reason is returned.
    pub fn advance_stage(
        &mut self,
        logic: &QuestLogic,
        to: &StageId,
        flags: &HashMap<String, bool>,
    ) -> StageAdvance {
        if !self.is_active() {
            return StageAdvance::Rejected {
                reason: format!("quest {} is not active", self.quest_id),
            };
        }
        let Some(transition) = logic.transition(&self.current_stage, to) else {
            return StageAdvance::Rejected {
                reason: format!(
                    "no transition from {} to {} for quest {}",
                    self.current_stage, to, self.quest_id
                ),
            };
        };
        if let Some(flag) = transition
            .required_flags
            .iter()
            .find(|flag| flags.get(flag.as_str()) != Some(&true))
        {
            return StageAdvance::Rejected {
                reason: format!("missing required flag {flag}"),
            };
        }

        self.current_stage = to.clone();
        StageAdvance::Advanced {
            to: to.clone(),
            trigger_actions: transition.trigger_actions.clone(),
        }
    }

    /// Forces the stage to `to`, bypassing transitions. Used by authored
    /// scene actions. Rejects stages outside the declared sequence (an empty
    /// sequence declares nothing and accepts any stage).
    pub fn force_stage(&mut self, logic: &QuestLogic, to: &StageId) -> bool {
        if !logic.stages.is_empty() && logic.stage_index(to).is_none() {
            tracing::warn!(
                quest_id = %self.quest_id,
                stage = %to,
                "ignoring stage outside the declared sequence"
            );
            return false;
        }
        self.current_stage = to.clone();
        true
    }

    /// One evaluation pass: recomputes pending objectives against live flags,
    /// records the newly completed ones, and completes the quest when every
    /// objective is done and the completion condition (if any) holds.
    ///
    /// The status flip to `Completed` is the single-grant guard for rewards;
    /// later passes over a completed quest return an empty evaluation.
    pub fn evaluate(
        &mut self,
        logic: &QuestLogic,
        flags: &HashMap<String, bool>,
        tick: u64,
    ) -> QuestEvaluation {
        if !self.is_active() {
            return QuestEvaluation::default();
        }

        let newly_completed: Vec<ObjectiveId> = logic
            .objectives
            .iter()
            .filter(|o| !self.completed_objectives.contains(&o.id))
            .filter(|o| o.condition.evaluate(flags))
            .map(|o| o.id.clone())
            .collect();
        self.completed_objectives.extend(newly_completed.iter().cloned());

        let all_objectives_done = logic
            .objectives
            .iter()
            .all(|o| self.completed_objectives.contains(&o.id));
        let completion_met = logic
            .completion_condition
            .as_ref()
            .is_none_or(|c| c.evaluate(flags));

        let just_completed = all_objectives_done && completion_met;
        if just_completed {
            self.status = QuestStatus::Completed;
            self.completed_at_tick = Some(tick);
        }

        QuestEvaluation {
            newly_completed,
            just_completed,
            rewards: just_completed.then(|| logic.rewards.clone().unwrap_or_default()),
        }
    }
}

// ============================================================================
// Snapshot Normalization
// ============================================================================

/// Trims a persisted stage id, defaulting blanks to `not_started`.
pub fn normalize_stage_id(raw: &str) -> StageId {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        StageId::new("not_started")
    } else {
        StageId::new(trimmed)
    }
}

/// Cleans a persisted objective id list: trims entries, drops blanks, and
/// removes duplicates while keeping first-seen order.
pub fn normalize_objective_ids(raw: &[String]) -> Vec<ObjectiveId> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for id in raw {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(ObjectiveId::new(trimmed));
        }
    }
    out
}

/// Clamps a persisted completion tick to a non-negative whole number.
pub fn normalize_completed_tick(raw: Option<f64>) -> Option<u64> {
    let value = raw?;
    if !value.is_finite() {
        return None;
    }
    Some(value.max(0.0).floor() as u64)
}
