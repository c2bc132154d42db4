//! Quest log store.
//!
//! Session-side quest tracking: registered definitions, per-quest player
//! progress, and the bridge to durable save data. Registration and starting
//! are idempotent so a content reload can never duplicate progress, and
//! persisted rows pass through the snapshot normalizers before they touch
//! live state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use gumshoe_domain::{
    normalize_completed_tick, normalize_objective_ids, normalize_stage_id, Quest, QuestEvaluation,
    QuestId, QuestStageView, QuestState, QuestStatus, StageAdvance, StageId, UserId,
};

use crate::infrastructure::ports::{RepoError, SaveGameRepo};

#[derive(Default)]
struct QuestLogState {
    quests: HashMap<QuestId, Quest>,
    user_quests: HashMap<QuestId, QuestState>,
}

/// See module docs.
pub struct QuestLog {
    user_id: UserId,
    save_game: Arc<dyn SaveGameRepo>,
    state: Mutex<QuestLogState>,
}

impl QuestLog {
    pub fn new(user_id: UserId, save_game: Arc<dyn SaveGameRepo>) -> Self {
        Self {
            user_id,
            save_game,
            state: Mutex::new(QuestLogState::default()),
        }
    }

    /// Registers a quest definition. Re-registering replaces the definition
    /// and leaves player progress alone.
    pub async fn register_quest(&self, quest: Quest) {
        let mut state = self.state.lock().await;
        state.quests.insert(quest.logic.id.clone(), quest);
    }

    pub async fn register_quests(&self, quests: impl IntoIterator<Item = Quest>) {
        let mut state = self.state.lock().await;
        for quest in quests {
            state.quests.insert(quest.logic.id.clone(), quest);
        }
    }

    /// Starts a quest at its initial stage. A second start is a no-op and an
    /// unregistered id is ignored; returns whether anything changed.
    pub async fn start_quest(&self, quest_id: &QuestId) -> bool {
        let mut state = self.state.lock().await;
        if state.user_quests.contains_key(quest_id) {
            return false;
        }
        let Some(quest) = state.quests.get(quest_id) else {
            warn!(%quest_id, "ignoring start for unregistered quest");
            return false;
        };
        let started = QuestState::started(&quest.logic);
        state.user_quests.insert(quest_id.clone(), started);
        true
    }

    /// One evaluation pass over every started quest against live flags.
    /// Returns only the quests whose pass produced something, ordered by
    /// quest id so reward grants replay deterministically.
    pub async fn evaluate_all(
        &self,
        flags: &HashMap<String, bool>,
        tick: u64,
    ) -> Vec<(QuestId, QuestEvaluation)> {
        let mut state = self.state.lock().await;
        let QuestLogState { quests, user_quests } = &mut *state;

        let mut out = Vec::new();
        for (quest_id, quest_state) in user_quests.iter_mut() {
            let Some(quest) = quests.get(quest_id) else {
                continue;
            };
            let evaluation = quest_state.evaluate(&quest.logic, flags, tick);
            if !evaluation.newly_completed.is_empty() || evaluation.just_completed {
                out.push((quest_id.clone(), evaluation));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Attempts a declared stage transition for a started quest.
    pub async fn advance_stage(
        &self,
        quest_id: &QuestId,
        to: &StageId,
        flags: &HashMap<String, bool>,
    ) -> StageAdvance {
        let mut state = self.state.lock().await;
        let QuestLogState { quests, user_quests } = &mut *state;
        let Some(quest) = quests.get(quest_id) else {
            return StageAdvance::Rejected {
                reason: format!("unknown quest {quest_id}"),
            };
        };
        let Some(quest_state) = user_quests.get_mut(quest_id) else {
            return StageAdvance::Rejected {
                reason: format!("quest {quest_id} not started"),
            };
        };
        quest_state.advance_stage(&quest.logic, to, flags)
    }

    /// Forces a quest to a stage, bypassing transitions. Authored scene
    /// actions use this, so an unstarted quest is started first.
    pub async fn force_stage(&self, quest_id: &QuestId, to: &StageId) -> bool {
        let mut state = self.state.lock().await;
        let QuestLogState { quests, user_quests } = &mut *state;
        let Some(quest) = quests.get(quest_id) else {
            warn!(%quest_id, "ignoring stage force for unregistered quest");
            return false;
        };
        let quest_state = user_quests
            .entry(quest_id.clone())
            .or_insert_with(|| QuestState::started(&quest.logic));
        quest_state.force_stage(&quest.logic, to)
    }

    /// Stage snapshots for every registered quest, keyed for condition
    /// evaluation. An unstarted quest reads as `current: None`.
    pub async fn stage_views(&self) -> HashMap<QuestId, QuestStageView> {
        let state = self.state.lock().await;
        state
            .quests
            .iter()
            .map(|(id, quest)| {
                let current = state.user_quests.get(id).map(|s| s.current_stage.clone());
                (id.clone(), quest.logic.stage_view(current.as_ref()))
            })
            .collect()
    }

    pub async fn quest_state(&self, quest_id: &QuestId) -> Option<QuestState> {
        let state = self.state.lock().await;
        state.user_quests.get(quest_id).cloned()
    }

    pub async fn quest(&self, quest_id: &QuestId) -> Option<Quest> {
        let state = self.state.lock().await;
        state.quests.get(quest_id).cloned()
    }

    /// Loads persisted progress, normalizing legacy row shapes. Rows naming
    /// a quest that is not registered are skipped.
    pub async fn hydrate(&self) -> Result<(), RepoError> {
        let rows = self.save_game.load_quests(self.user_id.clone()).await?;
        let mut state = self.state.lock().await;
        for row in rows {
            let quest_id = QuestId::new(row.quest_id.trim());
            if !state.quests.contains_key(&quest_id) {
                warn!(%quest_id, "skipping saved progress for unregistered quest");
                continue;
            }
            let completed_objectives = normalize_objective_ids(&row.completed_objective_ids)
                .into_iter()
                .collect();
            let quest_state = QuestState {
                quest_id: quest_id.clone(),
                status: QuestStatus::normalize(&row.status),
                current_stage: normalize_stage_id(&row.stage),
                completed_objectives,
                completed_at_tick: normalize_completed_tick(row.completed_at),
            };
            state.user_quests.insert(quest_id, quest_state);
        }
        Ok(())
    }

    /// Writes current quest progress through to the save repository.
    pub async fn persist(&self) -> Result<(), RepoError> {
        let rows: Vec<QuestState> = {
            let state = self.state.lock().await;
            let mut rows: Vec<QuestState> = state.user_quests.values().cloned().collect();
            rows.sort_by(|a, b| a.quest_id.cmp(&b.quest_id));
            rows
        };
        self.save_game
            .replace_quests(self.user_id.clone(), &rows)
            .await
    }

    /// Drops all player progress; registered definitions stay.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.user_quests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockSaveGameRepo, RawQuestSnapshot};
    use gumshoe_domain::{
        merge_quest, ObjectiveId, QuestCondition, QuestLogic, QuestObjective, QuestRewards,
        StageTransition,
    };
    use std::collections::BTreeMap;

    fn heist_quest() -> Quest {
        let logic = QuestLogic {
            id: QuestId::new("case01"),
            stages: vec![
                StageId::new("not_started"),
                StageId::new("briefing"),
                StageId::new("finale"),
            ],
            initial_stage: StageId::new("not_started"),
            stage_transitions: vec![StageTransition {
                from: StageId::new("not_started"),
                to: StageId::new("briefing"),
                required_flags: vec![],
                trigger_actions: vec![],
            }],
            objectives: vec![QuestObjective {
                id: ObjectiveId::new("find_clue_safe"),
                condition: QuestCondition::Flag {
                    flag: "vault_inspected".to_string(),
                    value: None,
                },
                stage: Some(StageId::new("briefing")),
                target_point_id: None,
            }],
            completion_condition: None,
            rewards: Some(QuestRewards {
                xp: 150,
                traits: vec!["observant".to_string()],
            }),
        };
        merge_quest(logic, &BTreeMap::new())
    }

    fn log_with(save_game: MockSaveGameRepo) -> QuestLog {
        QuestLog::new(UserId::new("detective-1"), Arc::new(save_game))
    }

    #[tokio::test]
    async fn when_quest_is_started_twice_then_second_start_changes_nothing() {
        let log = log_with(MockSaveGameRepo::new());
        log.register_quest(heist_quest()).await;

        assert!(log.start_quest(&QuestId::new("case01")).await);
        assert!(!log.start_quest(&QuestId::new("case01")).await);
        assert!(!log.start_quest(&QuestId::new("never_registered")).await);

        let state = log.quest_state(&QuestId::new("case01")).await;
        assert_eq!(
            state.map(|s| s.current_stage),
            Some(StageId::new("not_started"))
        );
    }

    #[tokio::test]
    async fn when_objectives_complete_then_rewards_are_granted_exactly_once() {
        let log = log_with(MockSaveGameRepo::new());
        log.register_quest(heist_quest()).await;
        log.start_quest(&QuestId::new("case01")).await;

        let mut flags = HashMap::new();
        flags.insert("vault_inspected".to_string(), true);

        let first = log.evaluate_all(&flags, 7).await;
        assert_eq!(first.len(), 1);
        assert!(first[0].1.just_completed);
        assert_eq!(first[0].1.rewards.as_ref().map(|r| r.xp), Some(150));

        let second = log.evaluate_all(&flags, 8).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn when_stage_is_forced_then_unstarted_quest_starts_first() {
        let log = log_with(MockSaveGameRepo::new());
        log.register_quest(heist_quest()).await;

        assert!(log.force_stage(&QuestId::new("case01"), &StageId::new("finale")).await);
        assert!(!log.force_stage(&QuestId::new("case01"), &StageId::new("no_such_stage")).await);

        let state = log.quest_state(&QuestId::new("case01")).await;
        assert_eq!(state.map(|s| s.current_stage), Some(StageId::new("finale")));
    }

    #[tokio::test]
    async fn when_hydrating_then_raw_rows_are_normalized_and_strays_skipped() {
        let mut save_game = MockSaveGameRepo::new();
        save_game.expect_load_quests().returning(|_| {
            Ok(vec![
                RawQuestSnapshot {
                    quest_id: " case01 ".to_string(),
                    status: "completed".to_string(),
                    stage: "  ".to_string(),
                    completed_objective_ids: vec![
                        " find_clue_safe ".to_string(),
                        "find_clue_safe".to_string(),
                    ],
                    completed_at: Some(41.9),
                },
                RawQuestSnapshot {
                    quest_id: "never_registered".to_string(),
                    status: "active".to_string(),
                    stage: "anywhere".to_string(),
                    completed_objective_ids: vec![],
                    completed_at: None,
                },
            ])
        });

        let log = log_with(save_game);
        log.register_quest(heist_quest()).await;
        log.hydrate().await.unwrap();

        let state = log.quest_state(&QuestId::new("case01")).await.unwrap();
        assert_eq!(state.status, QuestStatus::Completed);
        assert_eq!(state.current_stage, StageId::new("not_started"));
        assert_eq!(state.completed_objectives.len(), 1);
        assert_eq!(state.completed_at_tick, Some(41));
        assert!(log.quest_state(&QuestId::new("never_registered")).await.is_none());
    }

    #[tokio::test]
    async fn when_persisting_then_rows_go_out_sorted_by_quest_id() {
        let mut save_game = MockSaveGameRepo::new();
        save_game
            .expect_replace_quests()
            .withf(|_, rows| {
                rows.len() == 2
                    && rows[0].quest_id == QuestId::new("case01")
                    && rows[1].quest_id == QuestId::new("sandbox_dog")
            })
            .returning(|_, _| Ok(()));

        let log = log_with(save_game);
        log.register_quest(heist_quest()).await;
        let mut dog = heist_quest();
        dog.logic.id = QuestId::new("sandbox_dog");
        log.register_quest(dog).await;

        log.start_quest(&QuestId::new("sandbox_dog")).await;
        log.start_quest(&QuestId::new("case01")).await;
        log.persist().await.unwrap();
    }
}
