//! Case progression use cases.
//!
//! Advancing an objective is gated by the bank night closure: a blocked
//! advance is a first-class outcome carrying the unlock approaches, and
//! mutates nothing. Non-standard approaches settle their faction costs
//! here.

use std::sync::Arc;

use serde::Serialize;

use gumshoe_domain::{
    night_gate, Approach, CaseAdvanceGate, CaseId, CaseProgress, CaseStatus, CityMap,
    DomainEventKind, DomainEventRecord, FactionDelta, FactionReputation, LocationId, ObjectiveId,
    UserId, WorldClock,
};

use crate::infrastructure::ports::{ClockPort, EventLogRepo, RepoError, WorldRepo};
use crate::use_cases::progression::apply_faction_deltas;
use crate::use_cases::world::ensure_clock;

/// Container for case use cases.
pub struct CaseUseCases {
    pub advance_case: Arc<AdvanceCase>,
}

impl CaseUseCases {
    pub fn new(advance_case: Arc<AdvanceCase>) -> Self {
        Self { advance_case }
    }
}

/// Errors from case operations.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Unknown objective id: {0}")]
    UnknownObjective(ObjectiveId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Result of an advance attempt. Blocked is a branch, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseAdvanceOutcome {
    #[serde(rename_all = "camelCase")]
    Blocked {
        reason: String,
        alternatives: Vec<String>,
        world_clock: WorldClock,
    },
    #[serde(rename_all = "camelCase")]
    Advanced {
        case_progress: CaseProgress,
        world_clock: WorldClock,
        faction_reputation: Vec<FactionReputation>,
    },
}

impl CaseAdvanceOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, CaseAdvanceOutcome::Blocked { .. })
    }
}

/// Advance a case to its next objective.
pub struct AdvanceCase {
    world_repo: Arc<dyn WorldRepo>,
    event_log: Arc<dyn EventLogRepo>,
    clock: Arc<dyn ClockPort>,
    city: Arc<CityMap>,
}

impl AdvanceCase {
    pub fn new(
        world_repo: Arc<dyn WorldRepo>,
        event_log: Arc<dyn EventLogRepo>,
        clock: Arc<dyn ClockPort>,
        city: Arc<CityMap>,
    ) -> Self {
        Self {
            world_repo,
            event_log,
            clock,
            city,
        }
    }

    /// Attempt the advance. The target objective must be one the case
    /// declares; cases with no authored objectives accept any id.
    pub async fn execute(
        &self,
        user_id: UserId,
        case_id: CaseId,
        next_objective_id: ObjectiveId,
        location_id: Option<LocationId>,
        approach: Approach,
    ) -> Result<CaseAdvanceOutcome, CaseError> {
        let world_clock = ensure_clock(self.world_repo.as_ref(), &user_id).await?;

        if let CaseAdvanceGate::Blocked {
            reason,
            alternatives,
        } = night_gate(&self.city, location_id.as_ref(), world_clock.phase, approach)
        {
            return Ok(CaseAdvanceOutcome::Blocked {
                reason,
                alternatives,
                world_clock,
            });
        }

        let objectives = self.world_repo.list_case_objectives(case_id.clone()).await?;
        if !objectives.is_empty() && !objectives.iter().any(|o| o.id == next_objective_id) {
            return Err(CaseError::UnknownObjective(next_objective_id));
        }

        let previous = self
            .world_repo
            .get_case_progress(user_id.clone(), case_id.clone())
            .await?;
        let progress = CaseProgress {
            case_id: case_id.clone(),
            current_objective_id: next_objective_id.clone(),
            status: CaseStatus::Active,
            last_advanced_tick: world_clock.tick,
            updated_at: self.clock.now(),
        };
        self.world_repo
            .save_case_progress(user_id.clone(), &progress)
            .await?;

        self.event_log
            .append(&DomainEventRecord::new(
                user_id.clone(),
                world_clock.tick,
                DomainEventKind::CaseObjectiveAdvanced,
                serde_json::json!({
                    "caseId": case_id,
                    "fromObjectiveId": previous.map(|p| p.current_objective_id),
                    "toObjectiveId": next_objective_id,
                    "locationId": location_id,
                    "approach": approach.as_str(),
                }),
                self.clock.now(),
            ))
            .await?;

        let deltas: Vec<FactionDelta> = approach
            .faction_deltas()
            .into_iter()
            .map(|(faction_id, delta)| FactionDelta { faction_id, delta })
            .collect();
        let faction_reputation = apply_faction_deltas(
            self.world_repo.as_ref(),
            self.event_log.as_ref(),
            self.clock.as_ref(),
            &user_id,
            world_clock.tick,
            &deltas,
        )
        .await?;

        Ok(CaseAdvanceOutcome::Advanced {
            case_progress: progress,
            world_clock,
            faction_reputation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{MockEventLogRepo, MockWorldRepo};
    use chrono::Utc;
    use gumshoe_domain::{CaseObjective, FactionId};

    fn user() -> UserId {
        UserId::new("user_test")
    }

    fn bank_case() -> CaseId {
        CaseId::new("case_01_bank")
    }

    fn bank_objectives(case_id: &CaseId) -> Vec<CaseObjective> {
        let objective = |id: &str, sort_order: i32| CaseObjective {
            id: ObjectiveId::new(id),
            case_id: case_id.clone(),
            title: id.to_string(),
            description: None,
            sort_order,
            location_id: Some(LocationId::new("loc_freiburg_bank")),
        };
        vec![
            objective("obj_find_clara", 1),
            objective("obj_search_bank_cell", 2),
        ]
    }

    fn use_case(world_repo: MockWorldRepo, event_log: MockEventLogRepo) -> AdvanceCase {
        AdvanceCase::new(
            Arc::new(world_repo),
            Arc::new(event_log),
            Arc::new(FixedClock(Utc::now())),
            Arc::new(CityMap::freiburg_1905()),
        )
    }

    #[tokio::test]
    async fn when_bank_is_closed_then_advance_blocks_without_mutation() {
        let mut world_repo = MockWorldRepo::new();
        // Tick 9 falls in the night phase
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(9))));

        let outcome = use_case(world_repo, MockEventLogRepo::new())
            .execute(
                user(),
                bank_case(),
                ObjectiveId::new("obj_search_bank_cell"),
                Some(LocationId::new("loc_freiburg_bank")),
                Approach::Standard,
            )
            .await
            .unwrap();

        match outcome {
            CaseAdvanceOutcome::Blocked {
                reason,
                alternatives,
                world_clock,
            } => {
                assert_eq!(
                    reason,
                    "Bank is closed at night. Choose an alternative approach."
                );
                assert_eq!(alternatives, vec!["lockpick", "bribe", "warrant"]);
                assert_eq!(world_clock.tick, 9);
            }
            CaseAdvanceOutcome::Advanced { .. } => panic!("expected block"),
        }
    }

    #[tokio::test]
    async fn when_bribing_past_the_gate_then_faction_costs_settle() {
        let mut world_repo = MockWorldRepo::new();
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(9))));
        world_repo
            .expect_list_case_objectives()
            .returning(|case_id| Ok(bank_objectives(&case_id)));
        world_repo
            .expect_get_case_progress()
            .returning(|_, case_id| {
                Ok(Some(CaseProgress {
                    case_id,
                    current_objective_id: ObjectiveId::new("obj_find_clara"),
                    status: CaseStatus::Active,
                    last_advanced_tick: 2,
                    updated_at: Utc::now(),
                }))
            });
        world_repo
            .expect_save_case_progress()
            .withf(|_, progress| {
                progress.current_objective_id == ObjectiveId::new("obj_search_bank_cell")
                    && progress.last_advanced_tick == 9
            })
            .returning(|_, _| Ok(()));
        world_repo.expect_get_faction().returning(|_, _| Ok(None));
        world_repo
            .expect_save_faction()
            .times(2)
            .returning(|_, _| Ok(()));
        world_repo.expect_list_factions().returning(|_| {
            Ok(vec![
                FactionReputation {
                    faction_id: FactionId::new("fct_police"),
                    reputation: -1,
                },
                FactionReputation {
                    faction_id: FactionId::new("fct_underworld"),
                    reputation: 2,
                },
            ])
        });

        let mut event_log = MockEventLogRepo::new();
        event_log
            .expect_append()
            .withf(|record| {
                record.kind == DomainEventKind::CaseObjectiveAdvanced
                    && record.payload["fromObjectiveId"] == "obj_find_clara"
                    && record.payload["toObjectiveId"] == "obj_search_bank_cell"
                    && record.payload["approach"] == "bribe"
            })
            .times(1)
            .returning(|_| Ok(()));
        event_log
            .expect_append()
            .withf(|record| record.kind == DomainEventKind::FactionReputationChanged)
            .times(2)
            .returning(|_| Ok(()));

        let outcome = use_case(world_repo, event_log)
            .execute(
                user(),
                bank_case(),
                ObjectiveId::new("obj_search_bank_cell"),
                Some(LocationId::new("loc_freiburg_bank")),
                Approach::Bribe,
            )
            .await
            .unwrap();

        match outcome {
            CaseAdvanceOutcome::Advanced {
                case_progress,
                faction_reputation,
                ..
            } => {
                assert_eq!(
                    case_progress.current_objective_id,
                    ObjectiveId::new("obj_search_bank_cell")
                );
                assert_eq!(faction_reputation.len(), 2);
            }
            CaseAdvanceOutcome::Blocked { .. } => panic!("bribe should pass the gate"),
        }
    }

    #[tokio::test]
    async fn when_objective_is_not_declared_then_advance_is_rejected() {
        let mut world_repo = MockWorldRepo::new();
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(0))));
        world_repo
            .expect_list_case_objectives()
            .returning(|case_id| Ok(bank_objectives(&case_id)));

        let result = use_case(world_repo, MockEventLogRepo::new())
            .execute(
                user(),
                bank_case(),
                ObjectiveId::new("obj_made_up"),
                None,
                Approach::Standard,
            )
            .await;

        assert!(matches!(result, Err(CaseError::UnknownObjective(_))));
    }

    #[tokio::test]
    async fn when_case_has_no_authored_objectives_then_any_id_is_accepted() {
        let mut world_repo = MockWorldRepo::new();
        world_repo
            .expect_get_clock()
            .returning(|_| Ok(Some(WorldClock::new(0))));
        world_repo
            .expect_list_case_objectives()
            .returning(|_| Ok(vec![]));
        world_repo
            .expect_get_case_progress()
            .returning(|_, _| Ok(None));
        world_repo
            .expect_save_case_progress()
            .returning(|_, _| Ok(()));
        world_repo.expect_list_factions().returning(|_| Ok(vec![]));

        let mut event_log = MockEventLogRepo::new();
        event_log
            .expect_append()
            .withf(|record| record.payload["fromObjectiveId"].is_null())
            .returning(|_| Ok(()));

        let outcome = use_case(world_repo, event_log)
            .execute(
                user(),
                CaseId::new("sandbox_karlsruhe"),
                ObjectiveId::new("obj_sandbox_start"),
                None,
                Approach::Standard,
            )
            .await
            .unwrap();

        assert!(!outcome.is_blocked());
    }
}
