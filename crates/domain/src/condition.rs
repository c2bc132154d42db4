//! Condition DSL for authored map bindings and quest logic
//!
//! Conditions arrive as tagged JSON authored by content designers. The
//! evaluator is total: it never panics and never errors. Unknown tags that
//! survive load-time validation evaluate to `false` with a warning, so a
//! stale content pack degrades instead of crashing a session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, PointId, QuestId, StageId};
use crate::interaction::PointState;

/// A quest's current position within its declared stage sequence.
///
/// Stage comparisons are index-based: a stage that does not appear in the
/// sequence never matches, even as the current stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestStageView {
    pub current: Option<StageId>,
    pub sequence: Vec<StageId>,
}

impl QuestStageView {
    pub fn new(current: Option<StageId>, sequence: Vec<StageId>) -> Self {
        Self { current, sequence }
    }

    pub fn index_of(&self, stage: &StageId) -> Option<usize> {
        self.sequence.iter().position(|s| s == stage)
    }

    /// Exact stage match. The target must be a declared stage.
    pub fn is_at(&self, stage: &StageId) -> bool {
        self.index_of(stage).is_some() && self.current.as_ref() == Some(stage)
    }

    /// At or past the target stage. Both the current and the target stage
    /// must resolve to an index in the sequence.
    pub fn is_past(&self, stage: &StageId) -> bool {
        let current_idx = self.current.as_ref().and_then(|c| self.index_of(c));
        match (current_idx, self.index_of(stage)) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }
}

/// Read-only world snapshot a condition is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub flags: HashMap<String, bool>,
    pub item_counts: HashMap<ItemId, u32>,
    pub point_states: HashMap<PointId, PointState>,
    pub quest_stages: HashMap<QuestId, QuestStageView>,
}

impl EvalContext {
    pub fn flag(&self, flag_id: &str) -> bool {
        self.flags.get(flag_id).copied().unwrap_or(false)
    }

    pub fn item_count(&self, item_id: &str) -> u32 {
        self.item_counts.get(item_id).copied().unwrap_or(0)
    }

    pub fn point_state(&self, point_id: &str) -> PointState {
        self.point_states
            .get(point_id)
            .copied()
            .unwrap_or(PointState::Locked)
    }

    pub fn quest(&self, quest_id: &str) -> Option<&QuestStageView> {
        self.quest_stages.get(quest_id)
    }
}

/// Authored condition vocabulary for map point bindings.
///
/// `logic_not` carries a condition list (legacy authored form, negates the
/// conjunction); `not` carries a single operand (current form). Both stay
/// in the vocabulary because shipped content uses both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    #[serde(rename_all = "camelCase")]
    FlagIs { flag_id: String, value: bool },
    #[serde(rename_all = "camelCase")]
    ItemCount { item_id: ItemId, min: u32 },
    #[serde(rename_all = "camelCase")]
    PointState { point_id: PointId, state: PointState },
    #[serde(rename_all = "camelCase")]
    QuestStage { quest_id: QuestId, stage: StageId },
    #[serde(rename_all = "camelCase")]
    QuestPastStage { quest_id: QuestId, stage: StageId },
    LogicAnd { conditions: Vec<Condition> },
    LogicOr { conditions: Vec<Condition> },
    LogicNot { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    /// Catch-all for tags this build does not know. Load-time validation
    /// rejects these; anything that slips through evaluates to false.
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Evaluate against a context snapshot. Missing context entries use
    /// defaults (flags false, counts zero, points locked).
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        match self {
            Condition::FlagIs { flag_id, value } => ctx.flag(flag_id) == *value,
            Condition::ItemCount { item_id, min } => ctx.item_count(item_id.as_str()) >= *min,
            Condition::PointState { point_id, state } => {
                ctx.point_state(point_id.as_str()) == *state
            }
            Condition::QuestStage { quest_id, stage } => ctx
                .quest(quest_id.as_str())
                .is_some_and(|view| view.is_at(stage)),
            Condition::QuestPastStage { quest_id, stage } => ctx
                .quest(quest_id.as_str())
                .is_some_and(|view| view.is_past(stage)),
            Condition::LogicAnd { conditions } => conditions.iter().all(|c| c.evaluate(ctx)),
            Condition::LogicOr { conditions } => conditions.iter().any(|c| c.evaluate(ctx)),
            Condition::LogicNot { conditions } => !conditions.iter().all(|c| c.evaluate(ctx)),
            Condition::Not { condition } => !condition.evaluate(ctx),
            Condition::Unknown => {
                tracing::warn!("unknown condition type, evaluating to false");
                false
            }
        }
    }

    /// True when this tree contains an `Unknown` node anywhere. Used by
    /// load-time validation to reject stale content packs.
    pub fn contains_unknown(&self) -> bool {
        match self {
            Condition::Unknown => true,
            Condition::LogicAnd { conditions }
            | Condition::LogicOr { conditions }
            | Condition::LogicNot { conditions } => {
                conditions.iter().any(Condition::contains_unknown)
            }
            Condition::Not { condition } => condition.contains_unknown(),
            _ => false,
        }
    }
}

/// Evaluate a binding's condition list. A missing or empty list means the
/// binding is unconditional.
pub fn all_conditions_met(conditions: Option<&[Condition]>, ctx: &EvalContext) -> bool {
    match conditions {
        None => true,
        Some(list) => list.iter().all(|c| c.evaluate(ctx)),
    }
}

/// Condition dialect used by quest objectives and completion checks.
///
/// The flag test here is strict equality against an explicitly set flag:
/// `value: false` is only satisfied when the flag was set to false, and an
/// absent flag satisfies neither polarity. This differs from the map
/// dialect's `flag_is`, which defaults absent flags to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestCondition {
    Flag {
        flag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<bool>,
    },
    LogicAnd {
        conditions: Vec<QuestCondition>,
    },
    LogicOr {
        conditions: Vec<QuestCondition>,
    },
    #[serde(other)]
    Unknown,
}

impl QuestCondition {
    pub fn evaluate(&self, flags: &HashMap<String, bool>) -> bool {
        match self {
            QuestCondition::Flag { flag, value } => {
                let expected = value.unwrap_or(true);
                flags.get(flag) == Some(&expected)
            }
            QuestCondition::LogicAnd { conditions } => {
                conditions.iter().all(|c| c.evaluate(flags))
            }
            QuestCondition::LogicOr { conditions } => conditions.iter().any(|c| c.evaluate(flags)),
            QuestCondition::Unknown => {
                tracing::warn!("unknown quest condition type, evaluating to false");
                false
            }
        }
    }

    pub fn contains_unknown(&self) -> bool {
        match self {
            QuestCondition::Unknown => true,
            QuestCondition::LogicAnd { conditions } | QuestCondition::LogicOr { conditions } => {
                conditions.iter().any(QuestCondition::contains_unknown)
            }
            QuestCondition::Flag { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_flag(flag: &str, value: bool) -> EvalContext {
        let mut ctx = EvalContext::default();
        ctx.flags.insert(flag.to_string(), value);
        ctx
    }

    #[test]
    fn flag_is_defaults_absent_flags_to_false() {
        let ctx = EvalContext::default();
        let wants_false = Condition::FlagIs {
            flag_id: "vault_inspected".into(),
            value: false,
        };
        let wants_true = Condition::FlagIs {
            flag_id: "vault_inspected".into(),
            value: true,
        };

        assert!(wants_false.evaluate(&ctx));
        assert!(!wants_true.evaluate(&ctx));
    }

    #[test]
    fn item_count_checks_minimum() {
        let mut ctx = EvalContext::default();
        ctx.item_counts.insert(ItemId::new("lockpick"), 2);

        let enough = Condition::ItemCount {
            item_id: ItemId::new("lockpick"),
            min: 2,
        };
        let too_many = Condition::ItemCount {
            item_id: ItemId::new("lockpick"),
            min: 3,
        };
        let absent = Condition::ItemCount {
            item_id: ItemId::new("whiskey"),
            min: 1,
        };

        assert!(enough.evaluate(&ctx));
        assert!(!too_many.evaluate(&ctx));
        assert!(!absent.evaluate(&ctx));
    }

    #[test]
    fn point_state_defaults_to_locked() {
        let ctx = EvalContext::default();
        let locked = Condition::PointState {
            point_id: PointId::new("point_vault"),
            state: PointState::Locked,
        };
        assert!(locked.evaluate(&ctx));
    }

    #[test]
    fn quest_stage_requires_declared_stage() {
        let mut ctx = EvalContext::default();
        ctx.quest_stages.insert(
            QuestId::new("case01_act1"),
            QuestStageView::new(
                Some(StageId::new("briefing")),
                vec![
                    StageId::new("not_started"),
                    StageId::new("briefing"),
                    StageId::new("bank_investigation"),
                ],
            ),
        );

        let at_briefing = Condition::QuestStage {
            quest_id: QuestId::new("case01_act1"),
            stage: StageId::new("briefing"),
        };
        let at_unknown = Condition::QuestStage {
            quest_id: QuestId::new("case01_act1"),
            stage: StageId::new("epilogue"),
        };
        let unknown_quest = Condition::QuestStage {
            quest_id: QuestId::new("nope"),
            stage: StageId::new("briefing"),
        };

        assert!(at_briefing.evaluate(&ctx));
        assert!(!at_unknown.evaluate(&ctx));
        assert!(!unknown_quest.evaluate(&ctx));
    }

    #[test]
    fn quest_past_stage_compares_sequence_indices() {
        let view = QuestStageView::new(
            Some(StageId::new("leads_open")),
            vec![
                StageId::new("not_started"),
                StageId::new("briefing"),
                StageId::new("bank_investigation"),
                StageId::new("leads_open"),
            ],
        );

        assert!(view.is_past(&StageId::new("briefing")));
        assert!(view.is_past(&StageId::new("leads_open")));
        assert!(!view.is_past(&StageId::new("unknown_stage")));
    }

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        let ctx = EvalContext::default();
        let and = Condition::LogicAnd { conditions: vec![] };
        let or = Condition::LogicOr { conditions: vec![] };

        assert!(and.evaluate(&ctx));
        assert!(!or.evaluate(&ctx));
    }

    #[test]
    fn both_negation_forms_work() {
        let ctx = ctx_with_flag("seen_body", true);

        let single = Condition::Not {
            condition: Box::new(Condition::FlagIs {
                flag_id: "seen_body".into(),
                value: true,
            }),
        };
        let list = Condition::LogicNot {
            conditions: vec![Condition::FlagIs {
                flag_id: "seen_body".into(),
                value: true,
            }],
        };

        assert!(!single.evaluate(&ctx));
        assert!(!list.evaluate(&ctx));
    }

    #[test]
    fn logic_not_negates_conjunction_of_list() {
        let mut ctx = ctx_with_flag("a", true);
        ctx.flags.insert("b".to_string(), false);

        // a && b is false, so logic_not over [a, b] is true
        let cond = Condition::LogicNot {
            conditions: vec![
                Condition::FlagIs {
                    flag_id: "a".into(),
                    value: true,
                },
                Condition::FlagIs {
                    flag_id: "b".into(),
                    value: true,
                },
            ],
        };
        assert!(cond.evaluate(&ctx));
    }

    #[test]
    fn unknown_tag_parses_and_evaluates_false() {
        let raw = r#"{ "type": "moon_phase", "phase": "full" }"#;
        let cond: Condition = serde_json::from_str(raw).unwrap();

        assert!(matches!(cond, Condition::Unknown));
        assert!(!cond.evaluate(&EvalContext::default()));
        assert!(cond.contains_unknown());
    }

    #[test]
    fn unknown_nested_in_logic_is_detected() {
        let cond = Condition::LogicAnd {
            conditions: vec![
                Condition::FlagIs {
                    flag_id: "a".into(),
                    value: true,
                },
                Condition::Unknown,
            ],
        };
        assert!(cond.contains_unknown());
    }

    #[test]
    fn missing_condition_list_is_unconditional() {
        let ctx = EvalContext::default();
        assert!(all_conditions_met(None, &ctx));
        assert!(all_conditions_met(Some(&[]), &ctx));
    }

    #[test]
    fn condition_round_trips_through_json() {
        let raw = r#"{
            "type": "logic_and",
            "conditions": [
                { "type": "flag_is", "flagId": "vault_inspected", "value": true },
                { "type": "item_count", "itemId": "lockpick", "min": 1 }
            ]
        }"#;
        let cond: Condition = serde_json::from_str(raw).unwrap();
        let json = serde_json::to_value(&cond).unwrap();

        assert_eq!(json["type"], "logic_and");
        assert_eq!(json["conditions"][0]["flagId"], "vault_inspected");
        assert_eq!(json["conditions"][1]["itemId"], "lockpick");
    }

    #[test]
    fn quest_flag_condition_requires_explicit_value() {
        let mut flags = HashMap::new();
        flags.insert("case_resolved".to_string(), false);

        let wants_true = QuestCondition::Flag {
            flag: "case_resolved".into(),
            value: None,
        };
        let wants_false = QuestCondition::Flag {
            flag: "case_resolved".into(),
            value: Some(false),
        };
        let absent = QuestCondition::Flag {
            flag: "never_set".into(),
            value: Some(false),
        };

        assert!(!wants_true.evaluate(&flags));
        assert!(wants_false.evaluate(&flags));
        // absent flags satisfy neither polarity in the quest dialect
        assert!(!absent.evaluate(&flags));
    }

    #[test]
    fn quest_logic_or_any_branch() {
        let mut flags = HashMap::new();
        flags.insert("clerk_interviewed".to_string(), true);

        let cond = QuestCondition::LogicOr {
            conditions: vec![
                QuestCondition::Flag {
                    flag: "vault_inspected".into(),
                    value: None,
                },
                QuestCondition::Flag {
                    flag: "clerk_interviewed".into(),
                    value: None,
                },
            ],
        };
        assert!(cond.evaluate(&flags));
    }
}
