//! Map point bindings and interaction resolution
//!
//! A map point carries zero or more bindings, each tied to a trigger kind
//! (marker click, QR scan, arrival). Resolution filters bindings by
//! trigger, evaluates their conditions against a world snapshot, and
//! orders the result by authored priority.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::{all_conditions_met, Condition, EvalContext};
use crate::ids::PointId;

/// How an interaction is triggered in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    MarkerClick,
    QrScan,
    Arrive,
}

/// Lifecycle state of a map point. Ordered: a point only ever moves
/// forward through these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PointState {
    #[default]
    Locked,
    Discovered,
    Visited,
    Completed,
}

/// One authored binding on a map point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointBinding {
    pub id: String,
    pub trigger: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub priority: i32,
    /// Missing or empty means unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    pub actions: Vec<Action>,
}

/// A binding paired with its availability under the current context.
#[derive(Debug, Clone)]
pub struct ResolvedInteraction<'a> {
    pub binding: &'a PointBinding,
    pub available: bool,
}

/// Filter bindings to a trigger, evaluate availability, and sort by
/// priority descending. The sort is stable so authored order breaks ties.
pub fn resolve_interactions<'a>(
    bindings: &'a [PointBinding],
    trigger: TriggerKind,
    ctx: &EvalContext,
) -> Vec<ResolvedInteraction<'a>> {
    let mut resolved: Vec<ResolvedInteraction<'a>> = bindings
        .iter()
        .filter(|b| b.trigger == trigger)
        .map(|binding| ResolvedInteraction {
            available: all_conditions_met(binding.conditions.as_deref(), ctx),
            binding,
        })
        .collect();
    resolved.sort_by_key(|r| std::cmp::Reverse(r.binding.priority));
    resolved
}

/// First available binding for the trigger, if any.
pub fn resolve_auto_interaction<'a>(
    bindings: &'a [PointBinding],
    trigger: TriggerKind,
    ctx: &EvalContext,
) -> Option<&'a PointBinding> {
    resolve_interactions(bindings, trigger, ctx)
        .into_iter()
        .find(|r| r.available)
        .map(|r| r.binding)
}

/// Parse a point's raw binding payload leniently. Malformed payloads are
/// authored-data defects: log and degrade to no bindings rather than
/// failing the interaction (load-time validation catches them earlier).
pub fn parse_bindings(point_id: &PointId, raw: &str) -> Vec<PointBinding> {
    match serde_json::from_str::<Vec<PointBinding>>(raw) {
        Ok(bindings) => bindings,
        Err(err) => {
            tracing::warn!(
                point_id = %point_id,
                error = %err,
                "malformed binding payload, treating point as inert"
            );
            Vec::new()
        }
    }
}

/// Outcome of a QR scan against a point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QrActivation {
    /// The point was already discovered or better; scanning again is a
    /// no-op so codes stay safe to re-scan.
    AlreadyUnlocked,
    /// The point was just discovered. Carries the actions to execute:
    /// the matched QR binding's, or the implicit unlock fallback.
    Unlocked { actions: Vec<Action> },
}

/// Resolve a QR scan. Idempotent on non-locked points; otherwise the
/// first available `qr_scan` binding wins, and a point with no such
/// binding falls back to unlocking itself.
pub fn resolve_qr_activation(
    point_id: &PointId,
    current_state: PointState,
    bindings: &[PointBinding],
    ctx: &EvalContext,
) -> QrActivation {
    if current_state != PointState::Locked {
        return QrActivation::AlreadyUnlocked;
    }

    let actions = match resolve_auto_interaction(bindings, TriggerKind::QrScan, ctx) {
        Some(binding) => binding.actions.clone(),
        None => vec![Action::UnlockPoint {
            point_id: point_id.clone(),
        }],
    };
    QrActivation::Unlocked { actions }
}
