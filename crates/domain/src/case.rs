//! Case progression: objectives, approaches, and the night gate
//!
//! Advancing a case objective at a bank location during the night phase is
//! blocked unless the chosen approach forces entry. A blocked advance is a
//! first-class outcome, not an error, and mutates nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game_clock::TimePhase;
use crate::ids::{CaseId, FactionId, LocationId, ObjectiveId};
use crate::location::CityMap;

// =============================================================================
// Approach
// =============================================================================

/// How the player tackles an objective. Everything beyond `Standard`
/// carries faction consequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    #[default]
    Standard,
    Lockpick,
    Bribe,
    Warrant,
}

impl Approach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::Standard => "standard",
            Approach::Lockpick => "lockpick",
            Approach::Bribe => "bribe",
            Approach::Warrant => "warrant",
        }
    }

    /// Whether this approach gets the player into a bank after dark.
    pub fn grants_night_access(&self) -> bool {
        matches!(self, Approach::Lockpick | Approach::Bribe | Approach::Warrant)
    }

    /// The approach tokens offered as alternatives when the night gate
    /// blocks an advance.
    pub fn night_access_tokens() -> Vec<String> {
        vec![
            Approach::Lockpick.as_str().to_string(),
            Approach::Bribe.as_str().to_string(),
            Approach::Warrant.as_str().to_string(),
        ]
    }

    /// Reputation consequences of the approach. Bribing pleases the
    /// underworld and annoys the police; a warrant does the reverse to the
    /// bankers; picking the lock only costs police goodwill.
    pub fn faction_deltas(&self) -> Vec<(FactionId, i64)> {
        match self {
            Approach::Standard => Vec::new(),
            Approach::Bribe => vec![
                (FactionId::new("fct_underworld"), 2),
                (FactionId::new("fct_police"), -1),
            ],
            Approach::Warrant => vec![
                (FactionId::new("fct_police"), 2),
                (FactionId::new("fct_bankers"), -1),
            ],
            Approach::Lockpick => vec![(FactionId::new("fct_police"), -2)],
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Case progress
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Active,
    Resolved,
}

/// Per-user progress through a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseProgress {
    pub case_id: CaseId,
    pub current_objective_id: ObjectiveId,
    pub status: CaseStatus,
    pub last_advanced_tick: u64,
    pub updated_at: DateTime<Utc>,
}

/// An authored case objective, ordered for display by `sort_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseObjective {
    pub id: ObjectiveId,
    pub case_id: CaseId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
}

// =============================================================================
// Night gate
// =============================================================================

/// Whether an advance may proceed. Blocking carries everything the player
/// needs to pick another route in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseAdvanceGate {
    Allowed,
    Blocked {
        reason: String,
        alternatives: Vec<String>,
    },
}

impl CaseAdvanceGate {
    pub fn is_blocked(&self) -> bool {
        matches!(self, CaseAdvanceGate::Blocked { .. })
    }
}

/// Gate an objective advance on the bank night closure. Only fires for
/// bank locations at night with a non-forcing approach.
pub fn night_gate(
    city: &CityMap,
    location_id: Option<&LocationId>,
    phase: TimePhase,
    approach: Approach,
) -> CaseAdvanceGate {
    let Some(location_id) = location_id else {
        return CaseAdvanceGate::Allowed;
    };

    if city.is_bank(location_id) && phase == TimePhase::Night && !approach.grants_night_access() {
        return CaseAdvanceGate::Blocked {
            reason: "Bank is closed at night. Choose an alternative approach.".to_string(),
            alternatives: Approach::night_access_tokens(),
        };
    }

    CaseAdvanceGate::Allowed
}
