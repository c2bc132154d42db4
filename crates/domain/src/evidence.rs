//! Evidence catalog and discovery
//!
//! Discovery is an idempotent upsert. A conflict surfaces when the newly
//! discovered piece contradicts evidence the player already holds; the
//! contradiction itself lives in the authored catalog.

use serde::{Deserialize, Serialize};

use crate::ids::EvidenceId;

/// An authored catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceDefinition {
    pub id: EvidenceId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Evidence this piece contradicts when both are held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contradicts_id: Option<EvidenceId>,
}

/// A piece of evidence in the player's possession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvidence {
    pub evidence_id: EvidenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
    pub discovered_tick: u64,
}

/// Two held pieces that cannot both be true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceConflict {
    pub evidence_id: EvidenceId,
    pub contradicts_evidence_id: EvidenceId,
}

/// Conflict check for a fresh discovery: fires only when the catalog
/// declares a contradiction and the contradicted piece is already held.
pub fn conflict_for_discovery(
    definition: &EvidenceDefinition,
    holds_evidence: impl Fn(&EvidenceId) -> bool,
) -> Option<EvidenceConflict> {
    let contradicts = definition.contradicts_id.as_ref()?;
    if holds_evidence(contradicts) {
        Some(EvidenceConflict {
            evidence_id: definition.id.clone(),
            contradicts_evidence_id: contradicts.clone(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str, contradicts: Option<&str>) -> EvidenceDefinition {
        EvidenceDefinition {
            id: EvidenceId::new(id),
            title: format!("Evidence {id}"),
            description: None,
            contradicts_id: contradicts.map(EvidenceId::new),
        }
    }

    #[test]
    fn no_contradiction_declared_means_no_conflict() {
        let def = definition("evd_cell_key", None);
        assert_eq!(conflict_for_discovery(&def, |_| true), None);
    }

    #[test]
    fn conflict_requires_the_contradicted_piece_in_hand() {
        let def = definition("evd_clerk_alibi", Some("evd_clerk_seen_at_vault"));

        assert_eq!(conflict_for_discovery(&def, |_| false), None);

        let conflict = conflict_for_discovery(&def, |id| id.as_str() == "evd_clerk_seen_at_vault");
        assert_eq!(
            conflict,
            Some(EvidenceConflict {
                evidence_id: EvidenceId::new("evd_clerk_alibi"),
                contradicts_evidence_id: EvidenceId::new("evd_clerk_seen_at_vault"),
            })
        );
    }
}
