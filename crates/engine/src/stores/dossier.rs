//! Dossier store.
//!
//! The detective's casebook: raised flags, unlocked entries, collected
//! evidence cards, and the state of every map point. This is the state the
//! condition evaluator reads, so every mutation here is visible to the
//! next trigger.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use gumshoe_domain::{CaseId, EntryId, EvidenceDefinition, EvidenceId, PointId, PointState};

/// Kind of a dossier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Fact,
    Profile,
    Document,
    Intel,
}

/// A single casebook entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DossierEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub title: String,
    pub content: String,
    pub locked: bool,
}

impl DossierEntry {
    /// Minimal fact entry, as produced by the `add_fact` action.
    pub fn fact(id: EntryId) -> Self {
        let title = id.as_str().to_string();
        Self {
            id,
            kind: EntryKind::Fact,
            title,
            content: String::new(),
            locked: false,
        }
    }
}

/// An evidence card as the casebook shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceCard {
    pub id: EvidenceId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&EvidenceDefinition> for EvidenceCard {
    fn from(definition: &EvidenceDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            title: definition.title.clone(),
            description: definition.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DossierState {
    entries: Vec<DossierEntry>,
    evidence: Vec<EvidenceCard>,
    point_states: HashMap<PointId, PointState>,
    flags: HashMap<String, bool>,
    traits: Vec<String>,
    active_case_id: Option<CaseId>,
}

/// See module docs.
#[derive(Default)]
pub struct Dossier {
    state: Mutex<DossierState>,
}

impl Dossier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry once; a second add with the same id is ignored.
    pub async fn add_entry(&self, entry: DossierEntry) -> bool {
        let mut state = self.state.lock().await;
        if state.entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        state.entries.push(entry);
        true
    }

    /// Clears the locked marker on an entry. Unknown ids are ignored.
    pub async fn unlock_entry(&self, id: &EntryId) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.iter_mut().find(|e| &e.id == id) {
            entry.locked = false;
        }
    }

    /// Adds an evidence card once; duplicates by id are ignored.
    pub async fn add_evidence_card(&self, card: EvidenceCard) -> bool {
        let mut state = self.state.lock().await;
        if state.evidence.iter().any(|e| e.id == card.id) {
            return false;
        }
        state.evidence.push(card);
        true
    }

    /// Raises a point's state, never lowering it. Returns whether the
    /// state actually changed.
    pub async fn upgrade_point(&self, point_id: &PointId, to: PointState) -> bool {
        let mut state = self.state.lock().await;
        let current = state.point_states.get(point_id).copied().unwrap_or_default();
        if to <= current {
            return false;
        }
        state.point_states.insert(point_id.clone(), to);
        true
    }

    /// Writes a point state verbatim, downgrades included.
    pub async fn set_point_state(&self, point_id: &PointId, to: PointState) {
        let mut state = self.state.lock().await;
        state.point_states.insert(point_id.clone(), to);
    }

    pub async fn point_state(&self, point_id: &PointId) -> PointState {
        let state = self.state.lock().await;
        state.point_states.get(point_id).copied().unwrap_or_default()
    }

    pub async fn set_flag(&self, flag: impl Into<String>, value: bool) {
        let mut state = self.state.lock().await;
        state.flags.insert(flag.into(), value);
    }

    /// Bulk-raise: every listed flag is set true.
    pub async fn add_flags(&self, flags: impl IntoIterator<Item = String>) {
        let mut state = self.state.lock().await;
        for flag in flags {
            state.flags.insert(flag, true);
        }
    }

    /// An unset flag reads as false.
    pub async fn flag(&self, flag: &str) -> bool {
        let state = self.state.lock().await;
        state.flags.get(flag).copied().unwrap_or(false)
    }

    /// Records a character trait once. Quest rewards merge through here.
    pub async fn add_trait(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut state = self.state.lock().await;
        if state.traits.iter().any(|t| t == &name) {
            return false;
        }
        state.traits.push(name);
        true
    }

    pub async fn set_active_case(&self, case_id: Option<CaseId>) {
        let mut state = self.state.lock().await;
        state.active_case_id = case_id;
    }

    pub async fn active_case(&self) -> Option<CaseId> {
        let state = self.state.lock().await;
        state.active_case_id.clone()
    }

    pub async fn entries(&self) -> Vec<DossierEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn evidence_cards(&self) -> Vec<EvidenceCard> {
        self.state.lock().await.evidence.clone()
    }

    pub async fn flags(&self) -> HashMap<String, bool> {
        self.state.lock().await.flags.clone()
    }

    pub async fn point_states(&self) -> HashMap<PointId, PointState> {
        self.state.lock().await.point_states.clone()
    }

    pub async fn traits(&self) -> Vec<String> {
        self.state.lock().await.traits.clone()
    }

    /// Wipes the casebook back to a fresh session.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = DossierState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn when_entry_is_added_twice_then_second_add_is_ignored() {
        let dossier = Dossier::new();
        let entry = DossierEntry {
            id: EntryId::new("entry_bank_layout"),
            kind: EntryKind::Document,
            title: "Bank floor plan".to_string(),
            content: "Vault behind the clerk's office.".to_string(),
            locked: true,
        };

        assert!(dossier.add_entry(entry.clone()).await);
        assert!(!dossier.add_entry(entry).await);

        dossier.unlock_entry(&EntryId::new("entry_bank_layout")).await;
        let entries = dossier.entries().await;
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].locked);
    }

    #[tokio::test]
    async fn when_point_is_upgraded_then_it_never_downgrades() {
        let dossier = Dossier::new();
        let point = PointId::new("point_bank");

        assert!(dossier.upgrade_point(&point, PointState::Discovered).await);
        assert!(dossier.upgrade_point(&point, PointState::Visited).await);
        assert!(!dossier.upgrade_point(&point, PointState::Discovered).await);
        assert_eq!(dossier.point_state(&point).await, PointState::Visited);
    }

    #[tokio::test]
    async fn when_flags_are_bulk_added_then_all_read_true() {
        let dossier = Dossier::new();
        dossier.set_flag("vault_inspected", false).await;
        dossier
            .add_flags(["vault_inspected".to_string(), "clerk_interviewed".to_string()])
            .await;

        assert!(dossier.flag("vault_inspected").await);
        assert!(dossier.flag("clerk_interviewed").await);
        assert!(!dossier.flag("never_set").await);
    }

    #[tokio::test]
    async fn when_trait_repeats_then_it_is_kept_once() {
        let dossier = Dossier::new();
        assert!(dossier.add_trait("observant").await);
        assert!(!dossier.add_trait("observant").await);
        assert_eq!(dossier.traits().await, vec!["observant".to_string()]);
    }

    #[tokio::test]
    async fn when_reset_then_everything_clears() {
        let dossier = Dossier::new();
        dossier.set_flag("vault_inspected", true).await;
        dossier.set_active_case(Some(CaseId::new("case_01_bank"))).await;
        dossier
            .add_evidence_card(EvidenceCard {
                id: EvidenceId::new("evd_vault_scratches"),
                title: "Scratches on the vault".to_string(),
                description: None,
            })
            .await;

        dossier.reset().await;

        assert!(!dossier.flag("vault_inspected").await);
        assert!(dossier.active_case().await.is_none());
        assert!(dossier.evidence_cards().await.is_empty());
    }
}
