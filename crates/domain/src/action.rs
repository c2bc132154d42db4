//! Action DSL for authored map bindings
//!
//! Actions are the effect half of a point binding: what happens when an
//! available interaction fires. The vocabulary is closed and includes the
//! legacy bulk forms still present in shipped content packs.

use serde::{Deserialize, Serialize};

use crate::ids::{
    CaseId, EntryId, EvidenceId, MerchantId, PointGroupId, PointId, QuestId, ScenarioId, StageId,
};

/// Toast severity for `show_toast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
}

/// Authored action vocabulary. Executed strictly in authored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    StartScenario { scenario_id: ScenarioId },
    #[serde(rename_all = "camelCase")]
    UnlockPoint { point_id: PointId },
    #[serde(rename_all = "camelCase")]
    UnlockGroup { group_id: PointGroupId },
    #[serde(rename_all = "camelCase")]
    GrantEvidence { evidence_id: EvidenceId },
    #[serde(rename_all = "camelCase")]
    AddFact { fact_id: EntryId },
    #[serde(rename_all = "camelCase")]
    SetFlag { flag_id: String, value: bool },
    #[serde(rename_all = "camelCase")]
    SetQuestStage { quest_id: QuestId, stage: StageId },
    #[serde(rename_all = "camelCase")]
    StartBattle {
        scenario_id: ScenarioId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deck_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    OpenTrade { shop_id: MerchantId },
    #[serde(rename_all = "camelCase")]
    Teleport { target_point_id: PointId },
    ShowToast {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<ToastVariant>,
    },
    // Legacy authored forms, still in shipped packs
    AddFlags { flags: Vec<String> },
    #[serde(rename_all = "camelCase")]
    UnlockEntry { entry_id: EntryId },
    #[serde(rename_all = "camelCase")]
    SetActiveCase { case_id: CaseId },
    /// Catch-all for tags this build does not know. Load-time validation
    /// rejects these; anything that slips through executes as a no-op.
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown)
    }
}
