//! One player's running game.
//!
//! `GameSession` stitches the five stores and the authored content pack
//! into the surface a frontend drives. Every interaction runs as a batch:
//! execute the authored actions in order, collect the signals only a
//! frontend can honor, then settle quests once against the updated flags.
//! Rewards for quests that finish during a batch are granted inside the
//! batch, and the quest log is persisted before the batch returns.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use gumshoe_domain::{
    resolve_auto_interaction, resolve_interactions, resolve_qr_activation, sweet_spot_visibility,
    Action, CaseId, EvalContext, EvidenceId, ItemEffect, ItemId, ItemStack, MerchantDefinition,
    MerchantId, PointId, PointState, ProgressTickResult, ProgressionInput, QrActivation,
    QuestEvaluation, QuestId, QuestRewards, ScenarioId, StageAdvance, StageId, StartInterrogation,
    SweetSpotVisibility, TensionApplyResult, TickAction, ToastVariant, TriggerKind, UserId,
    VoiceId, VoiceXpGain,
};

use crate::infrastructure::ports::{RepoError, SaveGameRepo};
use crate::stores::{
    CaseAdvanceRequest, Dossier, DossierEntry, EvidenceCard, Interrogation, Inventory, QuestLog,
    SessionCall, TradeContext, TradeError, TradeReceipt, TravelCall, TravelParams, WorldSession,
};
use crate::use_cases::case::CaseAdvanceOutcome;
use crate::use_cases::content::GameContent;

/// Outward intent produced by scene actions. The engine applies state
/// effects itself; these are the parts only a frontend can honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    StartScenario {
        scenario_id: ScenarioId,
    },
    StartBattle {
        scenario_id: ScenarioId,
        deck_type: Option<String>,
    },
    OpenTrade {
        shop_id: MerchantId,
    },
    Teleport {
        target_point_id: PointId,
    },
    Toast {
        message: String,
        variant: ToastVariant,
    },
}

/// What one interaction batch produced: frontend signals plus the quest
/// movement it caused.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub signals: Vec<SessionSignal>,
    pub quest_events: Vec<(QuestId, QuestEvaluation)>,
}

impl BatchOutcome {
    /// Quests that finished during this batch.
    pub fn completed_quests(&self) -> Vec<QuestId> {
        self.quest_events
            .iter()
            .filter(|(_, evaluation)| evaluation.just_completed)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// A travel call plus whatever arriving triggered.
#[derive(Debug, Clone)]
pub struct TravelBatch {
    pub call: TravelCall,
    pub batch: BatchOutcome,
}

/// A stage-advance attempt plus whatever its trigger actions produced.
#[derive(Debug, Clone)]
pub struct QuestAdvance {
    pub result: StageAdvance,
    pub batch: BatchOutcome,
}

/// One interview beat: the tension move, the progress tick, and the scene
/// to cut to when this beat caused a lockout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterrogationBeat {
    pub tension: TensionApplyResult,
    pub progress: ProgressTickResult,
    pub lockout_scene: Option<String>,
}

/// A clickable option at a point, with availability under current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionOption {
    pub binding_id: String,
    pub label: Option<String>,
    pub available: bool,
}

/// Flag recorded when a point is first reached. Quest objectives and
/// binding conditions key on these.
pub fn visit_flag(point_id: &PointId) -> String {
    format!("VISITED_{point_id}")
}

/// See module docs.
pub struct GameSession {
    pub content: Arc<GameContent>,
    pub world: Arc<WorldSession>,
    pub dossier: Dossier,
    pub quests: QuestLog,
    pub inventory: Inventory,
    pub interrogation: Interrogation,
    case_id: Option<CaseId>,
}

impl GameSession {
    pub fn new(
        user_id: UserId,
        case_id: Option<CaseId>,
        content: Arc<GameContent>,
        world: Arc<WorldSession>,
        save_game: Arc<dyn SaveGameRepo>,
    ) -> Self {
        let merchants: HashMap<MerchantId, MerchantDefinition> = content
            .merchants
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();
        let inventory = Inventory::new(
            user_id.clone(),
            Arc::new(content.items.clone()),
            Arc::new(merchants),
            save_game.clone(),
        );
        let quests = QuestLog::new(user_id, save_game);
        let interrogation = Interrogation::new(Arc::new(content.profiles.clone()));
        Self {
            content,
            world,
            dossier: Dossier::new(),
            quests,
            inventory,
            interrogation,
            case_id,
        }
    }

    /// Brings the session up: hydrates the world view, registers authored
    /// content, restores saved progress, and opens the configured case.
    /// Returns whether the world view hydrated.
    pub async fn bootstrap(&self) -> bool {
        let hydrated = matches!(self.world.hydrate().await, SessionCall::Done(_));

        self.quests
            .register_quests(self.content.quests.iter().cloned())
            .await;
        for point in &self.content.points {
            self.dossier
                .set_point_state(&point.id, point.initial_state())
                .await;
        }
        if let Err(error) = self.quests.hydrate().await {
            warn!(%error, "quest log hydration failed");
        }
        if let Err(error) = self.inventory.hydrate().await {
            warn!(%error, "inventory hydration failed");
        }

        if let Some(case_id) = self.case_id.clone() {
            self.open_case(&case_id).await;
        }
        hydrated
    }

    /// Makes a case the active investigation and starts its quest.
    pub async fn open_case(&self, case_id: &CaseId) {
        self.dossier.set_active_case(Some(case_id.clone())).await;
        let Some(case) = self.content.case(case_id) else {
            warn!(%case_id, "opened a case the pack does not define");
            return;
        };
        if let Some(quest_id) = &case.opening_quest_id {
            self.quests.start_quest(quest_id).await;
        }
    }

    // =========================================================================
    // Action batches
    // =========================================================================

    /// Applies one batch of authored actions (a scene beat, a binding),
    /// then settles quests once against the updated state.
    pub async fn apply_actions(&self, actions: &[Action]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        self.execute_actions(actions, &mut outcome.signals).await;
        self.settle_quests(&mut outcome).await;
        outcome
    }

    async fn execute_actions(&self, actions: &[Action], signals: &mut Vec<SessionSignal>) {
        for action in actions {
            match action {
                Action::StartScenario { scenario_id } => {
                    signals.push(SessionSignal::StartScenario {
                        scenario_id: scenario_id.clone(),
                    });
                }
                Action::UnlockPoint { point_id } => {
                    self.dossier
                        .upgrade_point(point_id, PointState::Discovered)
                        .await;
                }
                Action::UnlockGroup { group_id } => {
                    let ids: Vec<PointId> = self
                        .content
                        .points_in_group(group_id)
                        .map(|p| p.id.clone())
                        .collect();
                    if ids.is_empty() {
                        warn!(%group_id, "unlock targeted an empty point group");
                    }
                    for id in &ids {
                        self.dossier.upgrade_point(id, PointState::Discovered).await;
                    }
                }
                Action::GrantEvidence { evidence_id } => {
                    self.record_evidence(evidence_id.clone(), None).await;
                }
                Action::AddFact { fact_id } => {
                    self.dossier
                        .add_entry(DossierEntry::fact(fact_id.clone()))
                        .await;
                }
                Action::SetFlag { flag_id, value } => {
                    self.dossier.set_flag(flag_id.clone(), *value).await;
                }
                Action::SetQuestStage { quest_id, stage } => {
                    self.quests.force_stage(quest_id, stage).await;
                }
                Action::StartBattle {
                    scenario_id,
                    deck_type,
                } => {
                    signals.push(SessionSignal::StartBattle {
                        scenario_id: scenario_id.clone(),
                        deck_type: deck_type.clone(),
                    });
                }
                Action::OpenTrade { shop_id } => {
                    signals.push(SessionSignal::OpenTrade {
                        shop_id: shop_id.clone(),
                    });
                }
                Action::Teleport { target_point_id } => {
                    signals.push(SessionSignal::Teleport {
                        target_point_id: target_point_id.clone(),
                    });
                }
                Action::ShowToast { message, variant } => {
                    signals.push(SessionSignal::Toast {
                        message: message.clone(),
                        variant: variant.unwrap_or(ToastVariant::Info),
                    });
                }
                Action::AddFlags { flags } => {
                    self.dossier.add_flags(flags.iter().cloned()).await;
                }
                Action::UnlockEntry { entry_id } => {
                    self.dossier.unlock_entry(entry_id).await;
                }
                Action::SetActiveCase { case_id } => {
                    self.open_case(case_id).await;
                }
                Action::Unknown => warn!("skipping unrecognized scene action"),
            }
        }
    }

    /// Registers a discovery with the world service and mirrors a card
    /// into the casebook. Returns whether the discovery was recorded.
    pub async fn record_evidence(
        &self,
        evidence_id: EvidenceId,
        source_scene_id: Option<String>,
    ) -> bool {
        let Some(definition) = self.content.evidence.get(&evidence_id) else {
            warn!(%evidence_id, "granted evidence missing from the catalog");
            return false;
        };
        let call = self
            .world
            .discover_evidence(evidence_id, source_scene_id, None)
            .await;
        if call.done().is_none() {
            return false;
        }
        self.dossier
            .add_evidence_card(EvidenceCard::from(definition))
            .await;
        true
    }

    /// Evaluates every active quest against current flags, grants rewards
    /// for quests that just finished, and persists the log.
    async fn settle_quests(&self, outcome: &mut BatchOutcome) {
        let flags = self.dossier.flags().await;
        let tick = self.world.view().await.world_clock.tick;
        let events = self.quests.evaluate_all(&flags, tick).await;
        for (_, evaluation) in &events {
            if let Some(rewards) = &evaluation.rewards {
                self.grant_rewards(rewards).await;
            }
        }
        if let Err(error) = self.quests.persist().await {
            warn!(%error, "quest log persistence failed");
        }
        outcome.quest_events = events;
    }

    async fn grant_rewards(&self, rewards: &QuestRewards) {
        if rewards.xp > 0 {
            self.world
                .apply_progression(ProgressionInput::xp_only(rewards.xp as i64))
                .await;
        }
        for name in &rewards.traits {
            self.dossier.add_trait(name.clone()).await;
        }
    }

    // =========================================================================
    // Map points
    // =========================================================================

    /// Marker-click options at a point, for menu rendering.
    pub async fn point_options(&self, point_id: &PointId) -> Vec<InteractionOption> {
        let Some(point) = self.content.point(point_id) else {
            return Vec::new();
        };
        let ctx = self.eval_context().await;
        resolve_interactions(&point.bindings, TriggerKind::MarkerClick, &ctx)
            .into_iter()
            .map(|r| InteractionOption {
                binding_id: r.binding.id.clone(),
                label: r.binding.label.clone(),
                available: r.available,
            })
            .collect()
    }

    /// Runs one marker-click binding by id, re-checking availability at
    /// execution time.
    pub async fn click_binding(&self, point_id: &PointId, binding_id: &str) -> BatchOutcome {
        let Some(point) = self.content.point(point_id) else {
            warn!(%point_id, "click on a point the pack does not define");
            return BatchOutcome::default();
        };
        let ctx = self.eval_context().await;
        let resolved = resolve_interactions(&point.bindings, TriggerKind::MarkerClick, &ctx);
        let Some(hit) = resolved.iter().find(|r| r.binding.id == binding_id) else {
            warn!(%point_id, binding_id, "no such marker binding");
            return BatchOutcome::default();
        };
        if !hit.available {
            warn!(%point_id, binding_id, "binding conditions not met");
            return BatchOutcome::default();
        }
        let actions = hit.binding.actions.clone();
        self.apply_actions(&actions).await
    }

    /// Marks a point visited: raises its state, sets the visit flag quest
    /// logic watches, then runs the first available arrive binding.
    pub async fn arrive_at_point(&self, point_id: &PointId) -> BatchOutcome {
        let Some(point) = self.content.point(point_id) else {
            warn!(%point_id, "arrival at a point the pack does not define");
            return BatchOutcome::default();
        };
        self.dossier
            .upgrade_point(point_id, PointState::Visited)
            .await;
        self.dossier.set_flag(visit_flag(point_id), true).await;

        let ctx = self.eval_context().await;
        let actions = resolve_auto_interaction(&point.bindings, TriggerKind::Arrive, &ctx)
            .map(|binding| binding.actions.clone())
            .unwrap_or_default();
        self.apply_actions(&actions).await
    }

    /// Resolves a physical QR scan at a point. Re-scanning a point that is
    /// already open changes nothing.
    pub async fn scan_qr(&self, point_id: &PointId) -> BatchOutcome {
        let Some(point) = self.content.point(point_id) else {
            warn!(%point_id, "scan of a point the pack does not define");
            return BatchOutcome::default();
        };
        let current = self.dossier.point_state(point_id).await;
        let ctx = self.eval_context().await;
        match resolve_qr_activation(point_id, current, &point.bindings, &ctx) {
            QrActivation::AlreadyUnlocked => BatchOutcome::default(),
            QrActivation::Unlocked { actions } => self.apply_actions(&actions).await,
        }
    }

    // =========================================================================
    // World
    // =========================================================================

    /// Travels between city locations. Arriving visits the matching map
    /// point when the pack has one, so bindings and visit flags fire.
    pub async fn travel(&self, params: TravelParams) -> TravelBatch {
        let call = self.world.travel(params).await;
        let batch = match &call {
            TravelCall::Arrived { session, .. } => {
                let point_id = PointId::new(session.to_location_id.as_str());
                if self.content.point(&point_id).is_some() {
                    self.arrive_at_point(&point_id).await
                } else {
                    let mut outcome = BatchOutcome::default();
                    self.settle_quests(&mut outcome).await;
                    outcome
                }
            }
            _ => BatchOutcome::default(),
        };
        TravelBatch { call, batch }
    }

    /// Advances the active case through the world service.
    pub async fn advance_case(
        &self,
        request: CaseAdvanceRequest,
    ) -> SessionCall<CaseAdvanceOutcome> {
        self.world.advance_case(request).await
    }

    /// Advances a quest along an authored transition, gated on current
    /// flags, and runs the transition's trigger actions.
    pub async fn advance_quest(&self, quest_id: &QuestId, to: &StageId) -> QuestAdvance {
        let flags = self.dossier.flags().await;
        let result = self.quests.advance_stage(quest_id, to, &flags).await;
        let batch = match &result {
            StageAdvance::Advanced {
                trigger_actions, ..
            } => self.apply_actions(trigger_actions).await,
            StageAdvance::Rejected { reason } => {
                warn!(%quest_id, %reason, "stage advance rejected");
                BatchOutcome::default()
            }
        };
        QuestAdvance { result, batch }
    }

    // =========================================================================
    // Interrogation
    // =========================================================================

    /// Opens an interview. Refuses when the character has no profile; a
    /// prior lockout on this pairing carries into the session.
    pub async fn start_interrogation(&self, params: StartInterrogation) -> bool {
        self.interrogation.start(params).await
    }

    /// One interview beat: apply the approach's tension shift, bank
    /// progress against current voice levels, and spend a world tick.
    pub async fn interrogation_beat(&self, delta: i32) -> InterrogationBeat {
        let tension = self.interrogation.apply_delta(delta).await;
        let voices = self.world.voice_levels().await;
        let progress = self.interrogation.tick_progress(&voices).await;
        self.world.tick_time(TickAction::Interrogate, None).await;

        let lockout_scene = if tension.just_locked_out {
            self.interrogation.snapshot().await.lockout_scene_id
        } else {
            None
        };
        InterrogationBeat {
            tension,
            progress,
            lockout_scene,
        }
    }

    /// Ends the interview, keeping lockouts and banked influence.
    pub async fn end_interrogation(&self) {
        self.interrogation.end().await;
    }

    /// How much of the sweet spot the UI may reveal, from the named voice.
    pub async fn sweet_spot_visibility(&self, voice_id: &VoiceId) -> SweetSpotVisibility {
        let level = self
            .world
            .voice_levels()
            .await
            .get(voice_id)
            .copied()
            .unwrap_or(0);
        sweet_spot_visibility(level)
    }

    // =========================================================================
    // Trade and items
    // =========================================================================

    /// Stock a merchant currently offers, after stage rules and this
    /// session's sales.
    pub async fn merchant_stock(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<ItemStack>, TradeError> {
        let stages = self.quests.stage_views().await;
        self.inventory.merchant_stock(merchant_id, &stages).await
    }

    pub async fn buy(
        &self,
        merchant_id: &MerchantId,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<TradeReceipt, TradeError> {
        let ctx = self.trade_context().await;
        self.inventory.buy(merchant_id, item_id, quantity, &ctx).await
    }

    pub async fn sell(
        &self,
        merchant_id: &MerchantId,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<TradeReceipt, TradeError> {
        let ctx = self.trade_context().await;
        self.inventory
            .sell(merchant_id, item_id, quantity, &ctx)
            .await
    }

    /// Consumes one of an item and applies its effects, then lets quests
    /// react to whatever the effects changed.
    pub async fn use_item(&self, item_id: &ItemId) -> Result<BatchOutcome, TradeError> {
        let effects = self.inventory.use_item(item_id).await?;
        for effect in effects {
            self.apply_item_effect(effect).await;
        }
        let mut outcome = BatchOutcome::default();
        self.settle_quests(&mut outcome).await;
        Ok(outcome)
    }

    async fn apply_item_effect(&self, effect: ItemEffect) {
        match effect {
            ItemEffect::GrantXp { amount } => {
                self.world
                    .apply_progression(ProgressionInput::xp_only(amount as i64))
                    .await;
            }
            ItemEffect::AddFlag { flag_id, value } => {
                self.dossier.set_flag(flag_id, value.unwrap_or(true)).await;
            }
            ItemEffect::AddVoiceLevel { voice_id, amount } => {
                let input = ProgressionInput {
                    voice_xp: vec![VoiceXpGain {
                        voice_id,
                        xp: i64::from(amount) * 100,
                    }],
                    ..ProgressionInput::default()
                };
                self.world.apply_progression(input).await;
            }
            ItemEffect::Unknown => warn!("skipping unrecognized item effect"),
        }
    }

    // =========================================================================
    // Shared context
    // =========================================================================

    async fn eval_context(&self) -> EvalContext {
        EvalContext {
            flags: self.dossier.flags().await,
            item_counts: self.inventory.item_counts().await,
            point_states: self.dossier.point_states().await,
            quest_stages: self.quests.stage_views().await,
        }
    }

    async fn trade_context(&self) -> TradeContext {
        TradeContext {
            flags: self.dossier.flags().await,
            faction_reputation: self.world.faction_reputation().await,
            quest_stages: self.quests.stage_views().await,
        }
    }

    /// Saves everything the save surface covers.
    pub async fn persist(&self) -> Result<(), RepoError> {
        self.quests.persist().await?;
        self.inventory.persist().await
    }
}
