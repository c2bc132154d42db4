//! Interrogation store.
//!
//! Wraps the tension state machine with the per-character profile table so
//! callers open interviews by character id alone. Lockout history and
//! influence points live inside the session and survive `end()`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use gumshoe_domain::{
    CharacterId, InterrogationProfile, ProgressTickResult, ScenarioId, StartInterrogation,
    TensionApplyResult, TensionSession, TopicId, VoiceId,
};

/// See module docs.
pub struct Interrogation {
    profiles: Arc<HashMap<CharacterId, InterrogationProfile>>,
    session: Mutex<TensionSession>,
}

impl Interrogation {
    pub fn new(profiles: Arc<HashMap<CharacterId, InterrogationProfile>>) -> Self {
        Self {
            profiles,
            session: Mutex::new(TensionSession::default()),
        }
    }

    /// Opens an interview. A character without a profile cannot be
    /// interrogated and the session is untouched.
    pub async fn start(&self, params: StartInterrogation) -> bool {
        let profile = self.profiles.get(&params.character_id).cloned();
        let mut session = self.session.lock().await;
        session.start(params, profile)
    }

    /// Applies a tension delta from a dialogue choice.
    pub async fn apply_delta(&self, delta: i32) -> TensionApplyResult {
        let mut session = self.session.lock().await;
        session.apply_delta(delta)
    }

    /// Banks progress for the current beat against the player's voices.
    pub async fn tick_progress(&self, voices: &HashMap<VoiceId, u32>) -> ProgressTickResult {
        let mut session = self.session.lock().await;
        session.tick_progress(voices)
    }

    /// Closes the current interview.
    pub async fn end(&self) {
        let mut session = self.session.lock().await;
        session.end();
    }

    pub async fn add_influence_points(&self, amount: u32) {
        let mut session = self.session.lock().await;
        session.add_influence_points(amount);
    }

    /// Spends one influence point; false when broke.
    pub async fn spend_influence_point(&self) -> bool {
        let mut session = self.session.lock().await;
        session.spend_influence_point()
    }

    pub async fn is_locked_out(
        &self,
        scenario_id: &ScenarioId,
        character_id: &CharacterId,
        topic_id: Option<&TopicId>,
    ) -> bool {
        let session = self.session.lock().await;
        session.is_locked_out(scenario_id, character_id, topic_id)
    }

    /// Full session snapshot for the interrogation UI.
    pub async fn snapshot(&self) -> TensionSession {
        self.session.lock().await.clone()
    }
}
