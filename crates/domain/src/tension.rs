//! Interrogation tension engine
//!
//! Interrogating a suspect walks a tension meter between 0 and 100. Each
//! suspect has a sweet spot: while tension sits inside it, pressing for
//! answers makes progress; pushing tension to the lockout threshold ends
//! the interview for good. Player voice levels bend the spot in the
//! player's favor or against it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, ScenarioId, TopicId, VoiceId};

// =============================================================================
// Profile and pure math
// =============================================================================

pub const DEFAULT_LOCKOUT_THRESHOLD: i32 = 100;
const VULNERABLE_VOICE_EXPANSION: i32 = 5;
const VULNERABLE_VOICE_THRESHOLD: u32 = 5;
const RESISTANT_VOICE_CONTRACTION: i32 = 5;
const RESISTANT_VOICE_THRESHOLD: u32 = 5;

/// How a suspect responds to pressure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterrogationProfile {
    pub sweet_spot_min: i32,
    pub sweet_spot_max: i32,
    /// Progress ticks needed to crack the suspect.
    pub progress_required: u32,
    /// A strong player voice that widens the spot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_voice: Option<VoiceId>,
    /// A suspect defense: the spot narrows until the player levels the
    /// matching voice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resistant_voice: Option<VoiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockout_threshold: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSweetSpot {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweetSpotVisibility {
    Hidden,
    Partial,
    Full,
}

fn voice_level(voices: &HashMap<VoiceId, u32>, voice: &VoiceId) -> u32 {
    voices.get(voice).copied().unwrap_or(0)
}

/// Clamp a tension value to 0..=100.
pub fn clamp_tension(value: i32) -> i32 {
    value.clamp(0, 100)
}

/// The sweet spot after voice adjustments. A high vulnerable voice widens
/// the range; an unanswered resistant voice narrows it. If the range
/// inverts, it collapses to its clamped midpoint.
pub fn effective_sweet_spot(
    profile: &InterrogationProfile,
    voices: &HashMap<VoiceId, u32>,
) -> EffectiveSweetSpot {
    let mut min = profile.sweet_spot_min;
    let mut max = profile.sweet_spot_max;

    if let Some(voice) = &profile.vulnerable_voice {
        if voice_level(voices, voice) >= VULNERABLE_VOICE_THRESHOLD {
            min = (min - VULNERABLE_VOICE_EXPANSION).max(0);
            max = (max + VULNERABLE_VOICE_EXPANSION).min(100);
        }
    }

    if let Some(voice) = &profile.resistant_voice {
        if voice_level(voices, voice) < RESISTANT_VOICE_THRESHOLD {
            min = (min + RESISTANT_VOICE_CONTRACTION).min(100);
            max = (max - RESISTANT_VOICE_CONTRACTION).max(0);
        }
    }

    if min > max {
        let pivot = clamp_tension(((min + max) as f64 / 2.0).round() as i32);
        return EffectiveSweetSpot {
            min: pivot,
            max: pivot,
        };
    }

    EffectiveSweetSpot { min, max }
}

/// Inclusive sweet-spot membership.
pub fn in_sweet_spot(
    tension: i32,
    profile: &InterrogationProfile,
    voices: &HashMap<VoiceId, u32>,
) -> bool {
    let spot = effective_sweet_spot(profile, voices);
    tension >= spot.min && tension <= spot.max
}

/// Tension at or past the threshold locks the interview.
pub fn should_lockout(tension: i32, threshold: Option<i32>) -> bool {
    tension >= threshold.unwrap_or(DEFAULT_LOCKOUT_THRESHOLD)
}

/// Progress earned this beat: 1 inside the spot, 0 outside.
pub fn progress_tick(
    tension: i32,
    profile: &InterrogationProfile,
    voices: &HashMap<VoiceId, u32>,
) -> u32 {
    if in_sweet_spot(tension, profile, voices) {
        1
    } else {
        0
    }
}

/// How much of the sweet spot the UI may reveal, from the player's
/// perception level.
pub fn sweet_spot_visibility(perception: u32) -> SweetSpotVisibility {
    if perception > 5 {
        SweetSpotVisibility::Full
    } else if perception >= 3 {
        SweetSpotVisibility::Partial
    } else {
        SweetSpotVisibility::Hidden
    }
}

// =============================================================================
// Session state
// =============================================================================

fn lockout_key(scenario_id: &ScenarioId, character_id: &CharacterId, topic_id: Option<&TopicId>) -> String {
    let topic = topic_id.map(|t| t.as_str()).unwrap_or("_");
    format!("{scenario_id}:{character_id}:{topic}")
}

/// Parameters to open an interrogation.
#[derive(Debug, Clone)]
pub struct StartInterrogation {
    pub character_id: CharacterId,
    pub scenario_id: ScenarioId,
    pub topic_id: Option<TopicId>,
    pub lockout_scene_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TensionApplyResult {
    pub locked_out: bool,
    pub just_locked_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressTickResult {
    pub ticked: bool,
    pub completed: bool,
}

/// Interrogation session state. Lockout keys and influence points outlive
/// individual interviews; everything else resets per session.
#[derive(Debug, Clone, Default)]
pub struct TensionSession {
    pub tension: i32,
    pub progress: u32,
    pub target_character_id: Option<CharacterId>,
    pub scenario_id: Option<ScenarioId>,
    pub topic_id: Option<TopicId>,
    pub lockout_scene_id: Option<String>,
    pub locked_out: bool,
    pub completed: bool,
    pub influence_points: u32,
    lockout_keys: HashSet<String>,
    profile: Option<InterrogationProfile>,
}

impl TensionSession {
    /// Open an interview. A character without a profile cannot be
    /// interrogated; the session stays untouched and `false` comes back.
    pub fn start(&mut self, params: StartInterrogation, profile: Option<InterrogationProfile>) -> bool {
        let Some(profile) = profile else {
            return false;
        };

        let key = lockout_key(
            &params.scenario_id,
            &params.character_id,
            params.topic_id.as_ref(),
        );
        self.target_character_id = Some(params.character_id);
        self.scenario_id = Some(params.scenario_id);
        self.topic_id = params.topic_id;
        self.lockout_scene_id = params.lockout_scene_id;
        self.profile = Some(profile);
        self.tension = 0;
        self.progress = 0;
        self.completed = false;
        self.locked_out = self.lockout_keys.contains(&key);
        true
    }

    fn current_key(&self) -> Option<String> {
        let scenario = self.scenario_id.as_ref()?;
        let character = self.target_character_id.as_ref()?;
        Some(lockout_key(scenario, character, self.topic_id.as_ref()))
    }

    fn inactive(&self) -> bool {
        self.target_character_id.is_none() || self.locked_out || self.completed
    }

    /// Apply a tension delta from a dialogue choice. Crossing the
    /// threshold locks this suspect/topic pair permanently.
    pub fn apply_delta(&mut self, delta: i32) -> TensionApplyResult {
        if self.inactive() {
            return TensionApplyResult {
                locked_out: self.locked_out,
                just_locked_out: false,
            };
        }

        let new_tension = clamp_tension(self.tension + delta);
        let threshold = self.profile.as_ref().and_then(|p| p.lockout_threshold);

        if should_lockout(new_tension, threshold) {
            self.tension = new_tension;
            self.locked_out = true;
            if let Some(key) = self.current_key() {
                self.lockout_keys.insert(key);
            }
            return TensionApplyResult {
                locked_out: true,
                just_locked_out: true,
            };
        }

        self.tension = new_tension;
        TensionApplyResult {
            locked_out: false,
            just_locked_out: false,
        }
    }

    /// Bank progress for the current beat. Completing an interview grants
    /// one influence point.
    pub fn tick_progress(&mut self, voices: &HashMap<VoiceId, u32>) -> ProgressTickResult {
        if self.inactive() {
            return ProgressTickResult {
                ticked: false,
                completed: false,
            };
        }

        let Some(profile) = self.profile.clone() else {
            return ProgressTickResult {
                ticked: false,
                completed: false,
            };
        };

        let tick = progress_tick(self.tension, &profile, voices);
        if tick == 0 {
            return ProgressTickResult {
                ticked: false,
                completed: false,
            };
        }

        let new_progress = self.progress + tick;
        self.progress = new_progress;
        if new_progress >= profile.progress_required {
            self.completed = true;
            self.influence_points += 1;
            return ProgressTickResult {
                ticked: true,
                completed: true,
            };
        }

        ProgressTickResult {
            ticked: true,
            completed: false,
        }
    }

    /// Close the interview. Lockout history and influence points persist
    /// across sessions.
    pub fn end(&mut self) {
        self.tension = 0;
        self.progress = 0;
        self.target_character_id = None;
        self.scenario_id = None;
        self.topic_id = None;
        self.lockout_scene_id = None;
        self.locked_out = false;
        self.completed = false;
        self.profile = None;
    }

    pub fn add_influence_points(&mut self, amount: u32) {
        self.influence_points += amount;
    }

    /// Spend one influence point. Returns false when broke.
    pub fn spend_influence_point(&mut self) -> bool {
        if self.influence_points == 0 {
            return false;
        }
        self.influence_points -= 1;
        true
    }

    pub fn is_locked_out(
        &self,
        scenario_id: &ScenarioId,
        character_id: &CharacterId,
        topic_id: Option<&TopicId>,
    ) -> bool {
        self.lockout_keys
            .contains(&lockout_key(scenario_id, character_id, topic_id))
    }

    pub fn profile(&self) -> Option<&InterrogationProfile> {
        self.profile.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_profile() -> InterrogationProfile {
        InterrogationProfile {
            sweet_spot_min: 40,
            sweet_spot_max: 70,
            progress_required: 5,
            vulnerable_voice: None,
            resistant_voice: None,
            lockout_threshold: None,
        }
    }

    fn start_params() -> StartInterrogation {
        StartInterrogation {
            character_id: CharacterId::new("clerk"),
            scenario_id: ScenarioId::new("interrogation_clerk_demo"),
            topic_id: Some(TopicId::new("robbery")),
            lockout_scene_id: Some("beat_lockout_result".to_string()),
        }
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_tension(-10), 0);
        assert_eq!(clamp_tension(150), 100);
        assert_eq!(clamp_tension(55), 55);
    }

    #[test]
    fn base_spot_without_voices() {
        let spot = effective_sweet_spot(&base_profile(), &HashMap::new());
        assert_eq!(spot, EffectiveSweetSpot { min: 40, max: 70 });
    }

    #[test]
    fn vulnerable_voice_at_level_five_widens_the_spot() {
        let profile = InterrogationProfile {
            vulnerable_voice: Some(VoiceId::new("logic")),
            ..base_profile()
        };

        let mut voices = HashMap::new();
        voices.insert(VoiceId::new("logic"), 3);
        let spot = effective_sweet_spot(&profile, &voices);
        assert_eq!(spot, EffectiveSweetSpot { min: 40, max: 70 });

        voices.insert(VoiceId::new("logic"), 5);
        let spot = effective_sweet_spot(&profile, &voices);
        assert_eq!(spot, EffectiveSweetSpot { min: 35, max: 75 });
    }

    #[test]
    fn unanswered_resistant_voice_narrows_the_spot() {
        let profile = InterrogationProfile {
            resistant_voice: Some(VoiceId::new("composure")),
            ..base_profile()
        };

        let mut voices = HashMap::new();
        voices.insert(VoiceId::new("composure"), 2);
        let spot = effective_sweet_spot(&profile, &voices);
        assert_eq!(spot, EffectiveSweetSpot { min: 45, max: 65 });

        voices.insert(VoiceId::new("composure"), 5);
        let spot = effective_sweet_spot(&profile, &voices);
        assert_eq!(spot, EffectiveSweetSpot { min: 40, max: 70 });
    }

    #[test]
    fn inverted_spot_collapses_to_midpoint() {
        let profile = InterrogationProfile {
            sweet_spot_min: 50,
            sweet_spot_max: 52,
            resistant_voice: Some(VoiceId::new("composure")),
            ..base_profile()
        };

        // Contraction pushes min to 55 and max to 47; midpoint is 51
        let spot = effective_sweet_spot(&profile, &HashMap::new());
        assert_eq!(spot, EffectiveSweetSpot { min: 51, max: 51 });
    }

    #[test]
    fn sweet_spot_bounds_are_inclusive() {
        let profile = base_profile();
        let voices = HashMap::new();

        assert!(in_sweet_spot(40, &profile, &voices));
        assert!(in_sweet_spot(70, &profile, &voices));
        assert!(!in_sweet_spot(39, &profile, &voices));
        assert!(!in_sweet_spot(71, &profile, &voices));
    }

    #[test]
    fn lockout_fires_exactly_at_the_threshold() {
        assert!(!should_lockout(99, None));
        assert!(should_lockout(100, None));
        assert!(should_lockout(80, Some(80)));
        assert!(!should_lockout(79, Some(80)));
    }

    #[test]
    fn visibility_follows_perception() {
        assert_eq!(sweet_spot_visibility(0), SweetSpotVisibility::Hidden);
        assert_eq!(sweet_spot_visibility(2), SweetSpotVisibility::Hidden);
        assert_eq!(sweet_spot_visibility(3), SweetSpotVisibility::Partial);
        assert_eq!(sweet_spot_visibility(5), SweetSpotVisibility::Partial);
        assert_eq!(sweet_spot_visibility(6), SweetSpotVisibility::Full);
    }

    #[test]
    fn start_without_profile_is_a_noop() {
        let mut session = TensionSession::default();
        assert!(!session.start(start_params(), None));
        assert!(session.target_character_id.is_none());
    }

    #[test]
    fn delta_walks_tension_and_locks_at_threshold() {
        let mut session = TensionSession::default();
        session.start(start_params(), Some(base_profile()));

        let result = session.apply_delta(60);
        assert_eq!(session.tension, 60);
        assert!(!result.locked_out);

        let result = session.apply_delta(40);
        assert_eq!(session.tension, 100);
        assert!(result.locked_out);
        assert!(result.just_locked_out);

        // Further deltas are ignored once locked
        let result = session.apply_delta(-50);
        assert_eq!(session.tension, 100);
        assert!(result.locked_out);
        assert!(!result.just_locked_out);
    }

    #[test]
    fn lockout_persists_across_sessions_for_the_same_topic() {
        let mut session = TensionSession::default();
        session.start(start_params(), Some(base_profile()));
        session.apply_delta(120);
        session.end();

        assert!(session.is_locked_out(
            &ScenarioId::new("interrogation_clerk_demo"),
            &CharacterId::new("clerk"),
            Some(&TopicId::new("robbery")),
        ));
        assert!(!session.is_locked_out(
            &ScenarioId::new("interrogation_clerk_demo"),
            &CharacterId::new("clerk"),
            Some(&TopicId::new("alibi")),
        ));

        // Restarting the locked topic opens already locked out
        session.start(start_params(), Some(base_profile()));
        assert!(session.locked_out);
    }

    #[test]
    fn progress_only_ticks_inside_the_spot() {
        let mut session = TensionSession::default();
        session.start(start_params(), Some(base_profile()));
        let voices = HashMap::new();

        // Tension 0 is outside 40..70
        let result = session.tick_progress(&voices);
        assert!(!result.ticked);
        assert_eq!(session.progress, 0);

        session.apply_delta(50);
        let result = session.tick_progress(&voices);
        assert!(result.ticked);
        assert!(!result.completed);
        assert_eq!(session.progress, 1);
    }

    #[test]
    fn completing_grants_one_influence_point() {
        let mut session = TensionSession::default();
        let profile = InterrogationProfile {
            progress_required: 2,
            ..base_profile()
        };
        session.start(start_params(), Some(profile));
        session.apply_delta(50);
        let voices = HashMap::new();

        assert!(!session.tick_progress(&voices).completed);
        let result = session.tick_progress(&voices);
        assert!(result.completed);
        assert_eq!(session.influence_points, 1);

        // Completed sessions stop ticking
        let result = session.tick_progress(&voices);
        assert!(!result.ticked);
        assert_eq!(session.influence_points, 1);
    }

    #[test]
    fn influence_points_survive_end_and_spend_down_to_zero() {
        let mut session = TensionSession::default();
        session.add_influence_points(2);
        session.end();

        assert_eq!(session.influence_points, 2);
        assert!(session.spend_influence_point());
        assert!(session.spend_influence_point());
        assert!(!session.spend_influence_point());
    }
}
