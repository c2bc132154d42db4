//! Player progression: xp, levels, trait points, voices, factions,
//! relations
//!
//! One xp curve drives both the player level and per-voice levels. Trait
//! points are granted on level-ups and never revoked.

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, FactionId, VoiceId};

/// Level for a total xp amount: one level per full hundred, floor 1.
pub fn level_from_xp(xp: u64) -> u32 {
    ((xp / 100) + 1).max(1) as u32
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgression {
    pub xp: u64,
    pub level: u32,
    pub trait_points: u32,
}

impl Default for PlayerProgression {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            trait_points: 0,
        }
    }
}

impl PlayerProgression {
    /// Add xp, recompute the level, and bank one trait point per level
    /// gained. Negative gains are clamped upstream.
    pub fn gain_xp(&mut self, xp_gain: u64) {
        self.xp += xp_gain;
        let new_level = level_from_xp(self.xp);
        self.trait_points += new_level.saturating_sub(self.level);
        self.level = new_level;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProgression {
    pub voice_id: VoiceId,
    pub xp: u64,
    pub level: u32,
}

impl VoiceProgression {
    pub fn new(voice_id: VoiceId) -> Self {
        Self {
            voice_id,
            xp: 0,
            level: 1,
        }
    }

    pub fn gain_xp(&mut self, xp_gain: u64) {
        self.xp += xp_gain;
        self.level = level_from_xp(self.xp);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionReputation {
    pub faction_id: FactionId,
    pub reputation: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRelation {
    pub character_id: CharacterId,
    pub trust: i64,
    pub last_interaction_tick: Option<u64>,
}

// =============================================================================
// Apply input
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceXpGain {
    pub voice_id: VoiceId,
    pub xp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionDelta {
    pub faction_id: FactionId,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDelta {
    pub character_id: CharacterId,
    pub delta: i64,
}

/// One progression batch. Xp gains clamp at zero; faction and relation
/// deltas may be negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_xp: Vec<VoiceXpGain>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faction_delta: Vec<FactionDelta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relation_delta: Vec<RelationDelta>,
}

impl ProgressionInput {
    pub fn xp_only(xp: i64) -> Self {
        Self {
            xp: Some(xp),
            ..Self::default()
        }
    }

    /// Player xp gain with negatives clamped away.
    pub fn clamped_xp_gain(&self) -> u64 {
        self.xp.map(|xp| xp.max(0) as u64).unwrap_or(0)
    }
}

/// The 18 voices of the detective's inner parliament, in display order.
pub fn voice_order() -> Vec<VoiceId> {
    [
        "logic",
        "perception",
        "encyclopedia",
        "intuition",
        "empathy",
        "imagination",
        "authority",
        "charisma",
        "composure",
        "endurance",
        "agility",
        "forensics",
        "stealth",
        "deception",
        "intrusion",
        "occultism",
        "tradition",
        "poetics",
    ]
    .into_iter()
    .map(VoiceId::new)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_curve_boundaries() {
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(99), 1);
        assert_eq!(level_from_xp(100), 2);
        assert_eq!(level_from_xp(199), 2);
        assert_eq!(level_from_xp(250), 3);
    }

    #[test]
    fn gaining_xp_banks_trait_points_per_level() {
        let mut player = PlayerProgression::default();

        player.gain_xp(50);
        assert_eq!(player.level, 1);
        assert_eq!(player.trait_points, 0);

        player.gain_xp(160); // total 210, level 3
        assert_eq!(player.level, 3);
        assert_eq!(player.trait_points, 2);

        player.gain_xp(10); // no level change, no new points
        assert_eq!(player.trait_points, 2);
    }

    #[test]
    fn voice_levels_use_the_same_curve() {
        let mut voice = VoiceProgression::new(VoiceId::new("logic"));
        voice.gain_xp(120);
        assert_eq!(voice.level, 2);
    }

    #[test]
    fn negative_player_xp_clamps_to_zero() {
        let input = ProgressionInput::xp_only(-25);
        assert_eq!(input.clamped_xp_gain(), 0);

        let none = ProgressionInput::default();
        assert_eq!(none.clamped_xp_gain(), 0);
    }

    #[test]
    fn voice_order_lists_all_eighteen() {
        let order = voice_order();
        assert_eq!(order.len(), 18);
        assert_eq!(order[0], VoiceId::new("logic"));
        assert_eq!(order[17], VoiceId::new("poetics"));
    }
}
