use serde::{Deserialize, Serialize};

// =============================================================================
// Time Phase
// =============================================================================

/// Ticks per phase of the day. Three ticks of any activity roll the world
/// into the next phase.
pub const TICKS_PER_PHASE: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimePhase {
    #[default]
    Morning,
    Day,
    Evening,
    Night,
}

impl TimePhase {
    pub fn display_name(&self) -> &'static str {
        match self {
            TimePhase::Morning => "Morning",
            TimePhase::Day => "Day",
            TimePhase::Evening => "Evening",
            TimePhase::Night => "Night",
        }
    }

    /// Returns all phases in day order.
    pub fn all() -> [TimePhase; 4] {
        [
            TimePhase::Morning,
            TimePhase::Day,
            TimePhase::Evening,
            TimePhase::Night,
        ]
    }

    /// Phase the world is in at an absolute tick.
    pub fn at_tick(tick: u64) -> TimePhase {
        let index = (tick / TICKS_PER_PHASE) % 4;
        Self::all()[index as usize]
    }
}

impl std::fmt::Display for TimePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// =============================================================================
// World Clock
// =============================================================================

/// The world clock: an absolute tick counter plus its derived phase. The
/// phase is stored rather than recomputed on read so persisted snapshots
/// stay self-describing, but [`WorldClock::advanced`] always re-derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldClock {
    pub tick: u64,
    pub phase: TimePhase,
}

impl WorldClock {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            phase: TimePhase::at_tick(tick),
        }
    }

    /// Clock after `delta` ticks pass. The clock never runs backwards.
    pub fn advanced(&self, delta: u64) -> WorldClock {
        WorldClock::new(self.tick + delta)
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new(0)
    }
}

// =============================================================================
// Tick Costs
// =============================================================================

/// Player activities that consume world time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickAction {
    Interrogate,
    Search,
    Travel,
    SceneMajor,
    Wait,
}

impl TickAction {
    /// Ticks the action costs. Travel takes an explicit tick count from
    /// its payload; negative payloads clamp to zero upstream, so this
    /// only sees the already-sanitized value.
    pub fn tick_cost(&self, payload_ticks: Option<u64>) -> u64 {
        match self {
            TickAction::Interrogate => 1,
            TickAction::Search => 1,
            TickAction::Travel => payload_ticks.unwrap_or(1),
            TickAction::SceneMajor => 2,
            TickAction::Wait => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TickAction::Interrogate => "interrogate",
            TickAction::Search => "search",
            TickAction::Travel => "travel",
            TickAction::SceneMajor => "scene_major",
            TickAction::Wait => "wait",
        }
    }
}

impl std::fmt::Display for TickAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
