//! Travel sessions, routes, and travel beats
//!
//! Travel is two-step at the service boundary: a session starts with an
//! ETA, then completes by advancing the clock. The beat (a narrative
//! vignette for the ride) is computed once at start and stored on the
//! session so completion replays it deterministically.

use serde::{Deserialize, Serialize};

use crate::ids::{CaseId, LocationId, RouteId, TravelSessionId, UserId};
use crate::location::CityMap;

// =============================================================================
// Routes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Walk,
    Tram,
    Carriage,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Walk => "walk",
            TravelMode::Tram => "tram",
            TravelMode::Carriage => "carriage",
        }
    }

    /// ETA when no authored route connects the endpoints. The tram is the
    /// fast default.
    pub fn default_eta_ticks(&self) -> u64 {
        match self {
            TravelMode::Tram => 1,
            TravelMode::Walk | TravelMode::Carriage => 2,
        }
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authored connection between two locations for one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: RouteId,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub mode: TravelMode,
    pub eta_ticks: u64,
    pub risk_level: u32,
    pub active: bool,
}

impl Route {
    pub fn matches(&self, from: &LocationId, to: &LocationId, mode: TravelMode) -> bool {
        self.active && self.from_location_id == *from && self.to_location_id == *to && self.mode == mode
    }
}

// =============================================================================
// Travel beats
// =============================================================================

/// Narrative vignette attached to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TravelBeat {
    /// Overheard recording with a concrete lead.
    #[serde(rename_all = "camelCase")]
    IntelAudio { tape_id: String, hint: String },
    /// Street talk, mood only.
    #[serde(rename_all = "camelCase")]
    StreetRumor { rumor_id: String },
    /// A faction approaches the traveller. Never produced by the base
    /// rule; authored routes can carry it.
    #[serde(rename_all = "camelCase")]
    FactionContact { faction_id: String },
    None,
}

impl TravelBeat {
    pub fn kind_str(&self) -> &'static str {
        match self {
            TravelBeat::IntelAudio { .. } => "intel_audio",
            TravelBeat::StreetRumor { .. } => "street_rumor",
            TravelBeat::FactionContact { .. } => "faction_contact",
            TravelBeat::None => "none",
        }
    }
}

/// Pick the beat for a trip. First match wins: the bank tape during the
/// bank case, then a rumor on risky routes, otherwise nothing.
pub fn travel_beat_for(
    city: &CityMap,
    risk_level: u32,
    to_location_id: &LocationId,
    case_id: Option<&CaseId>,
) -> TravelBeat {
    let bank_case = case_id.map(|c| c.as_str() == "case_01_bank").unwrap_or(false);
    if bank_case && city.is_bank(to_location_id) {
        return TravelBeat::IntelAudio {
            tape_id: "audio_case01_clara_interrogation".to_string(),
            hint: "Private bank cell key is mentioned.".to_string(),
        };
    }

    if risk_level >= 3 {
        return TravelBeat::StreetRumor {
            rumor_id: "rumor_black_carriage_bank".to_string(),
        };
    }

    TravelBeat::None
}

// =============================================================================
// Travel sessions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelStatus {
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelSession {
    pub id: TravelSessionId,
    pub user_id: UserId,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<RouteId>,
    pub mode: TravelMode,
    pub status: TravelStatus,
    pub started_tick: u64,
    pub eta_ticks: u64,
    pub arrival_tick: Option<u64>,
    pub beat: TravelBeat,
}

impl TravelSession {
    /// Open a fresh in-progress session. The ETA is already floored to at
    /// least one tick by the caller.
    pub fn start(
        user_id: UserId,
        from: LocationId,
        to: LocationId,
        route_id: Option<RouteId>,
        mode: TravelMode,
        started_tick: u64,
        eta_ticks: u64,
        beat: TravelBeat,
    ) -> Self {
        Self {
            id: TravelSessionId::new(),
            user_id,
            from_location_id: from,
            to_location_id: to,
            route_id,
            mode,
            status: TravelStatus::InProgress,
            started_tick,
            eta_ticks,
            arrival_tick: None,
            beat,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == TravelStatus::InProgress
    }

    /// Ticks the completion step charges. Every trip costs at least one.
    pub fn completion_ticks(&self) -> u64 {
        self.eta_ticks.max(1)
    }
}
