//! City geography: districts, curfews, and location availability
//!
//! Availability is a pure function of location and time phase. Rule order
//! matters: the bank's night closure wins over the district curfew, and
//! anything unmatched is open.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::case::Approach;
use crate::game_clock::TimePhase;
use crate::ids::{CaseId, DistrictId, LocationId};

/// Where a session starts when no travel has completed yet.
pub const DEFAULT_LOCATION_ID: &str = "loc_hbf";

/// Whether a location can be entered right now, and if not, what the
/// player can do about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAvailability {
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,
}

impl LocationAvailability {
    pub fn open() -> Self {
        Self {
            open: true,
            reason: None,
            alternatives: None,
        }
    }

    pub fn closed(reason: impl Into<String>, alternatives: Vec<String>) -> Self {
        Self {
            open: false,
            reason: Some(reason.into()),
            alternatives: Some(alternatives),
        }
    }
}

/// A curfew over a whole district.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictAccessRule {
    pub district: DistrictId,
    pub blocked_phases: Vec<TimePhase>,
    pub reason: String,
    pub alternatives: Vec<String>,
}

/// The authored city registry: which district each location belongs to,
/// which locations are banks, district curfews, and per-case starting
/// locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityMap {
    pub districts: HashMap<LocationId, DistrictId>,
    pub bank_locations: Vec<LocationId>,
    pub access_rules: Vec<DistrictAccessRule>,
    pub default_location: LocationId,
    #[serde(default)]
    pub case_default_locations: HashMap<CaseId, LocationId>,
}

impl CityMap {
    pub fn is_bank(&self, location_id: &LocationId) -> bool {
        self.bank_locations.contains(location_id)
    }

    pub fn district_of(&self, location_id: &LocationId) -> Option<&DistrictId> {
        self.districts.get(location_id)
    }

    /// Starting location for a case, or the city default.
    pub fn default_location_for_case(&self, case_id: Option<&CaseId>) -> LocationId {
        case_id
            .and_then(|id| self.case_default_locations.get(id))
            .unwrap_or(&self.default_location)
            .clone()
    }

    /// Availability of a location at a phase. Bank closure is checked
    /// before the district curfew.
    pub fn availability(&self, location_id: &LocationId, phase: TimePhase) -> LocationAvailability {
        if self.is_bank(location_id) && phase == TimePhase::Night {
            return LocationAvailability::closed(
                "Bank is closed at night",
                Approach::night_access_tokens(),
            );
        }

        if let Some(district) = self.district_of(location_id) {
            let blocked = self
                .access_rules
                .iter()
                .find(|rule| rule.district == *district && rule.blocked_phases.contains(&phase));
            if let Some(rule) = blocked {
                return LocationAvailability::closed(rule.reason.clone(), rule.alternatives.clone());
            }
        }

        LocationAvailability::open()
    }
}

impl Default for CityMap {
    fn default() -> Self {
        Self::freiburg_1905()
    }
}

impl CityMap {
    /// The shipped 1905 Freiburg registry.
    pub fn freiburg_1905() -> Self {
        let districts = [
            ("loc_hbf", "rail_hub"),
            ("loc_freiburg_bank", "altstadt"),
            ("loc_freiburg_archive", "altstadt"),
            ("loc_munster", "altstadt"),
            ("loc_tailor", "altstadt"),
            ("loc_apothecary", "altstadt"),
            ("loc_pub", "schneckenvorstadt"),
            ("loc_pub_deutsche", "schneckenvorstadt"),
            ("loc_red_light", "schneckenvorstadt"),
            ("loc_martinstor", "schneckenvorstadt"),
            ("loc_schwabentor", "wiehre"),
            ("loc_uni_chem", "wiehre"),
            ("loc_uni_med", "wiehre"),
            ("loc_student_house", "wiehre"),
            ("loc_freiburg_warehouse", "stuhlinger"),
            ("loc_workers_pub", "stuhlinger"),
            ("loc_street_event", "altstadt"),
            ("loc_telephone", "altstadt"),
        ]
        .into_iter()
        .map(|(loc, district)| (LocationId::new(loc), DistrictId::new(district)))
        .collect();

        let case_default_locations = [
            ("case_01_bank", "loc_hbf"),
            ("sandbox_karlsruhe", "loc_ka_agency"),
        ]
        .into_iter()
        .map(|(case, loc)| (CaseId::new(case), LocationId::new(loc)))
        .collect();

        Self {
            districts,
            bank_locations: vec![LocationId::new("loc_freiburg_bank")],
            access_rules: vec![DistrictAccessRule {
                district: DistrictId::new("stuhlinger"),
                blocked_phases: vec![TimePhase::Night],
                reason:
                    "Stuhlinger industrial district is restricted at night without district pass"
                        .to_string(),
                alternatives: vec!["district_pass".to_string(), "wait_until_day".to_string()],
            }],
            default_location: LocationId::new(DEFAULT_LOCATION_ID),
            case_default_locations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_is_closed_at_night_with_approach_alternatives() {
        let city = CityMap::freiburg_1905();
        let availability =
            city.availability(&LocationId::new("loc_freiburg_bank"), TimePhase::Night);

        assert!(!availability.open);
        assert_eq!(availability.reason.as_deref(), Some("Bank is closed at night"));
        assert_eq!(
            availability.alternatives,
            Some(vec![
                "lockpick".to_string(),
                "bribe".to_string(),
                "warrant".to_string()
            ])
        );
    }

    #[test]
    fn bank_is_open_during_the_day() {
        let city = CityMap::freiburg_1905();
        let availability = city.availability(&LocationId::new("loc_freiburg_bank"), TimePhase::Day);
        assert!(availability.open);
    }

    #[test]
    fn stuhlinger_curfew_blocks_the_whole_district_at_night() {
        let city = CityMap::freiburg_1905();

        for loc in ["loc_freiburg_warehouse", "loc_workers_pub"] {
            let availability = city.availability(&LocationId::new(loc), TimePhase::Night);
            assert!(!availability.open, "{loc} should be blocked at night");
            assert_eq!(
                availability.alternatives,
                Some(vec![
                    "district_pass".to_string(),
                    "wait_until_day".to_string()
                ])
            );
        }

        let daytime = city.availability(&LocationId::new("loc_workers_pub"), TimePhase::Day);
        assert!(daytime.open);
    }

    #[test]
    fn unknown_locations_are_open() {
        let city = CityMap::freiburg_1905();
        let availability = city.availability(&LocationId::new("loc_nowhere"), TimePhase::Night);
        assert!(availability.open);
    }

    #[test]
    fn default_location_respects_case_overrides() {
        let city = CityMap::freiburg_1905();

        assert_eq!(
            city.default_location_for_case(None).as_str(),
            DEFAULT_LOCATION_ID
        );
        assert_eq!(
            city.default_location_for_case(Some(&CaseId::new("sandbox_karlsruhe")))
                .as_str(),
            "loc_ka_agency"
        );
        assert_eq!(
            city.default_location_for_case(Some(&CaseId::new("case_99_unknown")))
                .as_str(),
            DEFAULT_LOCATION_ID
        );
    }
}
