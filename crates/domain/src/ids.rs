use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// Authored content keys are human-readable strings (`loc_hbf`, `case_01_bank`),
// not generated uuids, so they get their own newtype shape.
macro_rules! define_key {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

// Generated IDs
define_id!(TravelSessionId);
define_id!(DomainEventId);

// World geography keys
define_key!(LocationId);
define_key!(DistrictId);
define_key!(RouteId);

// Map interaction keys
define_key!(PointId);
define_key!(PointGroupId);

// Quest and case keys
define_key!(QuestId);
define_key!(StageId);
define_key!(ObjectiveId);
define_key!(CaseId);

// Economy keys
define_key!(ItemId);
define_key!(MerchantId);

// Progression keys
define_key!(FactionId);
define_key!(CharacterId);
define_key!(VoiceId);

// Evidence and dossier keys
define_key!(EvidenceId);
define_key!(EntryId);

// Interrogation keys
define_key!(ScenarioId);
define_key!(TopicId);

// Session scoping
define_key!(UserId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TravelSessionId::new();
        let b = TravelSessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let id = LocationId::new("loc_hbf");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"loc_hbf\"");

        let back: LocationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn key_borrows_as_str_for_map_lookup() {
        use std::collections::HashMap;

        let mut map: HashMap<PointId, u32> = HashMap::new();
        map.insert(PointId::new("point_vault"), 1);
        assert_eq!(map.get("point_vault"), Some(&1));
    }
}
