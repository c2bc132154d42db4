//! Content pack loading.
//!
//! Reads the authored JSON pack from a content directory into a
//! [`GameContent`] bundle. Missing files fall back to built-in defaults
//! where the domain ships one; malformed JSON fails the whole load, while
//! semantically broken entries are logged and dropped so a single stale
//! record cannot poison the rest of the pack.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use gumshoe_domain::{
    merge_quest, parse_bindings, standard_item_registry, standard_merchants, Action, CaseId,
    CaseObjective, CharacterId, CityMap, Condition, EvidenceDefinition, EvidenceId,
    InterrogationProfile, ItemDefinition, ItemRegistry, ItemStack, Locale,
    MerchantDefinition, MerchantId, PointBinding, PointGroupId, PointId, PointState, Quest,
    QuestCondition, QuestContent, QuestId, QuestLogic, Route, RouteId, StageId,
};

pub const CITY_FILE: &str = "city.json";
pub const ROUTES_FILE: &str = "routes.json";
pub const POINTS_FILE: &str = "map_points.json";
pub const QUESTS_FILE: &str = "quests.json";
pub const QUEST_CONTENT_FILE: &str = "quest_content.json";
pub const CASES_FILE: &str = "cases.json";
pub const EVIDENCE_FILE: &str = "evidence.json";
pub const ITEMS_FILE: &str = "items.json";
pub const MERCHANTS_FILE: &str = "merchants.json";
pub const PROFILES_FILE: &str = "profiles.json";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read content file {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse content file {file}: {message}")]
    Parse { file: String, message: String },
}

/// Per-locale quest text, keyed by locale then quest id.
pub type LocaleQuestContent = BTreeMap<Locale, HashMap<QuestId, QuestContent>>;

/// An investigation case: metadata plus its authored objective ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDefinition {
    pub id: CaseId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub objectives: Vec<CaseObjective>,
    /// Quest that drives this case; auto-started when the case opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_quest_id: Option<QuestId>,
}

/// An authored map point with its interaction bindings resolved.
#[derive(Debug, Clone)]
pub struct MapPoint {
    pub id: PointId,
    pub title: String,
    pub description: Option<String>,
    pub case_id: Option<CaseId>,
    pub unlock_group: Option<PointGroupId>,
    pub hidden_initially: bool,
    pub bindings: Vec<PointBinding>,
}

impl MapPoint {
    /// State a fresh session starts this point in. Hidden points must be
    /// unlocked through actions or a QR scan before they appear.
    pub fn initial_state(&self) -> PointState {
        if self.hidden_initially {
            PointState::Locked
        } else {
            PointState::Discovered
        }
    }
}

/// On-disk point row. Bindings arrive either as structured JSON or as a
/// legacy embedded JSON string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapPointRecord {
    id: PointId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    case_id: Option<CaseId>,
    #[serde(default)]
    unlock_group: Option<PointGroupId>,
    #[serde(default)]
    is_hidden_initially: bool,
    #[serde(default)]
    bindings: BindingsField,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BindingsField {
    List(Vec<PointBinding>),
    Raw(String),
}

impl Default for BindingsField {
    fn default() -> Self {
        BindingsField::List(Vec::new())
    }
}

/// Everything the engine needs from the authored content pack.
#[derive(Debug, Clone)]
pub struct GameContent {
    pub city: CityMap,
    pub routes: Vec<Route>,
    pub points: Vec<MapPoint>,
    pub quests: Vec<Quest>,
    pub cases: Vec<CaseDefinition>,
    pub evidence: HashMap<EvidenceId, EvidenceDefinition>,
    pub items: ItemRegistry,
    pub merchants: Vec<MerchantDefinition>,
    pub profiles: HashMap<CharacterId, InterrogationProfile>,
}

impl GameContent {
    /// Built-in fallback pack: the stock city, item registry, and merchant
    /// roster with no authored quests, cases, or points.
    pub fn builtin() -> Self {
        Self {
            city: CityMap::freiburg_1905(),
            routes: Vec::new(),
            points: Vec::new(),
            quests: Vec::new(),
            cases: Vec::new(),
            evidence: HashMap::new(),
            items: standard_item_registry(),
            merchants: standard_merchants(),
            profiles: HashMap::new(),
        }
    }

    pub fn quest(&self, id: &QuestId) -> Option<&Quest> {
        self.quests.iter().find(|q| &q.logic.id == id)
    }

    pub fn case(&self, id: &CaseId) -> Option<&CaseDefinition> {
        self.cases.iter().find(|c| &c.id == id)
    }

    pub fn point(&self, id: &PointId) -> Option<&MapPoint> {
        self.points.iter().find(|p| &p.id == id)
    }

    pub fn merchant(&self, id: &MerchantId) -> Option<&MerchantDefinition> {
        self.merchants.iter().find(|m| &m.id == id)
    }

    pub fn profile(&self, character_id: &CharacterId) -> Option<&InterrogationProfile> {
        self.profiles.get(character_id)
    }

    /// Points that belong to an unlock group, in pack order.
    pub fn points_in_group<'a>(
        &'a self,
        group_id: &'a PointGroupId,
    ) -> impl Iterator<Item = &'a MapPoint> {
        self.points
            .iter()
            .filter(move |p| p.unlock_group.as_ref() == Some(group_id))
    }
}

impl Default for GameContent {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Loads a content pack from a directory of JSON files.
pub struct ContentService {
    root: PathBuf,
}

impl ContentService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads and validates the full pack. I/O and JSON syntax problems fail
    /// the load; semantic problems degrade per record with a warning.
    pub fn load(&self) -> Result<GameContent, ContentError> {
        let city = match self.read_optional::<CityMap>(CITY_FILE)? {
            Some(city) => city,
            None => {
                info!("No city file in content pack, using the built-in map");
                CityMap::freiburg_1905()
            }
        };
        let routes = self.read_or_default::<Vec<Route>>(ROUTES_FILE)?;
        let point_records = self.read_or_default::<Vec<MapPointRecord>>(POINTS_FILE)?;
        let quest_logic = self.read_or_default::<Vec<QuestLogic>>(QUESTS_FILE)?;
        let quest_text = self.read_or_default::<LocaleQuestContent>(QUEST_CONTENT_FILE)?;
        let cases = self.read_or_default::<Vec<CaseDefinition>>(CASES_FILE)?;
        let evidence_rows = self.read_or_default::<Vec<EvidenceDefinition>>(EVIDENCE_FILE)?;
        let items = match self.read_optional::<Vec<ItemDefinition>>(ITEMS_FILE)? {
            Some(definitions) => ItemRegistry::from_definitions(definitions),
            None => {
                info!("No item file in content pack, using the standard registry");
                standard_item_registry()
            }
        };
        let merchants = match self.read_optional::<Vec<MerchantDefinition>>(MERCHANTS_FILE)? {
            Some(merchants) => merchants,
            None => {
                info!("No merchant file in content pack, using the standard roster");
                standard_merchants()
            }
        };
        let profiles =
            self.read_or_default::<HashMap<CharacterId, InterrogationProfile>>(PROFILES_FILE)?;

        Ok(GameContent {
            city,
            routes: validated_routes(routes),
            points: resolve_points(point_records),
            quests: build_quests(quest_logic, &quest_text),
            cases: validated_cases(cases),
            evidence: evidence_catalog(evidence_rows),
            merchants: validated_merchants(merchants, &items),
            items,
            profiles,
        })
    }

    fn read_optional<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, ContentError> {
        let path = self.root.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| ContentError::Io {
            file: file.to_string(),
            source,
        })?;
        let parsed = serde_json::from_str(&raw).map_err(|err| ContentError::Parse {
            file: file.to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(parsed))
    }

    fn read_or_default<T: DeserializeOwned + Default>(
        &self,
        file: &str,
    ) -> Result<T, ContentError> {
        Ok(self.read_optional(file)?.unwrap_or_default())
    }
}

fn validated_routes(routes: Vec<Route>) -> Vec<Route> {
    let mut seen: HashSet<RouteId> = HashSet::new();
    let mut kept = Vec::with_capacity(routes.len());
    for route in routes {
        if !seen.insert(route.id.clone()) {
            warn!(route_id = %route.id, "duplicate route id in content pack, keeping the first");
            continue;
        }
        kept.push(route);
    }
    kept
}

fn resolve_points(records: Vec<MapPointRecord>) -> Vec<MapPoint> {
    let mut seen: HashSet<PointId> = HashSet::new();
    let mut points = Vec::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.clone()) {
            warn!(point_id = %record.id, "duplicate point id in content pack, keeping the first");
            continue;
        }
        let bindings = match record.bindings {
            BindingsField::List(bindings) => bindings,
            BindingsField::Raw(raw) => parse_bindings(&record.id, &raw),
        };
        let bindings = bindings
            .into_iter()
            .filter(|binding| binding_is_sound(&record.id, binding))
            .collect();
        points.push(MapPoint {
            id: record.id,
            title: record.title,
            description: record.description,
            case_id: record.case_id,
            unlock_group: record.unlock_group,
            hidden_initially: record.is_hidden_initially,
            bindings,
        });
    }
    points
}

/// Bindings carrying vocabulary this build does not know are authored
/// against a newer engine; they are dropped here rather than left to
/// misfire mid-session.
fn binding_is_sound(point_id: &PointId, binding: &PointBinding) -> bool {
    let unknown_condition = binding
        .conditions
        .as_ref()
        .is_some_and(|conditions| conditions.iter().any(Condition::contains_unknown));
    if unknown_condition {
        warn!(
            point_id = %point_id,
            binding_id = %binding.id,
            "binding uses an unrecognized condition, dropping it"
        );
        return false;
    }
    if binding.actions.iter().any(Action::is_unknown) {
        warn!(
            point_id = %point_id,
            binding_id = %binding.id,
            "binding uses an unrecognized action, dropping it"
        );
        return false;
    }
    true
}

fn build_quests(logic: Vec<QuestLogic>, text: &LocaleQuestContent) -> Vec<Quest> {
    let mut seen: HashSet<QuestId> = HashSet::new();
    let mut quests = Vec::with_capacity(logic.len());
    for quest in logic {
        if !seen.insert(quest.id.clone()) {
            warn!(quest_id = %quest.id, "duplicate quest id in content pack, keeping the first");
            continue;
        }
        if quest_has_unknown_conditions(&quest) {
            warn!(quest_id = %quest.id, "quest uses unrecognized condition tags, dropping it");
            continue;
        }
        warn_undeclared_stages(&quest);
        let content = quest_text_for(&quest.id, text);
        quests.push(merge_quest(quest, &content));
    }
    quests
}

fn quest_has_unknown_conditions(quest: &QuestLogic) -> bool {
    quest
        .objectives
        .iter()
        .any(|objective| objective.condition.contains_unknown())
        || quest
            .completion_condition
            .as_ref()
            .is_some_and(QuestCondition::contains_unknown)
}

/// Stage references outside the declared sequence never match stage
/// conditions; flag them at load so authors see the typo.
fn warn_undeclared_stages(quest: &QuestLogic) {
    let declared: HashSet<&StageId> = quest.stages.iter().collect();
    if !declared.contains(&quest.initial_stage) {
        warn!(
            quest_id = %quest.id,
            stage = %quest.initial_stage,
            "initial stage is not in the declared stage sequence"
        );
    }
    for transition in &quest.stage_transitions {
        for stage in [&transition.from, &transition.to] {
            if !declared.contains(stage) {
                warn!(
                    quest_id = %quest.id,
                    stage = %stage,
                    "stage transition references an undeclared stage"
                );
            }
        }
    }
    for objective in &quest.objectives {
        if let Some(stage) = &objective.stage {
            if !declared.contains(stage) {
                warn!(
                    quest_id = %quest.id,
                    objective_id = %objective.id,
                    stage = %stage,
                    "objective is scoped to an undeclared stage"
                );
            }
        }
    }
}

fn quest_text_for(id: &QuestId, text: &LocaleQuestContent) -> BTreeMap<Locale, QuestContent> {
    text.iter()
        .filter_map(|(locale, quests)| quests.get(id).map(|content| (*locale, content.clone())))
        .collect()
}

fn validated_cases(cases: Vec<CaseDefinition>) -> Vec<CaseDefinition> {
    let mut seen: HashSet<CaseId> = HashSet::new();
    let mut kept = Vec::with_capacity(cases.len());
    for mut case in cases {
        if !seen.insert(case.id.clone()) {
            warn!(case_id = %case.id, "duplicate case id in content pack, keeping the first");
            continue;
        }
        let case_id = case.id.clone();
        case.objectives.retain(|objective| {
            if objective.case_id != case_id {
                warn!(
                    case_id = %case_id,
                    objective_id = %objective.id,
                    "objective row belongs to a different case, dropping it"
                );
                return false;
            }
            true
        });
        case.objectives.sort_by_key(|objective| objective.sort_order);
        kept.push(case);
    }
    kept
}

fn evidence_catalog(rows: Vec<EvidenceDefinition>) -> HashMap<EvidenceId, EvidenceDefinition> {
    let mut catalog: HashMap<EvidenceId, EvidenceDefinition> = HashMap::with_capacity(rows.len());
    for row in rows {
        if catalog.contains_key(&row.id) {
            warn!(evidence_id = %row.id, "duplicate evidence id in content pack, keeping the first");
            continue;
        }
        catalog.insert(row.id.clone(), row);
    }
    for row in catalog.values() {
        if let Some(contradicts) = &row.contradicts_id {
            if !catalog.contains_key(contradicts) {
                warn!(
                    evidence_id = %row.id,
                    contradicts = %contradicts,
                    "evidence contradicts an id the pack does not define"
                );
            }
        }
    }
    catalog
}

fn validated_merchants(
    merchants: Vec<MerchantDefinition>,
    items: &ItemRegistry,
) -> Vec<MerchantDefinition> {
    let mut seen: HashSet<MerchantId> = HashSet::new();
    let mut kept = Vec::with_capacity(merchants.len());
    for mut merchant in merchants {
        if !seen.insert(merchant.id.clone()) {
            warn!(
                merchant_id = %merchant.id,
                "duplicate merchant id in content pack, keeping the first"
            );
            continue;
        }
        let merchant_id = merchant.id.clone();
        retain_known_stock(&merchant_id, &mut merchant.stock, items);
        for rule in &mut merchant.stage_stock_rules {
            retain_known_stock(&merchant_id, &mut rule.stock, items);
        }
        kept.push(merchant);
    }
    kept
}

fn retain_known_stock(merchant_id: &MerchantId, stock: &mut Vec<ItemStack>, items: &ItemRegistry) {
    stock.retain(|stack| {
        if items.contains(&stack.item_id) {
            true
        } else {
            warn!(
                merchant_id = %merchant_id,
                item_id = %stack.item_id,
                "merchant stocks an item the registry does not define, dropping the stack"
            );
            false
        }
    });
}
