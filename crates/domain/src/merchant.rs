use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::condition::QuestStageView;
use crate::ids::{CharacterId, FactionId, ItemId, LocationId, MerchantId, QuestId, StageId, VoiceId};

// ============================================================================
// Items
// ============================================================================

/// Broad gameplay category of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Clue,
    Consumable,
    KeyItem,
    Resource,
    Weapon,
}

/// Effect applied when an item is used. Unknown effect tags survive parsing
/// and are skipped with a warning at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    #[serde(rename_all = "camelCase")]
    GrantXp { amount: u64 },
    #[serde(rename_all = "camelCase")]
    AddFlag {
        flag_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    AddVoiceLevel { voice_id: VoiceId, amount: u32 },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub icon: String,
    /// Base value in pfennig; merchant multipliers apply on top.
    pub value: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stackable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stack: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<ItemEffect>,
}

/// A quantity of one item, in merchant stock or a player inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStack {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Persisted inventory row before sanitization; quantities arrive as raw
/// JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItemStack {
    pub item_id: ItemId,
    pub quantity: f64,
}

/// All known item definitions, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRegistry {
    items: HashMap<ItemId, ItemDefinition>,
}

impl ItemRegistry {
    pub fn from_definitions(definitions: Vec<ItemDefinition>) -> Self {
        Self {
            items: definitions.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        standard_item_registry()
    }
}

// ============================================================================
// Merchants
// ============================================================================

/// Gates on opening a merchant's trade screen. `required_flags_all` must all
/// hold; after that, any single `unlock_by_any_*` rule suffices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAccessRequirements {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_flags_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlock_by_any_flag: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unlock_by_any_faction_reputation: BTreeMap<FactionId, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_hint: Option<String>,
}

/// Price multipliers applied to item base values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantEconomy {
    pub buy_multiplier: f64,
    pub sell_multiplier: f64,
}

impl Default for MerchantEconomy {
    fn default() -> Self {
        Self {
            buy_multiplier: 1.0,
            sell_multiplier: 0.5,
        }
    }
}

/// How a stage stock rule compares against the quest's current stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockRuleMatch {
    AtStage,
    #[default]
    AtOrPastStage,
}

/// Whether a matched rule's stock replaces or extends the running stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockRuleMode {
    #[default]
    Append,
    Replace,
}

/// Extra or replacement stock unlocked by quest progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStockRule {
    pub quest_id: QuestId,
    pub stage: StageId,
    pub stock: Vec<ItemStack>,
    #[serde(rename = "match", default)]
    pub match_kind: StockRuleMatch,
    #[serde(default)]
    pub mode: StockRuleMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDefinition {
    pub id: MerchantId,
    pub name: String,
    pub character_id: CharacterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    pub stock: Vec<ItemStack>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stage_stock_rules: Vec<StageStockRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<MerchantAccessRequirements>,
    #[serde(default)]
    pub economy: MerchantEconomy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economy_loop_note: Option<String>,
}

/// Result of checking a merchant's access gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerchantAccess {
    Unlocked,
    Locked { reason: String },
}

impl MerchantAccess {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, MerchantAccess::Unlocked)
    }
}

const LOCKED_FLAGS_REASON: &str = "Missing required contact flags.";
const LOCKED_INTRO_REASON: &str = "Build reputation or obtain an introduction first.";

impl MerchantDefinition {
    /// Evaluates access gates against live flags and faction standings.
    pub fn access_for(
        &self,
        flags: &HashMap<String, bool>,
        faction_reputation: &HashMap<FactionId, i64>,
    ) -> MerchantAccess {
        let Some(access) = &self.access else {
            return MerchantAccess::Unlocked;
        };

        if !access.required_flags_all.is_empty()
            && !access
                .required_flags_all
                .iter()
                .all(|flag| flags.get(flag.as_str()).copied().unwrap_or(false))
        {
            return MerchantAccess::Locked {
                reason: access
                    .unlock_hint
                    .clone()
                    .unwrap_or_else(|| LOCKED_FLAGS_REASON.to_string()),
            };
        }

        let has_any_gate = !access.unlock_by_any_flag.is_empty()
            || !access.unlock_by_any_faction_reputation.is_empty();
        if !has_any_gate {
            return MerchantAccess::Unlocked;
        }

        let by_flag = access
            .unlock_by_any_flag
            .iter()
            .any(|flag| flags.get(flag.as_str()).copied().unwrap_or(false));
        let by_reputation = access
            .unlock_by_any_faction_reputation
            .iter()
            .any(|(faction_id, min_value)| {
                faction_reputation.get(faction_id).copied().unwrap_or(0) >= *min_value
            });

        if by_flag || by_reputation {
            MerchantAccess::Unlocked
        } else {
            MerchantAccess::Locked {
                reason: access
                    .unlock_hint
                    .clone()
                    .unwrap_or_else(|| LOCKED_INTRO_REASON.to_string()),
            }
        }
    }

    /// Resolves live stock: matched stage rules apply in authored order,
    /// replacing or merging into the base stock.
    pub fn stock_for(&self, quest_stages: &HashMap<QuestId, QuestStageView>) -> Vec<ItemStack> {
        let mut resolved = self.stock.clone();
        for rule in &self.stage_stock_rules {
            if !rule_matches(rule, quest_stages) {
                continue;
            }
            match rule.mode {
                StockRuleMode::Replace => resolved = rule.stock.clone(),
                StockRuleMode::Append => resolved = merge_stocks(&resolved, &rule.stock),
            }
        }
        resolved
    }

    /// Price the merchant charges the player for one unit.
    pub fn buy_price(&self, base_value: i64) -> i64 {
        ((base_value as f64) * self.economy.buy_multiplier).round().max(1.0) as i64
    }

    /// Price the merchant pays the player for one unit.
    pub fn sell_price(&self, base_value: i64) -> i64 {
        ((base_value as f64) * self.economy.sell_multiplier).floor().max(0.0) as i64
    }
}

fn rule_matches(rule: &StageStockRule, quest_stages: &HashMap<QuestId, QuestStageView>) -> bool {
    let Some(view) = quest_stages.get(&rule.quest_id) else {
        return false;
    };
    match rule.match_kind {
        StockRuleMatch::AtStage => view.is_at(&rule.stage),
        StockRuleMatch::AtOrPastStage => view.is_past(&rule.stage),
    }
}

/// Sums two stock lists by item id, keeping first-seen order and dropping
/// empty entries.
pub fn merge_stocks(base: &[ItemStack], patch: &[ItemStack]) -> Vec<ItemStack> {
    let mut merged: Vec<ItemStack> = Vec::with_capacity(base.len() + patch.len());
    for entry in base.iter().chain(patch) {
        match merged.iter_mut().find(|m| m.item_id == entry.item_id) {
            Some(existing) => existing.quantity += entry.quantity,
            None => merged.push(entry.clone()),
        }
    }
    merged.retain(|m| m.quantity > 0);
    merged
}

// ============================================================================
// Starter Inventory & Snapshot Normalization
// ============================================================================

/// Money a fresh detective starts with, in pfennig.
pub const STARTER_MONEY: i64 = 140;

/// Items a fresh detective starts with.
pub fn starter_item_stacks() -> Vec<ItemStack> {
    vec![
        ItemStack::new("key", 1),
        ItemStack::new("coin", 1),
        ItemStack::new("cig", 1),
        ItemStack::new("bread", 3),
    ]
}

/// Clamps a persisted money amount to a non-negative whole number; missing
/// or malformed values reset to the starter allowance.
pub fn normalize_money(raw: Option<f64>) -> i64 {
    match raw {
        Some(value) if value.is_finite() => value.max(0.0).floor() as i64,
        _ => STARTER_MONEY,
    }
}

/// Cleans persisted inventory rows: unknown item ids are dropped with a
/// warning, quantities are floored, non-positive rows vanish, and duplicate
/// rows sum into the first occurrence.
pub fn sanitize_item_stacks(registry: &ItemRegistry, raw: &[RawItemStack]) -> Vec<ItemStack> {
    let mut cleaned: Vec<ItemStack> = Vec::new();
    for row in raw {
        if !registry.contains(&row.item_id) {
            tracing::warn!(item_id = %row.item_id, "dropping inventory row for unknown item");
            continue;
        }
        if !row.quantity.is_finite() {
            continue;
        }
        let quantity = row.quantity.floor();
        if quantity <= 0.0 {
            continue;
        }
        let quantity = quantity as u32;
        match cleaned.iter_mut().find(|s| s.item_id == row.item_id) {
            Some(existing) => existing.quantity += quantity,
            None => cleaned.push(ItemStack::new(row.item_id.clone(), quantity)),
        }
    }
    cleaned
}

// ============================================================================
// Standard 1905 Registry
// ============================================================================

fn item(
    id: &str,
    name: &str,
    description: &str,
    kind: ItemKind,
    icon: &str,
    value: i64,
) -> ItemDefinition {
    ItemDefinition {
        id: ItemId::new(id),
        name: name.to_string(),
        description: description.to_string(),
        kind,
        icon: icon.to_string(),
        value,
        stackable: false,
        max_stack: None,
        effects: Vec::new(),
    }
}

fn grant_xp(amount: u64) -> ItemEffect {
    ItemEffect::GrantXp { amount }
}

fn add_flag(flag_id: &str) -> ItemEffect {
    ItemEffect::AddFlag {
        flag_id: flag_id.to_string(),
        value: Some(true),
    }
}

fn add_voice_level(voice_id: &str, amount: u32) -> ItemEffect {
    ItemEffect::AddVoiceLevel {
        voice_id: VoiceId::new(voice_id),
        amount,
    }
}

/// The built-in item catalogue. Content packs may replace it wholesale.
pub fn standard_item_registry() -> ItemRegistry {
    let mut definitions = vec![
        item("key", "Rusty Key", "Opens an old basement lock.", ItemKind::KeyItem, "KEY", 0),
        item("coin", "Strange Coin", "An old coin with unknown symbols.", ItemKind::Clue, "COIN", 50),
        item("cig", "Half-smoked Cigarette", "Found at the scene. Brand: \"Gitanes\".", ItemKind::Clue, "CIG", 0),
        item("bread", "Stale Bread", "Better than nothing.", ItemKind::Consumable, "BREAD", 2),
        item("lockpick", "Lockpick Set", "Essential for quiet entry.", ItemKind::Resource, "LOCKPICK", 80),
        item("map_fragment", "Torn Map Fragment", "Shows a hidden tunnel.", ItemKind::Clue, "MAP", 200),
        item("whiskey", "Cheap Whiskey", "Good for bribes or loose tongues.", ItemKind::Consumable, "WHISKEY", 30),
        item("bandage", "Sterile Bandage", "Stops bleeding and steadies your hand.", ItemKind::Consumable, "BANDAGE", 18),
        item("tonic", "Restorative Tonic", "Bitter medicine. Clears fatigue for a while.", ItemKind::Consumable, "TONIC", 42),
        item("focus_draught", "Focus Draught", "A sharp herbal mix that heightens sensory focus.", ItemKind::Consumable, "DRAUGHT", 55),
        item("starched_collar", "Starched Collar", "Crisp tailoring that adds visible social leverage.", ItemKind::Consumable, "COLLAR", 65),
        item("tailored_gloves", "Tailored Gloves", "Discreetly reinforced gloves for controlled handling.", ItemKind::Resource, "GLOVES", 90),
        item("hot_stew", "Hot Stew", "Simple pub food that gets you back on your feet.", ItemKind::Consumable, "STEW", 12),
        item("rumor_note", "Rumor Note", "A scrawled lead from a drunk witness.", ItemKind::Clue, "NOTE", 90),
        item("district_pass", "District Pass", "Stamped pass that smooths movement in controlled areas.", ItemKind::KeyItem, "PASS", 150),
        item("forged_pass", "Forged Transit Pass", "Expensive and risky. Better than waiting at checkpoints.", ItemKind::Resource, "FORGED", 170),
    ];

    for definition in &mut definitions {
        match definition.id.as_str() {
            "bread" => {
                definition.stackable = true;
                definition.max_stack = Some(99);
                definition.effects = vec![grant_xp(5)];
            }
            "whiskey" => {
                definition.effects = vec![add_flag("used_whiskey")];
            }
            "bandage" => {
                definition.stackable = true;
                definition.max_stack = Some(20);
                definition.effects = vec![add_flag("used_bandage"), grant_xp(3)];
            }
            "tonic" => {
                definition.effects = vec![add_voice_level("endurance", 1), add_flag("used_tonic")];
            }
            "focus_draught" => {
                definition.effects = vec![add_voice_level("senses", 1), grant_xp(6)];
            }
            "starched_collar" => {
                definition.effects =
                    vec![add_voice_level("charisma", 1), add_voice_level("authority", 1)];
            }
            "hot_stew" => {
                definition.effects = vec![add_flag("ate_hot_stew"), grant_xp(4)];
            }
            "district_pass" => {
                definition.effects = vec![add_flag("district_pass")];
            }
            _ => {}
        }
    }

    ItemRegistry::from_definitions(definitions)
}

/// The built-in merchant roster for the Freiburg case.
pub fn standard_merchants() -> Vec<MerchantDefinition> {
    vec![
        MerchantDefinition {
            id: MerchantId::new("the_fence"),
            name: "The Fence".to_string(),
            character_id: CharacterId::new("pawnbroker"),
            location_id: Some(LocationId::new("loc_workers_pub")),
            stock: vec![ItemStack::new("lockpick", 5), ItemStack::new("whiskey", 3)],
            stage_stock_rules: vec![StageStockRule {
                quest_id: QuestId::new("case01"),
                stage: StageId::new("leads_open"),
                match_kind: StockRuleMatch::AtOrPastStage,
                mode: StockRuleMode::Append,
                stock: vec![ItemStack::new("forged_pass", 2), ItemStack::new("map_fragment", 1)],
            }],
            access: Some(MerchantAccessRequirements {
                required_flags_all: Vec::new(),
                unlock_by_any_flag: vec!["underworld_contact".to_string()],
                unlock_by_any_faction_reputation: [(FactionId::new("fct_underworld"), 2)]
                    .into_iter()
                    .collect(),
                unlock_hint: Some(
                    "Earn underworld trust: set underworld_contact or reach +2 Tunnel Syndicate reputation."
                        .to_string(),
                ),
            }),
            economy: MerchantEconomy {
                buy_multiplier: 1.15,
                sell_multiplier: 0.65,
            },
            role_note: Some("Underworld broker for contraband and sensitive evidence.".to_string()),
            economy_loop_note: Some(
                "Sell high-value clues, buy infiltration tools, push into riskier routes.".to_string(),
            ),
        },
        MerchantDefinition {
            id: MerchantId::new("apothecary_shop"),
            name: "Loewen-Apotheke".to_string(),
            character_id: CharacterId::new("apothecary"),
            location_id: Some(LocationId::new("loc_apothecary")),
            stock: vec![ItemStack::new("bandage", 8), ItemStack::new("tonic", 6)],
            stage_stock_rules: vec![StageStockRule {
                quest_id: QuestId::new("case01"),
                stage: StageId::new("leads_open"),
                match_kind: StockRuleMatch::AtOrPastStage,
                mode: StockRuleMode::Append,
                stock: vec![ItemStack::new("focus_draught", 4)],
            }],
            access: None,
            economy: MerchantEconomy {
                buy_multiplier: 1.05,
                sell_multiplier: 0.45,
            },
            role_note: Some("Medical supplier focused on sustain and recovery consumables.".to_string()),
            economy_loop_note: Some(
                "Converts cash into stability to maintain long investigation chains.".to_string(),
            ),
        },
        MerchantDefinition {
            id: MerchantId::new("tailor_shop"),
            name: "Fein Tailoring".to_string(),
            character_id: CharacterId::new("tailor"),
            location_id: Some(LocationId::new("loc_tailor")),
            stock: vec![ItemStack::new("starched_collar", 5), ItemStack::new("tailored_gloves", 4)],
            stage_stock_rules: vec![StageStockRule {
                quest_id: QuestId::new("case01"),
                stage: StageId::new("bank_investigation"),
                match_kind: StockRuleMatch::AtOrPastStage,
                mode: StockRuleMode::Append,
                stock: vec![ItemStack::new("district_pass", 2)],
            }],
            access: None,
            economy: MerchantEconomy {
                buy_multiplier: 1.2,
                sell_multiplier: 0.5,
            },
            role_note: Some("Social leverage and disguise-adjacent tools for pressure dialogues.".to_string()),
            economy_loop_note: Some(
                "Trade money for social edges that open high-value branch outcomes.".to_string(),
            ),
        },
        MerchantDefinition {
            id: MerchantId::new("pub_keeper"),
            name: "Zum Schlappen Barkeep".to_string(),
            character_id: CharacterId::new("innkeeper"),
            location_id: Some(LocationId::new("loc_pub")),
            stock: vec![ItemStack::new("hot_stew", 10), ItemStack::new("whiskey", 6)],
            stage_stock_rules: vec![StageStockRule {
                quest_id: QuestId::new("case01"),
                stage: StageId::new("leads_open"),
                match_kind: StockRuleMatch::AtOrPastStage,
                mode: StockRuleMode::Append,
                stock: vec![ItemStack::new("rumor_note", 3)],
            }],
            access: None,
            economy: MerchantEconomy {
                buy_multiplier: 1.0,
                sell_multiplier: 0.35,
            },
            role_note: Some("Low-cost sustain plus information-style trade goods.".to_string()),
            economy_loop_note: Some(
                "Cheap consumables keep momentum; rumor buys convert money into route intel.".to_string(),
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence() -> MerchantDefinition {
        standard_merchants()
            .into_iter()
            .find(|m| m.id.as_str() == "the_fence")
            .unwrap()
    }

    fn stages_at(quest: &str, sequence: &[&str], current: &str) -> HashMap<QuestId, QuestStageView> {
        let view = QuestStageView {
            current: Some(StageId::new(current)),
            sequence: sequence.iter().map(|s| StageId::new(*s)).collect(),
        };
        [(QuestId::new(quest), view)].into_iter().collect()
    }

    const CASE01_STAGES: &[&str] = &[
        "not_started",
        "briefing",
        "bank_investigation",
        "leads_open",
        "leads_done",
        "finale",
        "resolved",
    ];

    #[test]
    fn merchant_without_access_rules_is_unlocked() {
        let mut merchant = fence();
        merchant.access = None;

        let access = merchant.access_for(&HashMap::new(), &HashMap::new());

        assert!(access.is_unlocked());
    }

    #[test]
    fn missing_required_flags_lock_with_hint() {
        let mut merchant = fence();
        merchant.access = Some(MerchantAccessRequirements {
            required_flags_all: vec!["letter_of_passage".to_string()],
            unlock_hint: Some("Obtain a letter of passage.".to_string()),
            ..Default::default()
        });

        match merchant.access_for(&HashMap::new(), &HashMap::new()) {
            MerchantAccess::Locked { reason } => assert_eq!(reason, "Obtain a letter of passage."),
            MerchantAccess::Unlocked => panic!("merchant should be locked"),
        }
    }

    #[test]
    fn any_flag_or_reputation_unlocks_the_fence() {
        let merchant = fence();

        let with_flag: HashMap<String, bool> =
            [("underworld_contact".to_string(), true)].into_iter().collect();
        assert!(merchant.access_for(&with_flag, &HashMap::new()).is_unlocked());

        let with_rep: HashMap<FactionId, i64> =
            [(FactionId::new("fct_underworld"), 2)].into_iter().collect();
        assert!(merchant.access_for(&HashMap::new(), &with_rep).is_unlocked());

        let low_rep: HashMap<FactionId, i64> =
            [(FactionId::new("fct_underworld"), 1)].into_iter().collect();
        match merchant.access_for(&HashMap::new(), &low_rep) {
            MerchantAccess::Locked { reason } => assert!(reason.contains("underworld trust")),
            MerchantAccess::Unlocked => panic!("merchant should be locked"),
        }
    }

    #[test]
    fn locked_reason_defaults_when_no_hint_authored() {
        let mut merchant = fence();
        merchant.access = Some(MerchantAccessRequirements {
            unlock_by_any_flag: vec!["introduced".to_string()],
            ..Default::default()
        });

        match merchant.access_for(&HashMap::new(), &HashMap::new()) {
            MerchantAccess::Locked { reason } => {
                assert_eq!(reason, "Build reputation or obtain an introduction first.");
            }
            MerchantAccess::Unlocked => panic!("merchant should be locked"),
        }
    }

    #[test]
    fn stock_is_base_only_before_rule_stage() {
        let merchant = fence();
        let stages = stages_at("case01", CASE01_STAGES, "briefing");

        let stock = merchant.stock_for(&stages);

        assert_eq!(stock, vec![ItemStack::new("lockpick", 5), ItemStack::new("whiskey", 3)]);
    }

    #[test]
    fn stock_rule_appends_at_or_past_its_stage() {
        let merchant = fence();

        for stage in ["leads_open", "finale"] {
            let stages = stages_at("case01", CASE01_STAGES, stage);
            let stock = merchant.stock_for(&stages);
            assert_eq!(
                stock,
                vec![
                    ItemStack::new("lockpick", 5),
                    ItemStack::new("whiskey", 3),
                    ItemStack::new("forged_pass", 2),
                    ItemStack::new("map_fragment", 1),
                ]
            );
        }
    }

    #[test]
    fn replace_rule_discards_base_stock() {
        let mut merchant = fence();
        merchant.stage_stock_rules[0].mode = StockRuleMode::Replace;
        let stages = stages_at("case01", CASE01_STAGES, "leads_open");

        let stock = merchant.stock_for(&stages);

        assert_eq!(stock, vec![ItemStack::new("forged_pass", 2), ItemStack::new("map_fragment", 1)]);
    }

    #[test]
    fn at_stage_rule_matches_only_exact_stage() {
        let mut merchant = fence();
        merchant.stage_stock_rules[0].match_kind = StockRuleMatch::AtStage;

        let at = merchant.stock_for(&stages_at("case01", CASE01_STAGES, "leads_open"));
        assert_eq!(at.len(), 4);

        let past = merchant.stock_for(&stages_at("case01", CASE01_STAGES, "finale"));
        assert_eq!(past.len(), 2);
    }

    #[test]
    fn unknown_quest_stage_leaves_rules_unmatched() {
        let merchant = fence();

        let stock = merchant.stock_for(&HashMap::new());

        assert_eq!(stock.len(), 2);
    }

    #[test]
    fn merge_stocks_sums_by_item_and_drops_empties() {
        let base = vec![ItemStack::new("whiskey", 3), ItemStack::new("bread", 0)];
        let patch = vec![ItemStack::new("whiskey", 2), ItemStack::new("lockpick", 1)];

        let merged = merge_stocks(&base, &patch);

        assert_eq!(merged, vec![ItemStack::new("whiskey", 5), ItemStack::new("lockpick", 1)]);
    }

    #[test]
    fn prices_round_and_clamp_like_the_counter() {
        let merchant = fence();

        // 30 * 1.15 = 34.5 rounds up; 30 * 0.65 = 19.5 floors down.
        assert_eq!(merchant.buy_price(30), 35);
        assert_eq!(merchant.sell_price(30), 19);
        assert_eq!(merchant.buy_price(0), 1);
        assert_eq!(merchant.sell_price(0), 0);
    }

    #[test]
    fn sanitize_item_stacks_drops_unknown_and_sums_duplicates() {
        let registry = standard_item_registry();
        let raw = vec![
            RawItemStack { item_id: ItemId::new("bread"), quantity: 2.9 },
            RawItemStack { item_id: ItemId::new("bread"), quantity: 1.0 },
            RawItemStack { item_id: ItemId::new("ghost_item"), quantity: 4.0 },
            RawItemStack { item_id: ItemId::new("whiskey"), quantity: -2.0 },
            RawItemStack { item_id: ItemId::new("tonic"), quantity: f64::NAN },
        ];

        let cleaned = sanitize_item_stacks(&registry, &raw);

        assert_eq!(cleaned, vec![ItemStack::new("bread", 3)]);
    }

    #[test]
    fn normalize_money_clamps_and_defaults() {
        assert_eq!(normalize_money(Some(99.9)), 99);
        assert_eq!(normalize_money(Some(-5.0)), 0);
        assert_eq!(normalize_money(Some(f64::INFINITY)), STARTER_MONEY);
        assert_eq!(normalize_money(None), STARTER_MONEY);
    }

    #[test]
    fn starter_kit_matches_the_case_opening() {
        let stacks = starter_item_stacks();

        assert_eq!(stacks.len(), 4);
        assert_eq!(stacks[3], ItemStack::new("bread", 3));
        assert_eq!(STARTER_MONEY, 140);
    }

    #[test]
    fn standard_merchants_stock_only_registered_items() {
        let registry = standard_item_registry();

        for merchant in standard_merchants() {
            for stack in &merchant.stock {
                assert!(registry.contains(&stack.item_id), "unknown item {}", stack.item_id);
            }
            for rule in &merchant.stage_stock_rules {
                for stack in &rule.stock {
                    assert!(registry.contains(&stack.item_id), "unknown item {}", stack.item_id);
                }
            }
        }
    }

    #[test]
    fn merchant_definition_round_trips_with_rule_renames() {
        let merchant = fence();
        let json = serde_json::to_string(&merchant).unwrap();

        assert!(json.contains("\"match\":\"at_or_past_stage\""));
        let back: MerchantDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, merchant);
    }

    #[test]
    fn item_effects_parse_with_unknown_fallback() {
        let effect: ItemEffect =
            serde_json::from_str(r#"{"type":"summon_airship","power":9}"#).unwrap();
        assert_eq!(effect, ItemEffect::Unknown);

        let grant: ItemEffect = serde_json::from_str(r#"{"type":"grant_xp","amount":5}"#).unwrap();
        assert_eq!(grant, ItemEffect::GrantXp { amount: 5 });
    }
}
