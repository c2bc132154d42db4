//! Inventory store.
//!
//! The player's purse and item stacks, plus the merchant trade loop.
//! Authored stock is a ceiling, not a live warehouse: per-merchant sales are
//! tracked for the session and subtracted from whatever the stage rules
//! currently offer. One stack per item id; sanitization merges duplicates on
//! load anyway.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use gumshoe_domain::{
    normalize_money, sanitize_item_stacks, starter_item_stacks, FactionId, ItemEffect, ItemId,
    ItemKind, ItemRegistry, ItemStack, MerchantAccess, MerchantDefinition, MerchantId, QuestId,
    QuestStageView, RawItemStack, UserId, STARTER_MONEY,
};

use crate::infrastructure::ports::{RawInventorySnapshot, RepoError, SaveGameRepo};

/// Why a trade was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TradeError {
    #[error("Unknown merchant")]
    UnknownMerchant,
    #[error("{reason}")]
    MerchantLocked { reason: String },
    #[error("Unknown item")]
    UnknownItem,
    #[error("Out of stock")]
    OutOfStock,
    #[error("Not enough money")]
    InsufficientFunds,
    #[error("Item not held")]
    NotHeld,
    #[error("Item cannot be used")]
    NotUsable,
}

/// Player-side state a merchant consults before trading.
#[derive(Debug, Clone, Default)]
pub struct TradeContext {
    pub flags: HashMap<String, bool>,
    pub faction_reputation: HashMap<FactionId, i64>,
    pub quest_stages: HashMap<QuestId, QuestStageView>,
}

/// Settled trade, for the caller's toast or ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeReceipt {
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: i64,
    pub total: i64,
    pub money_after: i64,
}

#[derive(Default)]
struct InventoryState {
    money: i64,
    items: Vec<ItemStack>,
    merchant_sales: HashMap<MerchantId, HashMap<ItemId, u32>>,
}

fn fresh_state() -> InventoryState {
    InventoryState {
        money: STARTER_MONEY,
        items: starter_item_stacks(),
        merchant_sales: HashMap::new(),
    }
}

/// See module docs.
pub struct Inventory {
    user_id: UserId,
    registry: Arc<ItemRegistry>,
    merchants: Arc<HashMap<MerchantId, MerchantDefinition>>,
    save_game: Arc<dyn SaveGameRepo>,
    state: Mutex<InventoryState>,
}

impl Inventory {
    pub fn new(
        user_id: UserId,
        registry: Arc<ItemRegistry>,
        merchants: Arc<HashMap<MerchantId, MerchantDefinition>>,
        save_game: Arc<dyn SaveGameRepo>,
    ) -> Self {
        Self {
            user_id,
            registry,
            merchants,
            save_game,
            state: Mutex::new(fresh_state()),
        }
    }

    pub async fn money(&self) -> i64 {
        self.state.lock().await.money
    }

    pub async fn items(&self) -> Vec<ItemStack> {
        self.state.lock().await.items.clone()
    }

    /// Held quantities keyed by item id, for condition evaluation.
    pub async fn item_counts(&self) -> HashMap<ItemId, u32> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .map(|s| (s.item_id.clone(), s.quantity))
            .collect()
    }

    /// What the merchant offers the player right now: stage-rule stock minus
    /// whatever this session already bought.
    pub async fn merchant_stock(
        &self,
        merchant_id: &MerchantId,
        quest_stages: &HashMap<QuestId, QuestStageView>,
    ) -> Result<Vec<ItemStack>, TradeError> {
        let merchant = self
            .merchants
            .get(merchant_id)
            .ok_or(TradeError::UnknownMerchant)?;
        let state = self.state.lock().await;
        let sales = state.merchant_sales.get(merchant_id);
        let mut stock = merchant.stock_for(quest_stages);
        for entry in &mut stock {
            let sold = sales
                .and_then(|m| m.get(&entry.item_id))
                .copied()
                .unwrap_or(0);
            entry.quantity = entry.quantity.saturating_sub(sold);
        }
        stock.retain(|s| s.quantity > 0);
        Ok(stock)
    }

    /// Buys `quantity` units from a merchant. Zero rounds up to one.
    pub async fn buy(
        &self,
        merchant_id: &MerchantId,
        item_id: &ItemId,
        quantity: u32,
        ctx: &TradeContext,
    ) -> Result<TradeReceipt, TradeError> {
        let quantity = quantity.max(1);
        let merchant = self
            .merchants
            .get(merchant_id)
            .ok_or(TradeError::UnknownMerchant)?;
        if let MerchantAccess::Locked { reason } =
            merchant.access_for(&ctx.flags, &ctx.faction_reputation)
        {
            return Err(TradeError::MerchantLocked { reason });
        }
        let definition = self.registry.get(item_id).ok_or(TradeError::UnknownItem)?;

        let mut state = self.state.lock().await;
        let sold = state
            .merchant_sales
            .get(merchant_id)
            .and_then(|m| m.get(item_id))
            .copied()
            .unwrap_or(0);
        let available = merchant
            .stock_for(&ctx.quest_stages)
            .into_iter()
            .find(|s| &s.item_id == item_id)
            .map(|s| s.quantity.saturating_sub(sold))
            .unwrap_or(0);
        if available < quantity {
            return Err(TradeError::OutOfStock);
        }

        let unit_price = merchant.buy_price(definition.value);
        let total = unit_price * i64::from(quantity);
        if state.money < total {
            return Err(TradeError::InsufficientFunds);
        }

        state.money -= total;
        match state.items.iter_mut().find(|s| &s.item_id == item_id) {
            Some(stack) => stack.quantity += quantity,
            None => state.items.push(ItemStack::new(item_id.clone(), quantity)),
        }
        *state
            .merchant_sales
            .entry(merchant_id.clone())
            .or_default()
            .entry(item_id.clone())
            .or_default() += quantity;

        Ok(TradeReceipt {
            item_id: item_id.clone(),
            quantity,
            unit_price,
            total,
            money_after: state.money,
        })
    }

    /// Sells `quantity` held units to a merchant. Zero rounds up to one.
    pub async fn sell(
        &self,
        merchant_id: &MerchantId,
        item_id: &ItemId,
        quantity: u32,
        ctx: &TradeContext,
    ) -> Result<TradeReceipt, TradeError> {
        let quantity = quantity.max(1);
        let merchant = self
            .merchants
            .get(merchant_id)
            .ok_or(TradeError::UnknownMerchant)?;
        if let MerchantAccess::Locked { reason } =
            merchant.access_for(&ctx.flags, &ctx.faction_reputation)
        {
            return Err(TradeError::MerchantLocked { reason });
        }
        let definition = self.registry.get(item_id).ok_or(TradeError::UnknownItem)?;

        let mut state = self.state.lock().await;
        let held = state
            .items
            .iter()
            .find(|s| &s.item_id == item_id)
            .map(|s| s.quantity)
            .unwrap_or(0);
        if held < quantity {
            return Err(TradeError::NotHeld);
        }

        let unit_price = merchant.sell_price(definition.value);
        let total = unit_price * i64::from(quantity);
        state.money += total;
        if let Some(stack) = state.items.iter_mut().find(|s| &s.item_id == item_id) {
            stack.quantity -= quantity;
        }
        state.items.retain(|s| s.quantity > 0);

        Ok(TradeReceipt {
            item_id: item_id.clone(),
            quantity,
            unit_price,
            total,
            money_after: state.money,
        })
    }

    /// Consumes one unit of a consumable and hands its effects back for the
    /// caller to apply.
    pub async fn use_item(&self, item_id: &ItemId) -> Result<Vec<ItemEffect>, TradeError> {
        let definition = self.registry.get(item_id).ok_or(TradeError::UnknownItem)?;
        if definition.kind != ItemKind::Consumable {
            return Err(TradeError::NotUsable);
        }

        let mut state = self.state.lock().await;
        let Some(stack) = state.items.iter_mut().find(|s| &s.item_id == item_id) else {
            return Err(TradeError::NotHeld);
        };
        stack.quantity -= 1;
        state.items.retain(|s| s.quantity > 0);

        Ok(definition.effects.clone())
    }

    /// Loads the persisted purse and stacks, normalizing raw rows. A missing
    /// snapshot keeps the starter allowance. Session sales reset either way.
    pub async fn hydrate(&self) -> Result<(), RepoError> {
        let snapshot = self.save_game.load_inventory(self.user_id.clone()).await?;
        let mut state = self.state.lock().await;
        if let Some(raw) = snapshot {
            state.money = normalize_money(raw.money);
            state.items = sanitize_item_stacks(&self.registry, &raw.items);
        }
        state.merchant_sales.clear();
        Ok(())
    }

    /// Writes the purse and stacks through to the save repository.
    pub async fn persist(&self) -> Result<(), RepoError> {
        let snapshot = {
            let state = self.state.lock().await;
            RawInventorySnapshot {
                money: Some(state.money as f64),
                items: state
                    .items
                    .iter()
                    .map(|s| RawItemStack {
                        item_id: s.item_id.clone(),
                        quantity: f64::from(s.quantity),
                    })
                    .collect(),
            }
        };
        self.save_game
            .save_inventory(self.user_id.clone(), &snapshot)
            .await
    }

    /// Back to the starter purse and stacks.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = fresh_state();
    }
}
