use bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Menu item as handed to the cart by a menu listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub price: Decimal,
}

impl MenuItem {
    fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && self.price >= Decimal::ZERO
    }
}

/// A cart line: one menu item and how many of it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartItem {
    #[serde(flatten)]
    pub item: MenuItem,
    pub quantity: u32,
}

/// Client-held pending order state, scoped to a single restaurant.
///
/// All lines share one restaurant; adding an item from another restaurant
/// replaces the whole cart (clear-and-replace, never a merge). The store is
/// an explicit value passed around by the embedding client, not a global,
/// and serializes with serde so the client can persist it after each
/// mutation. Two instances persisting to the same place race last-write-wins.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CartStore {
    items: Vec<CartItem>,
    restaurant_id: Option<ObjectId>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn restaurant_id(&self) -> Option<ObjectId> {
        self.restaurant_id
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds one of `item`. Returns whether the cart changed: an item with an
    /// empty id or name, or a negative price, is dropped. Switching
    /// restaurants replaces the entire cart with the new item at quantity 1.
    pub fn add_item(&mut self, item: MenuItem, restaurant_id: ObjectId) -> bool {
        if !item.is_valid() {
            tracing::warn!(?item, "refusing to add invalid item to cart");
            return false;
        }

        if self.restaurant_id.is_some() && self.restaurant_id != Some(restaurant_id) {
            tracing::debug!("cart restaurant changed, clearing previous items");
            self.items = vec![CartItem { item, quantity: 1 }];
            self.restaurant_id = Some(restaurant_id);
            return true;
        }

        self.restaurant_id = Some(restaurant_id);
        match self.items.iter_mut().find(|line| line.item.id == item.id) {
            Some(line) => line.quantity += 1,
            None => self.items.push(CartItem { item, quantity: 1 }),
        }

        true
    }

    /// Adds a batch of items atomically: one invalid item rejects the whole
    /// batch, and a restaurant switch replaces the cart with the whole batch.
    pub fn bulk_add(&mut self, items: Vec<MenuItem>, restaurant_id: ObjectId) -> bool {
        if items.is_empty() || items.iter().any(|item| !item.is_valid()) {
            tracing::warn!("refusing bulk add containing invalid items");
            return false;
        }

        if self.restaurant_id.is_some() && self.restaurant_id != Some(restaurant_id) {
            self.items.clear();
        }
        self.restaurant_id = Some(restaurant_id);

        for item in items {
            match self.items.iter_mut().find(|line| line.item.id == item.id) {
                Some(line) => line.quantity += 1,
                None => self.items.push(CartItem { item, quantity: 1 }),
            }
        }

        true
    }

    pub fn increment_quantity(&mut self, id: &str) {
        if let Some(line) = self.items.iter_mut().find(|line| line.item.id == id) {
            line.quantity += 1;
        }
    }

    /// Decrements by one, flooring at 1. Removal is explicit via [`remove`].
    ///
    /// [`remove`]: CartStore::remove
    pub fn decrement_quantity(&mut self, id: &str) {
        if let Some(line) = self.items.iter_mut().find(|line| line.item.id == id) {
            if line.quantity > 1 {
                line.quantity -= 1;
            }
        }
    }

    /// Removes a line. Dropping the last line resets the restaurant scope.
    pub fn remove(&mut self, id: &str) {
        self.items.retain(|line| line.item.id != id);
        if self.items.is_empty() {
            self.restaurant_id = None;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.restaurant_id = None;
    }
}
