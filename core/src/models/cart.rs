// core/src/models/cart.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::round_money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
  pub id: Uuid,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
  pub id: Uuid,
  pub cart_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
}

/// A cart item joined with the product data needed for display and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
  pub item_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub subtotal: Decimal,
}

impl CartLine {
  pub fn new(item_id: Uuid, product_id: Uuid, product_name: String, unit_price: Decimal, quantity: i32) -> Self {
    let subtotal = round_money(unit_price * Decimal::from(quantity));
    Self {
      item_id,
      product_id,
      product_name,
      unit_price,
      quantity,
      subtotal,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
  pub id: Uuid,
  pub user_id: Uuid,
  pub items: Vec<CartLine>,
  pub total_items: i32,
  pub total_price: Decimal,
}

impl CartView {
  pub fn new(cart: &Cart, items: Vec<CartLine>) -> Self {
    let total_items = items.iter().map(|l| l.quantity).sum();
    let total_price = round_money(items.iter().map(|l| l.subtotal).sum());
    Self {
      id: cart.id,
      user_id: cart.user_id,
      items,
      total_items,
      total_price,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
