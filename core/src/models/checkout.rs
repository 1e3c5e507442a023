// core/src/models/checkout.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::CartLine;
use super::round_money;

pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;

string_enum! {
  pub enum DeliveryType {
    Delivery => "DELIVERY",
    Pickup => "PICKUP",
  }
}

string_enum! {
  pub enum CheckoutStatus {
    Pending => "PENDING",
    PaymentPending => "PAYMENT_PENDING",
    Completed => "COMPLETED",
    Expired => "EXPIRED",
    Cancelled => "CANCELLED",
  }
}

impl CheckoutStatus {
  /// PENDING and PAYMENT_PENDING sessions can still change.
  pub fn is_open(&self) -> bool {
    matches!(self, CheckoutStatus::Pending | CheckoutStatus::PaymentPending)
  }
}

string_enum! {
  pub enum PaymentMethodProvider {
    MtnMomo => "MTN_MOMO",
    AirtelMoney => "AIRTEL_MONEY",
    Cash => "CASH",
    Card => "CARD",
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryZone {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub delivery_fee: Decimal,
  pub estimated_days: i32,
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupLocation {
  pub id: Uuid,
  pub name: String,
  pub address: String,
  pub contact_phone: Option<String>,
  pub operating_hours: Option<String>,
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub provider: PaymentMethodProvider,
  pub is_active: bool,
  pub requires_verification: bool,
  pub min_amount: Option<Decimal>,
  pub max_amount: Option<Decimal>,
}

impl PaymentMethod {
  pub fn accepts_amount(&self, amount: Decimal) -> bool {
    self.min_amount.map_or(true, |min| amount >= min) && self.max_amount.map_or(true, |max| amount <= max)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
  pub id: Uuid,
  pub user_id: Uuid,
  pub cart_id: Uuid,
  pub delivery_type: DeliveryType,
  pub delivery_zone_id: Option<Uuid>,
  pub pickup_location_id: Option<Uuid>,
  pub delivery_address: Option<String>,
  pub delivery_instructions: Option<String>,
  pub payment_method_id: Uuid,
  pub subtotal: Decimal,
  pub delivery_fee: Decimal,
  pub total: Decimal,
  pub status: CheckoutStatus,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
  /// Recomputes `total` from `subtotal` and `delivery_fee`.
  pub fn calculate_total(&mut self) -> Decimal {
    self.total = round_money(self.subtotal + self.delivery_fee);
    self.total
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }

  /// Open session whose deadline has passed; reading it should flip it to EXPIRED.
  pub fn needs_expiry(&self, now: DateTime<Utc>) -> bool {
    self.status.is_open() && self.is_expired_at(now)
  }

  pub fn expiry_from(now: DateTime<Utc>, ttl_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(ttl_minutes)
  }
}

/// Item captured when the session is created. Orders are built from these rows,
/// so later cart edits never change what an open payment pays for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
  pub id: Uuid,
  pub session_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub subtotal: Decimal,
}

impl CheckoutLine {
  pub fn from_cart_line(session_id: Uuid, line: &CartLine) -> Self {
    Self {
      id: Uuid::new_v4(),
      session_id,
      product_id: line.product_id,
      product_name: line.product_name.clone(),
      unit_price: line.unit_price,
      quantity: line.quantity,
      subtotal: line.subtotal,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn session(subtotal: Decimal, fee: Decimal) -> CheckoutSession {
    let now = Utc::now();
    CheckoutSession {
      id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      cart_id: Uuid::new_v4(),
      delivery_type: DeliveryType::Delivery,
      delivery_zone_id: Some(Uuid::new_v4()),
      pickup_location_id: None,
      delivery_address: Some("Plot 4, Kampala Road".into()),
      delivery_instructions: None,
      payment_method_id: Uuid::new_v4(),
      subtotal,
      delivery_fee: fee,
      total: Decimal::ZERO,
      status: CheckoutStatus::Pending,
      expires_at: CheckoutSession::expiry_from(now, DEFAULT_SESSION_TTL_MINUTES),
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn total_is_subtotal_plus_fee() {
    let mut s = session(dec!(20.00), dec!(5.00));
    assert_eq!(s.calculate_total(), dec!(25.00));
    assert_eq!(s.total, dec!(25.00));
  }

  #[test]
  fn only_open_sessions_expire() {
    let mut s = session(dec!(1), dec!(0));
    let later = s.expires_at + Duration::seconds(1);
    assert!(s.needs_expiry(later));
    assert!(!s.needs_expiry(s.expires_at));
    s.status = CheckoutStatus::Completed;
    assert!(!s.needs_expiry(later));
  }

  #[test]
  fn payment_method_bounds() {
    let method = PaymentMethod {
      id: Uuid::new_v4(),
      name: "MTN".into(),
      description: None,
      provider: PaymentMethodProvider::MtnMomo,
      is_active: true,
      requires_verification: false,
      min_amount: Some(dec!(100)),
      max_amount: None,
    };
    assert!(!method.accepts_amount(dec!(99.99)));
    assert!(method.accepts_amount(dec!(100)));
    assert!(method.accepts_amount(dec!(10000000)));
  }

  #[test]
  fn checkout_line_copies_cart_pricing() {
    let session_id = Uuid::new_v4();
    let cart_line = CartLine::new(Uuid::new_v4(), Uuid::new_v4(), "Rosemary".into(), dec!(3.25), 3);
    let line = CheckoutLine::from_cart_line(session_id, &cart_line);
    assert_eq!(line.session_id, session_id);
    assert_eq!(line.product_id, cart_line.product_id);
    assert_eq!(line.subtotal, dec!(9.75));
    assert_ne!(line.id, cart_line.item_id);
  }
}
