// core/src/models/order.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checkout::{CheckoutLine, CheckoutSession, DeliveryType, PaymentMethodProvider};

string_enum! {
  pub enum OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Processing => "processing",
    ReadyForPickup => "ready_for_pickup",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
  }
}

impl OrderStatus {
  pub fn allowed_next(&self) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match self {
      Pending => &[Paid, Processing, Cancelled],
      Paid => &[Processing, ReadyForPickup, OutForDelivery, Cancelled, Refunded],
      Processing => &[ReadyForPickup, OutForDelivery, Completed, Cancelled],
      ReadyForPickup => &[Completed, Cancelled],
      OutForDelivery => &[Delivered],
      Delivered => &[Completed, Refunded],
      Completed => &[Refunded],
      Cancelled | Refunded => &[],
    }
  }

  pub fn can_transition_to(&self, next: OrderStatus) -> bool {
    self.allowed_next().contains(&next)
  }

  /// Customers may cancel only before fulfilment has moved on.
  pub fn is_cancellable(&self) -> bool {
    matches!(self, OrderStatus::Pending | OrderStatus::Processing)
  }

  pub fn is_terminal(&self) -> bool {
    self.allowed_next().is_empty()
  }
}

string_enum! {
  pub enum OrderPaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Uuid,
  pub checkout_session_id: Option<Uuid>,
  pub status: OrderStatus,
  pub payment_status: OrderPaymentStatus,
  pub delivery_method: DeliveryType,
  pub delivery_zone_id: Option<Uuid>,
  pub delivery_address: Option<String>,
  pub delivery_instructions: Option<String>,
  pub pickup_location_id: Option<Uuid>,
  pub payment_provider: Option<PaymentMethodProvider>,
  pub subtotal: Decimal,
  pub delivery_fee: Decimal,
  pub tax: Decimal,
  pub total: Decimal,
  pub tracking_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub paid_at: Option<DateTime<Utc>>,
  pub processed_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
  /// Builds the order a completed checkout session turns into. The order
  /// number is assigned by the store when the row is written.
  pub fn from_checkout(
    session: &CheckoutSession,
    provider: Option<PaymentMethodProvider>,
    paid: bool,
    now: DateTime<Utc>,
  ) -> Self {
    let (status, payment_status, paid_at) = if paid {
      (OrderStatus::Paid, OrderPaymentStatus::Paid, Some(now))
    } else {
      (OrderStatus::Pending, OrderPaymentStatus::Pending, None)
    };
    Self {
      id: Uuid::new_v4(),
      order_number: String::new(),
      user_id: session.user_id,
      checkout_session_id: Some(session.id),
      status,
      payment_status,
      delivery_method: session.delivery_type,
      delivery_zone_id: session.delivery_zone_id,
      delivery_address: session.delivery_address.clone(),
      delivery_instructions: session.delivery_instructions.clone(),
      pickup_location_id: session.pickup_location_id,
      payment_provider: provider,
      subtotal: session.subtotal,
      delivery_fee: session.delivery_fee,
      tax: Decimal::ZERO,
      total: session.total,
      tracking_number: None,
      created_at: now,
      updated_at: now,
      paid_at,
      processed_at: None,
      completed_at: None,
      cancelled_at: None,
    }
  }

  /// Applies `next` and stamps the lifecycle timestamp the first time a
  /// status is entered.
  pub fn apply_status(&mut self, next: OrderStatus, now: DateTime<Utc>) {
    self.status = next;
    self.updated_at = now;
    match next {
      OrderStatus::Paid => {
        self.paid_at.get_or_insert(now);
        self.payment_status = OrderPaymentStatus::Paid;
      }
      OrderStatus::Processing => {
        self.processed_at.get_or_insert(now);
      }
      OrderStatus::Completed => {
        self.completed_at.get_or_insert(now);
      }
      OrderStatus::Cancelled => {
        self.cancelled_at.get_or_insert(now);
      }
      OrderStatus::Refunded => {
        self.payment_status = OrderPaymentStatus::Refunded;
      }
      _ => {}
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub subtotal: Decimal,
}

impl OrderItem {
  pub fn from_checkout_line(order_id: Uuid, line: &CheckoutLine) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      product_id: line.product_id,
      product_name: line.product_name.clone(),
      quantity: line.quantity,
      unit_price: line.unit_price,
      subtotal: line.subtotal,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistory {
  pub id: Uuid,
  pub order_id: Uuid,
  pub status: OrderStatus,
  pub notes: Option<String>,
  pub created_by: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

impl OrderStatusHistory {
  pub fn new(order_id: Uuid, status: OrderStatus, notes: Option<String>, created_by: Option<Uuid>) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      status,
      notes,
      created_by,
      created_at: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNote {
  pub id: Uuid,
  pub order_id: Uuid,
  pub note: String,
  pub is_public: bool,
  pub created_by: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

/// Order numbers are `YYYYMMDD-NNNN`, numbered per calendar day from 0001.
pub fn format_order_number(date: NaiveDate, sequence: u32) -> String {
  format!("{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Sequence component of an order number issued on `date`, if it was.
pub fn order_number_sequence(order_number: &str, date: NaiveDate) -> Option<u32> {
  let prefix = date.format("%Y%m%d").to_string();
  order_number.strip_prefix(&prefix)?.strip_prefix('-')?.parse().ok()
}
