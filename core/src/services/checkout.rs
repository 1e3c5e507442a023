// core/src/services/checkout.rs

//! Checkout sessions and their conversion into orders.
//!
//! A session snapshots the cart items and total together with the customer's
//! delivery and payment choices, and lives for a limited time. Orders are
//! built from that snapshot, never from the live cart. `complete` is the single place where
//! a session becomes an order; it is safe to call repeatedly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::analytics::AnalyticsService;
use super::{ensure_no_payment_in_progress, ensure_staff, session_payment_open};
use super::notifications::Notifier;
use crate::error::{ShopError, ShopResult};
use crate::models::{
  round_money, CheckoutLine, CheckoutSession, CheckoutStatus, DeliveryType, DeliveryZone, Order, PaymentMethod,
  PaymentMethodProvider, PickupLocation, User,
};
use crate::store::{CheckoutCommit, CommitOutcome, DynStore};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCheckoutSession {
  pub delivery_type: DeliveryType,
  pub delivery_zone_id: Option<Uuid>,
  pub pickup_location_id: Option<Uuid>,
  pub delivery_address: Option<String>,
  /// Saved address to deliver to, used when `delivery_address` is blank.
  pub address_id: Option<Uuid>,
  pub delivery_instructions: Option<String>,
  pub payment_method_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDeliveryZone {
  pub name: String,
  pub description: Option<String>,
  pub delivery_fee: Decimal,
  pub estimated_days: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPickupLocation {
  pub name: String,
  pub address: String,
  pub contact_phone: Option<String>,
  pub operating_hours: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentMethod {
  pub name: String,
  pub description: Option<String>,
  pub provider: PaymentMethodProvider,
  #[serde(default)]
  pub requires_verification: bool,
  pub min_amount: Option<Decimal>,
  pub max_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
  pub session: CheckoutSession,
  /// Present when the session completed on confirmation (cash payment).
  pub order: Option<Order>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct CheckoutService {
  store: DynStore,
  analytics: AnalyticsService,
  notifier: Notifier,
  ttl_minutes: i64,
}

impl CheckoutService {
  pub fn new(store: DynStore, analytics: AnalyticsService, notifier: Notifier, ttl_minutes: i64) -> Self {
    Self {
      store,
      analytics,
      notifier,
      ttl_minutes,
    }
  }

  // --- delivery & payment options ---

  pub async fn list_delivery_zones(&self) -> ShopResult<Vec<DeliveryZone>> {
    self.store.list_delivery_zones(true).await
  }

  pub async fn list_pickup_locations(&self) -> ShopResult<Vec<PickupLocation>> {
    self.store.list_pickup_locations(true).await
  }

  pub async fn list_payment_methods(&self) -> ShopResult<Vec<PaymentMethod>> {
    self.store.list_payment_methods(true).await
  }

  pub async fn create_delivery_zone(&self, user: &User, input: NewDeliveryZone) -> ShopResult<DeliveryZone> {
    ensure_staff(user)?;
    if input.name.trim().is_empty() {
      return Err(ShopError::Validation("Zone name is required".to_string()));
    }
    if input.delivery_fee < Decimal::ZERO || input.estimated_days < 0 {
      return Err(ShopError::Validation(
        "Delivery fee and estimated days cannot be negative".to_string(),
      ));
    }
    let zone = DeliveryZone {
      id: Uuid::new_v4(),
      name: input.name.trim().to_string(),
      description: input.description,
      delivery_fee: round_money(input.delivery_fee),
      estimated_days: input.estimated_days,
      is_active: true,
    };
    self.store.insert_delivery_zone(&zone).await?;
    Ok(zone)
  }

  pub async fn create_pickup_location(&self, user: &User, input: NewPickupLocation) -> ShopResult<PickupLocation> {
    ensure_staff(user)?;
    if input.name.trim().is_empty() || input.address.trim().is_empty() {
      return Err(ShopError::Validation("Name and address are required".to_string()));
    }
    let location = PickupLocation {
      id: Uuid::new_v4(),
      name: input.name.trim().to_string(),
      address: input.address.trim().to_string(),
      contact_phone: input.contact_phone,
      operating_hours: input.operating_hours,
      is_active: true,
    };
    self.store.insert_pickup_location(&location).await?;
    Ok(location)
  }

  pub async fn create_payment_method(&self, user: &User, input: NewPaymentMethod) -> ShopResult<PaymentMethod> {
    ensure_staff(user)?;
    if input.name.trim().is_empty() {
      return Err(ShopError::Validation("Payment method name is required".to_string()));
    }
    if let (Some(min), Some(max)) = (input.min_amount, input.max_amount) {
      if min > max {
        return Err(ShopError::Validation("min_amount cannot exceed max_amount".to_string()));
      }
    }
    let method = PaymentMethod {
      id: Uuid::new_v4(),
      name: input.name.trim().to_string(),
      description: input.description,
      provider: input.provider,
      is_active: true,
      requires_verification: input.requires_verification,
      min_amount: input.min_amount,
      max_amount: input.max_amount,
    };
    self.store.insert_payment_method(&method).await?;
    Ok(method)
  }

  // --- sessions ---

  /// Opens a session over the user's current cart. Any earlier open session
  /// on the same cart is cancelled, unless a payment for it is still open.
  #[instrument(skip(self, user, input), fields(user_id = %user.id, delivery = %input.delivery_type))]
  pub async fn create_session(&self, user: &User, input: NewCheckoutSession) -> ShopResult<CheckoutSession> {
    let mut delivery_address = blank_to_none(input.delivery_address);
    let (delivery_zone_id, pickup_location_id, delivery_fee) = match input.delivery_type {
      DeliveryType::Delivery => {
        let zone_id = input
          .delivery_zone_id
          .ok_or_else(|| ShopError::Validation("Delivery zone is required for delivery".to_string()))?;
        let zone = self
          .store
          .get_delivery_zone(zone_id)
          .await?
          .filter(|z| z.is_active)
          .ok_or_else(|| ShopError::Validation("Invalid delivery zone".to_string()))?;
        if delivery_address.is_none() {
          if let Some(address_id) = input.address_id {
            delivery_address = self
              .store
              .get_address(address_id)
              .await?
              .filter(|a| a.user_id == user.id)
              .map(|a| a.one_line());
          }
        }
        if delivery_address.is_none() {
          return Err(ShopError::Validation(
            "Delivery address is required for delivery".to_string(),
          ));
        }
        (Some(zone.id), None, zone.delivery_fee)
      }
      DeliveryType::Pickup => {
        let location_id = input
          .pickup_location_id
          .ok_or_else(|| ShopError::Validation("Pickup location is required for pickup".to_string()))?;
        let location = self
          .store
          .get_pickup_location(location_id)
          .await?
          .filter(|l| l.is_active)
          .ok_or_else(|| ShopError::Validation("Invalid pickup location".to_string()))?;
        delivery_address = None;
        (None, Some(location.id), Decimal::ZERO)
      }
    };

    let method = self
      .store
      .get_payment_method(input.payment_method_id)
      .await?
      .filter(|m| m.is_active)
      .ok_or_else(|| ShopError::Validation("Invalid payment method".to_string()))?;

    ensure_no_payment_in_progress(&self.store, user.id).await?;
    let cart = self.store.get_or_create_cart(user.id).await?;
    let lines = self.store.cart_lines(cart.id).await?;
    if lines.is_empty() {
      return Err(ShopError::Validation("Cart is empty".to_string()));
    }
    let subtotal = round_money(lines.iter().map(|l| l.subtotal).sum());

    let now = Utc::now();
    let mut session = CheckoutSession {
      id: Uuid::new_v4(),
      user_id: user.id,
      cart_id: cart.id,
      delivery_type: input.delivery_type,
      delivery_zone_id,
      pickup_location_id,
      delivery_address,
      delivery_instructions: blank_to_none(input.delivery_instructions),
      payment_method_id: method.id,
      subtotal,
      delivery_fee,
      total: Decimal::ZERO,
      status: CheckoutStatus::Pending,
      expires_at: CheckoutSession::expiry_from(now, self.ttl_minutes),
      created_at: now,
      updated_at: now,
    };
    session.calculate_total();
    if !method.accepts_amount(session.total) {
      return Err(ShopError::Validation(format!(
        "{} cannot be used for a total of {}",
        method.name, session.total
      )));
    }

    let snapshot: Vec<CheckoutLine> = lines
      .iter()
      .map(|l| CheckoutLine::from_cart_line(session.id, l))
      .collect();
    self.store.insert_checkout_session(&session, &snapshot).await?;
    info!(session_id = %session.id, total = %session.total, items = snapshot.len(), "Checkout session created.");
    Ok(session)
  }

  /// Flips an open session past its deadline to EXPIRED and returns the
  /// current stored state.
  async fn refresh(&self, session: CheckoutSession, now: DateTime<Utc>) -> ShopResult<CheckoutSession> {
    if !session.needs_expiry(now) {
      return Ok(session);
    }
    debug!(session_id = %session.id, "Expiring checkout session on read.");
    let from = [CheckoutStatus::Pending, CheckoutStatus::PaymentPending];
    match self
      .store
      .transition_checkout_session(session.id, &from, CheckoutStatus::Expired)
      .await?
    {
      Some(expired) => Ok(expired),
      None => self.load(session.id).await,
    }
  }

  async fn load(&self, id: Uuid) -> ShopResult<CheckoutSession> {
    self
      .store
      .get_checkout_session(id)
      .await?
      .ok_or_else(|| ShopError::not_found("Checkout session", id))
  }

  async fn owned(&self, user: &User, id: Uuid) -> ShopResult<CheckoutSession> {
    let session = self.load(id).await?;
    if session.user_id != user.id {
      return Err(ShopError::not_found("Checkout session", id));
    }
    Ok(session)
  }

  pub async fn get_session(&self, user: &User, id: Uuid) -> ShopResult<CheckoutSession> {
    let session = self.owned(user, id).await?;
    self.refresh(session, Utc::now()).await
  }

  pub async fn session_items(&self, user: &User, id: Uuid) -> ShopResult<Vec<CheckoutLine>> {
    let session = self.owned(user, id).await?;
    self.store.checkout_lines(session.id).await
  }

  pub async fn list_sessions(&self, user: &User) -> ShopResult<Vec<CheckoutSession>> {
    let now = Utc::now();
    let mut sessions = Vec::new();
    for session in self.store.list_checkout_sessions(user.id).await? {
      sessions.push(self.refresh(session, now).await?);
    }
    Ok(sessions)
  }

  /// Recomputes and persists `total = subtotal + delivery_fee`.
  pub async fn calculate_total(&self, user: &User, id: Uuid) -> ShopResult<CheckoutSession> {
    let mut session = self.owned(user, id).await?;
    session.calculate_total();
    session.updated_at = Utc::now();
    self.store.update_checkout_session(&session).await?;
    Ok(session)
  }

  /// PENDING → PAYMENT_PENDING. An expired session is marked EXPIRED and
  /// rejected. Cash sessions complete right away.
  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn confirm(&self, user: &User, id: Uuid) -> ShopResult<ConfirmOutcome> {
    let session = self.owned(user, id).await?;
    if session.status != CheckoutStatus::Pending {
      return Err(ShopError::InvalidState(format!(
        "Checkout session is {} and cannot be confirmed",
        session.status
      )));
    }
    if session.is_expired_at(Utc::now()) {
      self
        .store
        .transition_checkout_session(id, &[CheckoutStatus::Pending], CheckoutStatus::Expired)
        .await?;
      warn!(session_id = %id, "Confirmation attempted on an expired checkout session.");
      return Err(ShopError::InvalidState("Checkout session has expired".to_string()));
    }

    let confirmed = self
      .store
      .transition_checkout_session(id, &[CheckoutStatus::Pending], CheckoutStatus::PaymentPending)
      .await?
      .ok_or_else(|| ShopError::InvalidState("Checkout session is no longer pending".to_string()))?;
    info!(session_id = %id, "Checkout session confirmed.");

    let method = self.store.get_payment_method(confirmed.payment_method_id).await?;
    if method.is_some_and(|m| m.provider == PaymentMethodProvider::Cash) {
      let order = self.complete(id, false).await?.into_order();
      let session = self.load(id).await?;
      return Ok(ConfirmOutcome {
        session,
        order: Some(order),
      });
    }
    Ok(ConfirmOutcome {
      session: confirmed,
      order: None,
    })
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn cancel(&self, user: &User, id: Uuid) -> ShopResult<CheckoutSession> {
    let session = self.owned(user, id).await?;
    if !session.status.is_open() {
      return Err(ShopError::InvalidState(format!(
        "Checkout session is {} and cannot be cancelled",
        session.status
      )));
    }
    if session_payment_open(&self.store, id).await? {
      return Err(ShopError::InvalidState(
        "A payment is in progress for this checkout session".to_string(),
      ));
    }
    self
      .store
      .transition_checkout_session(
        id,
        &[CheckoutStatus::Pending, CheckoutStatus::PaymentPending],
        CheckoutStatus::Cancelled,
      )
      .await?
      .ok_or_else(|| ShopError::InvalidState("Checkout session changed; please retry".to_string()))
  }

  /// Converts the session into an order. `paid` marks the order as paid; a
  /// paid completion is also accepted for a session that expired or was
  /// cancelled while the customer was approving the payment, since the money
  /// has already been collected. Calling it again returns the same order.
  #[instrument(skip(self))]
  pub async fn complete(&self, session_id: Uuid, paid: bool) -> ShopResult<CommitOutcome> {
    let session = self.load(session_id).await?;
    let provider = self
      .store
      .get_payment_method(session.payment_method_id)
      .await?
      .map(|m| m.provider);

    let mut allowed_from = vec![CheckoutStatus::PaymentPending];
    if paid {
      allowed_from.extend([CheckoutStatus::Expired, CheckoutStatus::Cancelled]);
    }
    let commit = CheckoutCommit {
      session_id,
      allowed_from,
      order: Order::from_checkout(&session, provider, paid, Utc::now()),
      history_note: Some(if paid {
        "Order created after successful payment".to_string()
      } else {
        "Order created, awaiting payment".to_string()
      }),
    };
    let outcome = self.store.commit_checkout(&commit).await?;

    if outcome.is_created() {
      let order = outcome.order();
      info!(order_id = %order.id, order_number = %order.order_number, "Order created from checkout.");
      let returning = self.store.list_orders(Some(order.user_id)).await?.len() > 1;
      self.analytics.order_placed(returning).await;
      if let Some(user) = self.store.get_user(order.user_id).await? {
        self.notifier.order_confirmation(&user, order).await;
      }
    } else {
      debug!(session_id = %session_id, "Checkout session already converted; returning existing order.");
    }
    Ok(outcome)
  }

  /// Sweeps every open session past its deadline to EXPIRED.
  #[instrument(skip(self))]
  pub async fn expire_stale_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<Uuid>> {
    let expired = self.store.expire_checkout_sessions(now).await?;
    if !expired.is_empty() {
      info!(count = expired.len(), "Expired stale checkout sessions.");
    }
    Ok(expired)
  }

  /// Open sessions that a sweep at `now` would expire, without changing them.
  pub async fn stale_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<CheckoutSession>> {
    self.store.list_stale_checkout_sessions(now).await
  }
}
