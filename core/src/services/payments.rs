// core/src/services/payments.rs

//! Mobile-money payment lifecycle.
//!
//! ```text
//! PENDING ──initiate──▶ PROCESSING ──webhook/poll──▶ SUCCESSFUL | FAILED | CANCELLED
//!    ▲                                                          │
//!    └────────────────────── retry (≤ max) ◀────────────────────┘ (FAILED only)
//! ```
//!
//! Every status write is a compare-and-set against the open statuses, so a
//! payment that reached a terminal status can never be moved by a late or
//! duplicated webhook. A successful payment settles its target: a checkout
//! session is converted into a paid order, an existing order is marked paid.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::checkout::CheckoutService;
use super::ensure_staff;
use super::notifications::Notifier;
use super::orders::OrdersService;
use crate::error::{ShopError, ShopResult};
use crate::models::payment::new_transaction_reference;
use crate::models::{
  CheckoutStatus, MobilePayment, MobilePaymentProvider, NotificationType, Order, OrderPaymentStatus, PaymentNotification,
  PaymentStatus, PaymentTarget, ProviderCode, User, CURRENCY,
};
use crate::providers::{CollectionRequest, ProviderRegistry};
use crate::store::{DynStore, PaymentChange, PaymentQuery};

pub const MIN_PAYMENT_AMOUNT: Decimal = dec!(100);
pub const MAX_PAYMENT_AMOUNT: Decimal = dec!(5000000);
pub const DEFAULT_MAX_RETRIES: i32 = 3;

const OPEN: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Processing];

/// Validates a Uganda mobile number and returns its digits. Spaces, dashes
/// and a leading `+` are ignored.
pub fn normalize_phone(phone: &str) -> ShopResult<String> {
  let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
  let valid = match digits.len() {
    10 => ["077", "078", "076"].iter().any(|p| digits.starts_with(p)),
    12 => ["25677", "25678", "25676"].iter().any(|p| digits.starts_with(p)),
    _ => false,
  };
  if !valid {
    return Err(ShopError::Validation("Invalid phone number format".to_string()));
  }
  Ok(digits)
}

pub fn validate_amount(amount: Decimal) -> ShopResult<()> {
  if amount < MIN_PAYMENT_AMOUNT {
    return Err(ShopError::Validation(format!(
      "Amount is below minimum allowed ({} {})",
      CURRENCY, MIN_PAYMENT_AMOUNT
    )));
  }
  if amount > MAX_PAYMENT_AMOUNT {
    return Err(ShopError::Validation(format!(
      "Amount exceeds maximum allowed ({} {})",
      CURRENCY, MAX_PAYMENT_AMOUNT
    )));
  }
  Ok(())
}

fn target_of(payment: &MobilePayment) -> ShopResult<PaymentTarget> {
  payment.target().ok_or_else(|| {
    ShopError::Internal(format!(
      "Payment {} has neither a checkout session nor an order",
      payment.id
    ))
  })
}

/// Whether a provider report of `next` may replace `current`.
fn should_apply(current: PaymentStatus, next: PaymentStatus) -> bool {
  current.is_open() && next != current && !(current == PaymentStatus::Processing && next == PaymentStatus::Pending)
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePayment {
  pub checkout_session_id: Option<Uuid>,
  pub order_id: Option<Uuid>,
  pub provider: ProviderCode,
  pub phone_number: String,
}

impl InitiatePayment {
  pub fn target(&self) -> ShopResult<PaymentTarget> {
    match (self.checkout_session_id, self.order_id) {
      (Some(session_id), None) => Ok(PaymentTarget::CheckoutSession(session_id)),
      (None, Some(order_id)) => Ok(PaymentTarget::Order(order_id)),
      _ => Err(ShopError::Validation(
        "Provide exactly one of checkout_session_id or order_id".to_string(),
      )),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderInput {
  pub name: String,
  pub code: ProviderCode,
  pub api_base_url: String,
  pub api_key: String,
  pub api_secret: String,
  pub webhook_secret: String,
  #[serde(default = "default_active")]
  pub is_active: bool,
}

fn default_active() -> bool {
  true
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetail {
  #[serde(flatten)]
  pub payment: MobilePayment,
  pub notifications: Vec<PaymentNotification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
  pub payment_id: Uuid,
  pub status: PaymentStatus,
  /// False when the callback was recorded but did not change the payment.
  pub applied: bool,
}

#[derive(Clone)]
pub struct PaymentsService {
  store: DynStore,
  registry: ProviderRegistry,
  checkout: CheckoutService,
  orders: OrdersService,
  notifier: Notifier,
  max_retries: i32,
}

impl PaymentsService {
  pub fn new(
    store: DynStore,
    registry: ProviderRegistry,
    checkout: CheckoutService,
    orders: OrdersService,
    notifier: Notifier,
    max_retries: i32,
  ) -> Self {
    Self {
      store,
      registry,
      checkout,
      orders,
      notifier,
      max_retries,
    }
  }

  // --- providers ---

  pub async fn upsert_provider(&self, user: &User, input: ProviderInput) -> ShopResult<MobilePaymentProvider> {
    ensure_staff(user)?;
    if input.api_base_url.trim().is_empty() {
      return Err(ShopError::Validation("api_base_url is required".to_string()));
    }
    let existing = self.store.get_provider(input.code).await?;
    let provider = MobilePaymentProvider {
      id: existing.as_ref().map_or_else(Uuid::new_v4, |p| p.id),
      name: input.name,
      code: input.code,
      is_active: input.is_active,
      api_base_url: input.api_base_url.trim().to_string(),
      api_key: input.api_key,
      api_secret: input.api_secret,
      webhook_secret: input.webhook_secret,
      created_at: existing.map_or_else(Utc::now, |p| p.created_at),
    };
    self.store.upsert_provider(&provider).await?;
    info!(code = %provider.code, "Payment provider saved.");
    Ok(provider)
  }

  pub async fn list_providers(&self, user: &User) -> ShopResult<Vec<MobilePaymentProvider>> {
    ensure_staff(user)?;
    self.store.list_providers().await
  }

  async fn active_provider(&self, code: ProviderCode) -> ShopResult<MobilePaymentProvider> {
    self
      .store
      .get_provider(code)
      .await?
      .filter(|p| p.is_active)
      .ok_or_else(|| ShopError::Payment(format!("Provider {} is not available", code)))
  }

  // --- queries ---

  pub async fn list_payments(&self, user: &User) -> ShopResult<Vec<MobilePayment>> {
    let query = PaymentQuery {
      user_id: (!user.is_staff).then_some(user.id),
      ..PaymentQuery::default()
    };
    self.store.list_payments(&query).await
  }

  async fn load(&self, id: Uuid) -> ShopResult<MobilePayment> {
    self
      .store
      .get_payment(id)
      .await?
      .ok_or_else(|| ShopError::not_found("Payment", id))
  }

  async fn visible(&self, user: &User, id: Uuid) -> ShopResult<MobilePayment> {
    let payment = self.load(id).await?;
    if payment.user_id != user.id && !user.is_staff {
      return Err(ShopError::not_found("Payment", id));
    }
    Ok(payment)
  }

  pub async fn get_payment(&self, user: &User, id: Uuid) -> ShopResult<PaymentDetail> {
    let payment = self.visible(user, id).await?;
    let notifications = self.store.list_notifications(id).await?;
    Ok(PaymentDetail { payment, notifications })
  }

  // --- initiation ---

  /// Amount and display label of a payable target owned by `user`.
  async fn payable(&self, user: &User, target: PaymentTarget) -> ShopResult<(Decimal, Option<Order>)> {
    match target {
      PaymentTarget::CheckoutSession(id) => {
        let session = self.checkout.get_session(user, id).await?;
        if session.status != CheckoutStatus::PaymentPending {
          return Err(ShopError::InvalidState(format!(
            "Checkout session is {} and cannot be paid",
            session.status
          )));
        }
        Ok((session.total, None))
      }
      PaymentTarget::Order(id) => {
        let order = self
          .store
          .get_order(id)
          .await?
          .filter(|o| o.user_id == user.id)
          .ok_or_else(|| ShopError::not_found("Order", id))?;
        if order.payment_status == OrderPaymentStatus::Paid {
          return Err(ShopError::InvalidState("Order is already paid".to_string()));
        }
        if order.status.is_terminal() {
          return Err(ShopError::InvalidState(format!("Order is {}", order.status)));
        }
        Ok((order.total, Some(order)))
      }
    }
  }

  fn purpose(payment: &MobilePayment, order: Option<&Order>) -> String {
    match order {
      Some(order) => format!("order {}", order.order_number),
      None => format!("checkout {}", payment.provider_tx_ref),
    }
  }

  #[instrument(skip(self, user, input), fields(user_id = %user.id, provider = %input.provider))]
  pub async fn initiate(&self, user: &User, input: InitiatePayment) -> ShopResult<MobilePayment> {
    let target = input.target()?;
    let phone_number = normalize_phone(&input.phone_number)?;
    let config = self.active_provider(input.provider).await?;
    let (amount, order) = self.payable(user, target).await?;
    validate_amount(amount)?;

    let now = Utc::now();
    let (checkout_session_id, order_id) = match target {
      PaymentTarget::CheckoutSession(id) => (Some(id), None),
      PaymentTarget::Order(id) => (None, Some(id)),
    };
    let payment = MobilePayment {
      id: Uuid::new_v4(),
      user_id: user.id,
      checkout_session_id,
      order_id,
      provider_code: input.provider,
      amount,
      currency: CURRENCY.to_string(),
      phone_number,
      provider_tx_ref: new_transaction_reference(),
      provider_tx_id: None,
      status: PaymentStatus::Pending,
      retry_count: 0,
      created_at: now,
      updated_at: now,
      completed_at: None,
    };
    self.store.insert_payment(&payment).await?;
    info!(payment_id = %payment.id, tx_ref = %payment.provider_tx_ref, amount = %amount, "Payment created.");

    self
      .dispatch(payment, user, &config, order.as_ref(), NotificationType::Initiation)
      .await
  }

  /// Sends the collection request for a PENDING payment and applies the
  /// provider's answer. A provider error fails the payment.
  async fn dispatch(
    &self,
    payment: MobilePayment,
    user: &User,
    config: &MobilePaymentProvider,
    order: Option<&Order>,
    kind: NotificationType,
  ) -> ShopResult<MobilePayment> {
    let provider = self.registry.resolve(payment.provider_code)?;
    let request = CollectionRequest::for_payment(&payment, &Self::purpose(&payment, order), &user.full_name());

    match provider.initiate(config, &request).await {
      Ok(reply) => {
        let notification = PaymentNotification::new(&payment, kind, reply.raw_status.clone(), reply.payload.clone());
        self.store.insert_notification(&notification.processed()).await?;

        // A provider that already has a final answer skips PROCESSING.
        let next = if reply.status.is_terminal() {
          reply.status
        } else {
          PaymentStatus::Processing
        };
        let updated = self.apply_status(payment, next, reply.provider_tx_id).await?;
        self.notifier.payment_initiated(user, &updated, order).await;
        Ok(updated)
      }
      Err(e) => {
        error!(error = %e, payment_id = %payment.id, "Provider rejected the collection request.");
        let notification = PaymentNotification::new(&payment, kind, PaymentStatus::Failed.as_str(), json!({}))
          .failed(e.to_string());
        self.store.insert_notification(&notification).await?;
        self
          .store
          .transition_payment(payment.id, &OPEN, &PaymentChange::to(PaymentStatus::Failed))
          .await?;
        Err(e)
      }
    }
  }

  // --- status changes ---

  /// Compare-and-set `payment` to `next`, then settle or notify as needed.
  /// Terminal payments are returned unchanged.
  async fn apply_status(
    &self,
    payment: MobilePayment,
    next: PaymentStatus,
    provider_tx_id: Option<String>,
  ) -> ShopResult<MobilePayment> {
    if !should_apply(payment.status, next) {
      debug!(payment_id = %payment.id, current = %payment.status, reported = %next, "Status report not applied.");
      return Ok(payment);
    }
    let change = PaymentChange::to(next).with_tx_id(provider_tx_id);
    let updated = match self.store.transition_payment(payment.id, &OPEN, &change).await? {
      Some(updated) => updated,
      None => {
        debug!(payment_id = %payment.id, "Payment changed concurrently; keeping stored state.");
        return self.load(payment.id).await;
      }
    };
    info!(payment_id = %updated.id, from = %payment.status, to = %next, "Payment status updated.");

    let updated = if next == PaymentStatus::Successful {
      self.settle(updated).await?
    } else {
      updated
    };
    if next.is_terminal() {
      self.notify_status(&updated).await?;
    }
    Ok(updated)
  }

  /// Applies a successful payment to its target. Safe to repeat: completion
  /// of a session and marking an order paid are both idempotent.
  async fn settle(&self, payment: MobilePayment) -> ShopResult<MobilePayment> {
    match target_of(&payment)? {
      PaymentTarget::CheckoutSession(session_id) => {
        let order = self.checkout.complete(session_id, true).await?.into_order();
        if order.payment_status != OrderPaymentStatus::Paid {
          self.orders.mark_paid(order.id).await?;
        }
        if payment.order_id == Some(order.id) {
          return Ok(payment);
        }
        let link = PaymentChange {
          order_id: Some(order.id),
          ..PaymentChange::default()
        };
        let linked = self
          .store
          .transition_payment(payment.id, &[PaymentStatus::Successful], &link)
          .await?;
        Ok(linked.unwrap_or(payment))
      }
      PaymentTarget::Order(order_id) => {
        self.orders.mark_paid(order_id).await?;
        Ok(payment)
      }
    }
  }

  /// Successful session payments whose order was not linked yet.
  fn needs_settlement(payment: &MobilePayment) -> bool {
    payment.status == PaymentStatus::Successful && payment.checkout_session_id.is_some() && payment.order_id.is_none()
  }

  async fn notify_status(&self, payment: &MobilePayment) -> ShopResult<()> {
    if let Some(user) = self.store.get_user(payment.user_id).await? {
      let order = match payment.order_id {
        Some(id) => self.store.get_order(id).await?,
        None => None,
      };
      self.notifier.payment_status(&user, payment, order.as_ref()).await;
    }
    Ok(())
  }

  /// Polls the provider for an open payment and applies the answer.
  #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
  pub async fn poll(&self, payment: MobilePayment) -> ShopResult<MobilePayment> {
    if Self::needs_settlement(&payment) {
      return self.settle(payment).await;
    }
    if payment.status.is_terminal() {
      return Ok(payment);
    }
    let config = self.active_provider(payment.provider_code).await?;
    let provider = self.registry.resolve(payment.provider_code)?;
    let reply = provider.check_status(&config, &payment).await?;
    let notification = PaymentNotification::new(
      &payment,
      NotificationType::StatusUpdate,
      reply.raw_status.clone(),
      reply.payload.clone(),
    );
    self.store.insert_notification(&notification.processed()).await?;
    self.apply_status(payment, reply.status, reply.provider_tx_id).await
  }

  pub async fn check_status(&self, user: &User, id: Uuid) -> ShopResult<MobilePayment> {
    let payment = self.visible(user, id).await?;
    self.poll(payment).await
  }

  /// Verifies, records and applies a provider callback.
  #[instrument(skip(self, body, signature), fields(body_len = body.len()))]
  pub async fn handle_webhook(&self, provider: &str, body: &[u8], signature: Option<&str>) -> ShopResult<WebhookOutcome> {
    let code = ProviderCode::parse_loose(provider)
      .ok_or_else(|| ShopError::NotFound(format!("Unknown payment provider '{}'", provider)))?;
    let config = self
      .store
      .get_provider(code)
      .await?
      .ok_or_else(|| ShopError::NotFound(format!("Payment provider {} is not configured", code)))?;
    let adapter = self.registry.resolve(code)?;
    if !adapter.verify_webhook(&config, body, signature) {
      warn!(provider = %code, "Webhook signature verification failed.");
      return Err(ShopError::Auth("Invalid webhook signature".to_string()));
    }

    let event = adapter.parse_webhook(body)?;
    let payment = self
      .store
      .find_payment_by_ref(&event.transaction_ref)
      .await?
      .filter(|p| p.provider_code == code)
      .ok_or_else(|| ShopError::NotFound(format!("Payment {} not found", event.transaction_ref)))?;
    let notification =
      PaymentNotification::new(&payment, NotificationType::Webhook, event.raw_status.clone(), event.payload.clone());

    if payment.status.is_terminal() {
      let payment = if Self::needs_settlement(&payment) {
        self.settle(payment).await?
      } else {
        payment
      };
      info!(payment_id = %payment.id, status = %payment.status, "Webhook for a finished payment ignored.");
      let ignored = notification.failed(format!("Payment already {}; status not changed", payment.status));
      self.store.insert_notification(&ignored).await?;
      return Ok(WebhookOutcome {
        payment_id: payment.id,
        status: payment.status,
        applied: false,
      });
    }

    if let Some(amount) = event.amount.filter(|a| *a != payment.amount) {
      warn!(payment_id = %payment.id, reported = %amount, expected = %payment.amount, "Webhook amount mismatch.");
      let rejected = notification.failed(format!("Amount mismatch: expected {}, got {}", payment.amount, amount));
      self.store.insert_notification(&rejected).await?;
      return Ok(WebhookOutcome {
        payment_id: payment.id,
        status: payment.status,
        applied: false,
      });
    }

    let updated = match self
      .apply_status(payment, event.status, event.provider_reference.clone())
      .await
    {
      Ok(updated) => updated,
      Err(e) => {
        error!(error = %e, tx_ref = %event.transaction_ref, "Webhook could not be applied.");
        self.store.insert_notification(&notification.failed(e.to_string())).await?;
        return Err(e);
      }
    };
    self.store.insert_notification(&notification.processed()).await?;
    Ok(WebhookOutcome {
      payment_id: updated.id,
      status: updated.status,
      applied: true,
    })
  }

  // --- retries, reminders, sweeps ---

  /// Re-sends a FAILED payment to its provider, at most `max_retries` times.
  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn retry(&self, user: &User, id: Uuid) -> ShopResult<MobilePayment> {
    let payment = self.visible(user, id).await?;
    if payment.status != PaymentStatus::Failed {
      return Err(ShopError::InvalidState(format!(
        "Only failed payments can be retried (payment is {})",
        payment.status
      )));
    }
    if payment.retry_count >= self.max_retries {
      return Err(ShopError::Payment("Maximum retry attempts reached".to_string()));
    }
    let owner = self
      .store
      .get_user(payment.user_id)
      .await?
      .ok_or_else(|| ShopError::not_found("User", payment.user_id))?;
    let target = target_of(&payment)?;
    let (amount, order) = self.payable(&owner, target).await?;
    if amount != payment.amount {
      return Err(ShopError::InvalidState(
        "The amount due has changed; start a new payment".to_string(),
      ));
    }
    let open = self
      .store
      .list_payments(&PaymentQuery {
        user_id: Some(owner.id),
        statuses: OPEN.to_vec(),
        ..PaymentQuery::default()
      })
      .await?;
    if open.iter().any(|p| p.matches_target(target)) {
      return Err(ShopError::Conflict(
        "A payment is already in progress for this purchase".to_string(),
      ));
    }
    let config = self.active_provider(payment.provider_code).await?;

    let change = PaymentChange {
      status: Some(PaymentStatus::Pending),
      retry_below: Some(self.max_retries),
      ..PaymentChange::default()
    };
    let pending = self
      .store
      .transition_payment(id, &[PaymentStatus::Failed], &change)
      .await?
      .ok_or_else(|| ShopError::Conflict("Payment was retried by another request".to_string()))?;
    info!(payment_id = %id, attempt = pending.retry_count, "Retrying payment.");
    self
      .dispatch(pending, &owner, &config, order.as_ref(), NotificationType::Retry)
      .await
  }

  /// Reminds the customer of an open payment. Returns false for finished ones.
  pub async fn send_reminder(&self, payment: &MobilePayment) -> ShopResult<bool> {
    if !payment.status.is_open() {
      return Ok(false);
    }
    let user = self
      .store
      .get_user(payment.user_id)
      .await?
      .ok_or_else(|| ShopError::not_found("User", payment.user_id))?;
    let order = match payment.order_id {
      Some(id) => self.store.get_order(id).await?,
      None => None,
    };
    self.notifier.payment_reminder(&user, payment, order.as_ref()).await;
    let notification = PaymentNotification::new(
      payment,
      NotificationType::Reminder,
      payment.status.as_str(),
      json!({ "sent_at": Utc::now().to_rfc3339() }),
    );
    self.store.insert_notification(&notification.processed()).await?;
    Ok(true)
  }

  async fn open_payments(
    &self,
    created_after: Option<DateTime<Utc>>,
    created_before: Option<DateTime<Utc>>,
  ) -> ShopResult<Vec<MobilePayment>> {
    self
      .store
      .list_payments(&PaymentQuery {
        statuses: OPEN.to_vec(),
        created_after,
        created_before,
        ..PaymentQuery::default()
      })
      .await
  }

  /// Polls open payments created after `since`. Individual failures are
  /// logged and skipped.
  #[instrument(skip(self))]
  pub async fn poll_recent(&self, since: DateTime<Utc>, dry_run: bool) -> ShopResult<Vec<MobilePayment>> {
    let payments = self.open_payments(Some(since), None).await?;
    if dry_run {
      return Ok(payments);
    }
    let mut checked = Vec::with_capacity(payments.len());
    for payment in payments {
      let id = payment.id;
      match self.poll(payment).await {
        Ok(updated) => checked.push(updated),
        Err(e) => error!(payment_id = %id, error = %e, "Status check failed."),
      }
    }
    Ok(checked)
  }

  /// Cancels open payments created before `cutoff`.
  #[instrument(skip(self))]
  pub async fn cancel_stale(&self, cutoff: DateTime<Utc>, dry_run: bool) -> ShopResult<Vec<MobilePayment>> {
    let payments = self.open_payments(None, Some(cutoff)).await?;
    if dry_run {
      return Ok(payments);
    }
    let mut cancelled = Vec::new();
    for payment in payments {
      let change = PaymentChange::to(PaymentStatus::Cancelled);
      let Some(updated) = self.store.transition_payment(payment.id, &OPEN, &change).await? else {
        continue;
      };
      let notification = PaymentNotification::new(
        &updated,
        NotificationType::Cancellation,
        PaymentStatus::Cancelled.as_str(),
        json!({ "reason": "stale", "cutoff": cutoff.to_rfc3339() }),
      );
      self.store.insert_notification(&notification.processed()).await?;
      self.notify_status(&updated).await?;
      cancelled.push(updated);
    }
    info!(count = cancelled.len(), "Cancelled stale payments.");
    Ok(cancelled)
  }

  /// Sends reminders for open payments created before `cutoff`.
  #[instrument(skip(self))]
  pub async fn remind_pending(&self, cutoff: DateTime<Utc>, dry_run: bool) -> ShopResult<Vec<MobilePayment>> {
    let payments = self.open_payments(None, Some(cutoff)).await?;
    if dry_run {
      return Ok(payments);
    }
    let mut reminded = Vec::new();
    for payment in payments {
      match self.send_reminder(&payment).await {
        Ok(true) => reminded.push(payment),
        Ok(false) => {}
        Err(e) => error!(payment_id = %payment.id, error = %e, "Reminder failed."),
      }
    }
    Ok(reminded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn uganda_numbers() {
    assert_eq!(normalize_phone("0772 123 456").unwrap(), "0772123456");
    assert_eq!(normalize_phone("+256-781-234567").unwrap(), "256781234567");
    assert!(normalize_phone("0701234567").is_err());
    assert!(normalize_phone("25670123456").is_err());
    assert!(normalize_phone("256701234567").is_err());
    assert!(normalize_phone("").is_err());
  }

  #[test]
  fn amount_bounds_are_inclusive() {
    assert!(validate_amount(dec!(99.99)).is_err());
    assert!(validate_amount(dec!(100)).is_ok());
    assert!(validate_amount(dec!(5000000)).is_ok());
    assert!(validate_amount(dec!(5000000.01)).is_err());
  }

  #[test]
  fn terminal_statuses_never_move() {
    use PaymentStatus::*;
    assert!(should_apply(Pending, Processing));
    assert!(should_apply(Processing, Successful));
    assert!(!should_apply(Processing, Pending));
    assert!(!should_apply(Processing, Processing));
    for terminal in [Successful, Failed, Cancelled, Refunded] {
      for next in PaymentStatus::ALL {
        assert!(!should_apply(terminal, *next));
      }
    }
  }

  #[test]
  fn exactly_one_target() {
    let mut input = InitiatePayment {
      checkout_session_id: Some(Uuid::new_v4()),
      order_id: None,
      provider: ProviderCode::Mtn,
      phone_number: "0772123456".into(),
    };
    assert!(matches!(input.target(), Ok(PaymentTarget::CheckoutSession(_))));
    input.order_id = Some(Uuid::new_v4());
    assert!(input.target().is_err());
    input.checkout_session_id = None;
    assert!(matches!(input.target(), Ok(PaymentTarget::Order(_))));
  }

  #[test]
  fn untargeted_payment_is_an_internal_error() {
    let now = Utc::now();
    let payment = MobilePayment {
      id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      checkout_session_id: None,
      order_id: None,
      provider_code: ProviderCode::Airtel,
      amount: dec!(1000),
      currency: CURRENCY.to_string(),
      phone_number: "0752123456".into(),
      provider_tx_ref: new_transaction_reference(),
      provider_tx_id: None,
      status: PaymentStatus::Successful,
      retry_count: 0,
      created_at: now,
      updated_at: now,
      completed_at: Some(now),
    };
    assert!(matches!(target_of(&payment), Err(ShopError::Internal(_))));
  }
}
