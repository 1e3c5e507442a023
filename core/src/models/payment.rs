// core/src/models/payment.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checkout::PaymentMethodProvider;

string_enum! {
  pub enum ProviderCode {
    Mtn => "MTN",
    Airtel => "AIRTEL",
  }
}

impl ProviderCode {
  /// Mobile-money provider behind a checkout payment method, if any.
  pub fn for_method(provider: PaymentMethodProvider) -> Option<ProviderCode> {
    match provider {
      PaymentMethodProvider::MtnMomo => Some(ProviderCode::Mtn),
      PaymentMethodProvider::AirtelMoney => Some(ProviderCode::Airtel),
      PaymentMethodProvider::Cash | PaymentMethodProvider::Card => None,
    }
  }

  /// Accepts path segments such as `mtn` or `AIRTEL`.
  pub fn parse_loose(text: &str) -> Option<ProviderCode> {
    text.trim().to_ascii_uppercase().parse().ok()
  }
}

/// Credentials and endpoint of one mobile-money provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilePaymentProvider {
  pub id: Uuid,
  pub name: String,
  pub code: ProviderCode,
  pub is_active: bool,
  pub api_base_url: String,
  #[serde(skip_serializing)]
  pub api_key: String,
  #[serde(skip_serializing)]
  pub api_secret: String,
  #[serde(skip_serializing)]
  pub webhook_secret: String,
  pub created_at: DateTime<Utc>,
}

string_enum! {
  pub enum PaymentStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Successful => "SUCCESSFUL",
    Failed => "FAILED",
    Cancelled => "CANCELLED",
    Refunded => "REFUNDED",
  }
}

impl PaymentStatus {
  pub fn is_open(&self) -> bool {
    matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
  }

  pub fn is_terminal(&self) -> bool {
    !self.is_open()
  }
}

/// What a payment collects money for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
  CheckoutSession(Uuid),
  Order(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobilePayment {
  pub id: Uuid,
  pub user_id: Uuid,
  pub checkout_session_id: Option<Uuid>,
  /// Set for order-targeted payments and once a session payment has produced its order.
  pub order_id: Option<Uuid>,
  pub provider_code: ProviderCode,
  pub amount: Decimal,
  pub currency: String,
  pub phone_number: String,
  pub provider_tx_ref: String,
  pub provider_tx_id: Option<String>,
  pub status: PaymentStatus,
  pub retry_count: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl MobilePayment {
  /// `None` for a malformed row that names neither a session nor an order.
  pub fn target(&self) -> Option<PaymentTarget> {
    match (self.checkout_session_id, self.order_id) {
      (Some(session_id), _) => Some(PaymentTarget::CheckoutSession(session_id)),
      (None, Some(order_id)) => Some(PaymentTarget::Order(order_id)),
      (None, None) => None,
    }
  }

  pub fn matches_target(&self, target: PaymentTarget) -> bool {
    match target {
      PaymentTarget::CheckoutSession(id) => self.checkout_session_id == Some(id),
      PaymentTarget::Order(id) => self.checkout_session_id.is_none() && self.order_id == Some(id),
    }
  }
}

/// `MP-` followed by twelve uppercase hex digits.
pub fn new_transaction_reference() -> String {
  let hex = Uuid::new_v4().simple().to_string();
  format!("MP-{}", hex[..12].to_ascii_uppercase())
}

string_enum! {
  pub enum NotificationType {
    Initiation => "INITIATION",
    StatusUpdate => "STATUS_UPDATE",
    Webhook => "WEBHOOK",
    Retry => "RETRY",
    Reminder => "REMINDER",
    Cancellation => "CANCELLATION",
  }
}

/// Audit record of every provider interaction for a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
  pub id: Uuid,
  pub payment_id: Uuid,
  pub provider_code: ProviderCode,
  pub notification_type: NotificationType,
  pub status: String,
  pub raw_payload: serde_json::Value,
  pub is_processed: bool,
  pub processing_errors: Option<String>,
  pub received_at: DateTime<Utc>,
  pub processed_at: Option<DateTime<Utc>>,
}

impl PaymentNotification {
  pub fn new(
    payment: &MobilePayment,
    notification_type: NotificationType,
    status: impl Into<String>,
    raw_payload: serde_json::Value,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      payment_id: payment.id,
      provider_code: payment.provider_code,
      notification_type,
      status: status.into(),
      raw_payload,
      is_processed: false,
      processing_errors: None,
      received_at: Utc::now(),
      processed_at: None,
    }
  }

  pub fn processed(mut self) -> Self {
    self.is_processed = true;
    self.processed_at = Some(Utc::now());
    self
  }

  pub fn failed(mut self, error: impl Into<String>) -> Self {
    self.processing_errors = Some(error.into());
    self.processed_at = Some(Utc::now());
    self
  }
}
