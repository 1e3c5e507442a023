// core/src/providers/mod.rs

//! Mobile-money provider adapters.
//!
//! A `PaymentProvider` speaks one provider's HTTP dialect. Credentials and the
//! base URL are not held by the adapter; they come from the stored
//! `MobilePaymentProvider` row on every call so that an operator can rotate
//! them without a restart.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ShopError, ShopResult};
use crate::models::{MobilePayment, MobilePaymentProvider, PaymentStatus, ProviderCode};

pub mod airtel;
pub mod mtn;
pub mod sandbox;
pub mod signature;

pub use airtel::AirtelProvider;
pub use mtn::MtnProvider;
pub use sandbox::SandboxProvider;

/// Translates a provider status word into a payment status. MTN and Airtel
/// vocabularies share one table; anything unrecognised counts as a failure.
pub fn map_provider_status(raw: &str) -> PaymentStatus {
  match raw.trim().to_ascii_uppercase().as_str() {
    "PENDING" | "INITIATED" => PaymentStatus::Pending,
    "PROCESSING" | "IN_PROGRESS" => PaymentStatus::Processing,
    "SUCCESSFUL" | "SUCCESS" => PaymentStatus::Successful,
    "CANCELLED" => PaymentStatus::Cancelled,
    "FAILED" | "FAILURE" | "TIMEOUT" => PaymentStatus::Failed,
    _ => PaymentStatus::Failed,
  }
}

/// A request to collect money from a subscriber's wallet.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
  pub reference: String,
  pub amount: Decimal,
  pub currency: String,
  pub phone_number: String,
  pub payer_message: String,
  pub payee_note: String,
}

impl CollectionRequest {
  pub fn for_payment(payment: &MobilePayment, purpose: &str, payer_name: &str) -> Self {
    Self {
      reference: payment.provider_tx_ref.clone(),
      amount: payment.amount,
      currency: payment.currency.clone(),
      phone_number: payment.phone_number.clone(),
      payer_message: format!("Payment for {}", purpose),
      payee_note: format!("Payment from {}", payer_name),
    }
  }
}

/// What a provider said about a transaction.
#[derive(Debug, Clone)]
pub struct ProviderReply {
  pub raw_status: String,
  pub status: PaymentStatus,
  pub provider_tx_id: Option<String>,
  pub payload: Value,
}

impl ProviderReply {
  pub fn new(raw_status: impl Into<String>, provider_tx_id: Option<String>, payload: Value) -> Self {
    let raw_status = raw_status.into();
    Self {
      status: map_provider_status(&raw_status),
      raw_status,
      provider_tx_id,
      payload,
    }
  }
}

/// A parsed provider callback.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
  pub transaction_ref: String,
  pub raw_status: String,
  pub status: PaymentStatus,
  pub amount: Option<Decimal>,
  pub provider_reference: Option<String>,
  pub phone_number: Option<String>,
  pub payload: Value,
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
  match payload.get(key)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Parses the common callback fields. `status_fallback` and `phone_key` name
/// the provider-specific fields consulted when the common ones are absent.
pub(crate) fn parse_webhook_payload(body: &[u8], status_fallback: &str, phone_key: &str) -> ShopResult<WebhookEvent> {
  let payload: Value =
    serde_json::from_slice(body).map_err(|e| ShopError::Validation(format!("Malformed webhook payload: {}", e)))?;
  let transaction_ref = string_field(&payload, "transaction_id")
    .ok_or_else(|| ShopError::Validation("Missing transaction ID in webhook payload".to_string()))?;
  let raw_status = string_field(&payload, "status")
    .or_else(|| string_field(&payload, status_fallback))
    .ok_or_else(|| ShopError::Validation("Missing status in webhook payload".to_string()))?;
  let amount = string_field(&payload, "amount").and_then(|a| a.parse::<Decimal>().ok());

  Ok(WebhookEvent {
    status: map_provider_status(&raw_status),
    transaction_ref,
    raw_status,
    amount,
    provider_reference: string_field(&payload, "provider_reference"),
    phone_number: string_field(&payload, phone_key),
    payload,
  })
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
  fn code(&self) -> ProviderCode;

  /// Asks the provider to start collecting `request.amount`.
  async fn initiate(&self, config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply>;

  /// Polls the provider for the current state of a transaction.
  async fn check_status(&self, config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply>;

  fn verify_webhook(&self, config: &MobilePaymentProvider, body: &[u8], signature: Option<&str>) -> bool {
    signature.is_some_and(|sig| signature::verify(&config.webhook_secret, body, sig))
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent>;
}

/// Settings for the built-in adapters.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
  pub sandbox: bool,
  pub http_timeout: Duration,
}

impl Default for ProviderSettings {
  fn default() -> Self {
    Self {
      sandbox: true,
      http_timeout: Duration::from_secs(15),
    }
  }
}

/// Maps provider codes to adapters.
#[derive(Clone)]
pub struct ProviderRegistry {
  providers: HashMap<ProviderCode, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
  pub fn new(settings: &ProviderSettings) -> ShopResult<Self> {
    let mut providers: HashMap<ProviderCode, Arc<dyn PaymentProvider>> = HashMap::new();
    if settings.sandbox {
      for code in ProviderCode::ALL {
        providers.insert(*code, Arc::new(SandboxProvider::new(*code)));
      }
    } else {
      let http = reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .map_err(|e| ShopError::Internal(format!("Failed to build provider HTTP client: {}", e)))?;
      providers.insert(ProviderCode::Mtn, Arc::new(MtnProvider::new(http.clone())));
      providers.insert(ProviderCode::Airtel, Arc::new(AirtelProvider::new(http)));
    }
    Ok(Self { providers })
  }

  /// Registry whose adapters all run in sandbox mode.
  pub fn sandbox() -> Self {
    let providers = ProviderCode::ALL
      .iter()
      .map(|code| (*code, Arc::new(SandboxProvider::new(*code)) as Arc<dyn PaymentProvider>))
      .collect();
    Self { providers }
  }

  /// Replaces the adapter registered for the provider's code.
  pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
    self.providers.insert(provider.code(), provider);
    self
  }

  pub fn resolve(&self, code: ProviderCode) -> ShopResult<Arc<dyn PaymentProvider>> {
    self
      .providers
      .get(&code)
      .cloned()
      .ok_or_else(|| ShopError::Payment(format!("Unsupported provider: {}", code)))
  }
}
