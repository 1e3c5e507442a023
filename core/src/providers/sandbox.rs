// core/src/providers/sandbox.rs

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{parse_webhook_payload, CollectionRequest, PaymentProvider, ProviderReply, WebhookEvent};
use crate::error::ShopResult;
use crate::models::{MobilePayment, MobilePaymentProvider, PaymentStatus, ProviderCode};

/// Test-mode adapter: collections succeed immediately and every webhook
/// signature is accepted. No network traffic.
pub struct SandboxProvider {
  code: ProviderCode,
}

impl SandboxProvider {
  pub fn new(code: ProviderCode) -> Self {
    Self { code }
  }
}

#[async_trait]
impl PaymentProvider for SandboxProvider {
  fn code(&self) -> ProviderCode {
    self.code
  }

  async fn initiate(&self, _config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply> {
    info!(
      "Sandbox {} collection of {} {} from {}",
      self.code, request.amount, request.currency, request.phone_number
    );
    let tx_id = format!("SBX-{}", request.reference);
    Ok(ProviderReply::new(
      PaymentStatus::Successful.as_str(),
      Some(tx_id.clone()),
      json!({ "status": "SUCCESSFUL", "financialTransactionId": tx_id, "sandbox": true }),
    ))
  }

  async fn check_status(&self, _config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply> {
    Ok(ProviderReply::new(
      PaymentStatus::Successful.as_str(),
      payment.provider_tx_id.clone(),
      json!({ "status": "SUCCESSFUL", "sandbox": true }),
    ))
  }

  fn verify_webhook(&self, _config: &MobilePaymentProvider, _body: &[u8], _signature: Option<&str>) -> bool {
    true
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent> {
    match self.code {
      ProviderCode::Mtn => parse_webhook_payload(body, "payment_result", "phone_number"),
      ProviderCode::Airtel => parse_webhook_payload(body, "payment_status", "msisdn"),
    }
  }
}
