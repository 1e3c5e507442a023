// core/src/providers/mtn.rs

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{parse_webhook_payload, CollectionRequest, PaymentProvider, ProviderReply, WebhookEvent};
use crate::error::{ShopError, ShopResult};
use crate::models::{MobilePayment, MobilePaymentProvider, ProviderCode};

const TARGET_ENVIRONMENT: &str = "sandbox";

/// MTN MoMo collection API (`requesttopay`).
pub struct MtnProvider {
  http: reqwest::Client,
}

impl MtnProvider {
  pub fn new(http: reqwest::Client) -> Self {
    Self { http }
  }

  fn base(config: &MobilePaymentProvider) -> &str {
    config.api_base_url.trim_end_matches('/')
  }
}

async fn read_json(response: reqwest::Response) -> ShopResult<Value> {
  let status = response.status();
  let text = response
    .text()
    .await
    .map_err(|e| ShopError::provider(ProviderCode::Mtn.as_str(), e))?;
  if !status.is_success() {
    warn!(http_status = %status, "MTN API returned an error response.");
    return Err(ShopError::provider(
      ProviderCode::Mtn.as_str(),
      anyhow::anyhow!("MTN API error ({}): {}", status, text),
    ));
  }
  // 202 Accepted carries no body.
  if text.trim().is_empty() {
    return Ok(Value::Null);
  }
  serde_json::from_str(&text).map_err(|e| ShopError::provider(ProviderCode::Mtn.as_str(), e))
}

#[async_trait]
impl PaymentProvider for MtnProvider {
  fn code(&self) -> ProviderCode {
    ProviderCode::Mtn
  }

  #[instrument(name = "mtn::initiate", skip(self, config, request), fields(reference = %request.reference))]
  async fn initiate(&self, config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply> {
    let body = json!({
      "amount": request.amount.to_string(),
      "currency": request.currency,
      "externalId": request.reference,
      "payer": { "partyIdType": "MSISDN", "partyId": request.phone_number },
      "payerMessage": request.payer_message,
      "payeeNote": request.payee_note,
    });
    let response = self
      .http
      .post(format!("{}/collection/v1_0/requesttopay", Self::base(config)))
      .bearer_auth(&config.api_key)
      .header("X-Reference-Id", &request.reference)
      .header("X-Target-Environment", TARGET_ENVIRONMENT)
      .json(&body)
      .send()
      .await
      .map_err(|e| ShopError::provider(self.code().as_str(), e))?;
    let payload = read_json(response).await?;
    debug!(?payload, "MTN accepted the collection request.");

    let raw_status = payload
      .get("status")
      .and_then(Value::as_str)
      .unwrap_or("PENDING")
      .to_string();
    let tx_id = payload
      .get("financialTransactionId")
      .and_then(Value::as_str)
      .map(String::from);
    Ok(ProviderReply::new(raw_status, tx_id, payload))
  }

  #[instrument(name = "mtn::check_status", skip(self, config, payment), fields(reference = %payment.provider_tx_ref))]
  async fn check_status(&self, config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply> {
    let response = self
      .http
      .get(format!(
        "{}/collection/v1_0/requesttopay/{}",
        Self::base(config),
        payment.provider_tx_ref
      ))
      .bearer_auth(&config.api_key)
      .header("X-Target-Environment", TARGET_ENVIRONMENT)
      .send()
      .await
      .map_err(|e| ShopError::provider(self.code().as_str(), e))?;
    let payload = read_json(response).await?;
    let raw_status = payload
      .get("status")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    let tx_id = payload
      .get("financialTransactionId")
      .and_then(Value::as_str)
      .map(String::from);
    Ok(ProviderReply::new(raw_status, tx_id, payload))
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent> {
    parse_webhook_payload(body, "payment_result", "phone_number")
  }
}
