// core/src/providers/airtel.rs

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use super::{parse_webhook_payload, CollectionRequest, PaymentProvider, ProviderReply, WebhookEvent};
use crate::error::{ShopError, ShopResult};
use crate::models::{MobilePayment, MobilePaymentProvider, ProviderCode};

const COUNTRY: &str = "UG";

/// Airtel Money merchant payments API.
pub struct AirtelProvider {
  http: reqwest::Client,
}

impl AirtelProvider {
  pub fn new(http: reqwest::Client) -> Self {
    Self { http }
  }

  fn base(config: &MobilePaymentProvider) -> &str {
    config.api_base_url.trim_end_matches('/')
  }

  async fn send(&self, request: reqwest::RequestBuilder) -> ShopResult<Value> {
    let response = request
      .send()
      .await
      .map_err(|e| ShopError::provider(self.code().as_str(), e))?;
    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      warn!(http_status = %status, "Airtel API returned an error response.");
      return Err(ShopError::provider(
        self.code().as_str(),
        anyhow::anyhow!("Airtel API error ({}): {}", status, text),
      ));
    }
    response
      .json::<Value>()
      .await
      .map_err(|e| ShopError::provider(self.code().as_str(), e))
  }
}

/// Airtel nests the transaction under `data.transaction`.
fn transaction_fields(payload: &Value) -> (Option<String>, Option<String>) {
  let transaction = payload.pointer("/data/transaction").unwrap_or(&Value::Null);
  let status = transaction
    .get("status")
    .or_else(|| payload.get("status").filter(|s| s.is_string()))
    .and_then(Value::as_str)
    .map(String::from);
  let id = transaction
    .get("airtel_money_id")
    .or_else(|| transaction.get("id"))
    .and_then(Value::as_str)
    .map(String::from);
  (status, id)
}

#[async_trait]
impl PaymentProvider for AirtelProvider {
  fn code(&self) -> ProviderCode {
    ProviderCode::Airtel
  }

  #[instrument(name = "airtel::initiate", skip(self, config, request), fields(reference = %request.reference))]
  async fn initiate(&self, config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply> {
    let body = json!({
      "reference": request.reference,
      "subscriber": { "country": COUNTRY, "currency": request.currency, "msisdn": request.phone_number },
      "transaction": {
        "amount": request.amount.to_string(),
        "country": COUNTRY,
        "currency": request.currency,
        "id": request.reference,
      },
    });
    let payload = self
      .send(
        self
          .http
          .post(format!("{}/merchant/v1/payments/", Self::base(config)))
          .bearer_auth(&config.api_key)
          .json(&body),
      )
      .await?;
    let (status, tx_id) = transaction_fields(&payload);
    // An accepted push without a status is still in flight.
    Ok(ProviderReply::new(status.unwrap_or_else(|| "IN_PROGRESS".to_string()), tx_id, payload))
  }

  #[instrument(name = "airtel::check_status", skip(self, config, payment), fields(reference = %payment.provider_tx_ref))]
  async fn check_status(&self, config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply> {
    let payload = self
      .send(
        self
          .http
          .get(format!(
            "{}/standard/v1/payments/{}",
            Self::base(config),
            payment.provider_tx_ref
          ))
          .bearer_auth(&config.api_key),
      )
      .await?;
    let (status, tx_id) = transaction_fields(&payload);
    Ok(ProviderReply::new(status.unwrap_or_default(), tx_id, payload))
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent> {
    parse_webhook_payload(body, "payment_status", "msisdn")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_nested_transaction() {
    let payload = json!({
      "data": { "transaction": { "id": "MP-1", "status": "SUCCESS", "airtel_money_id": "AM-77" } },
      "status": { "code": "200", "success": true }
    });
    let (status, id) = transaction_fields(&payload);
    assert_eq!(status.as_deref(), Some("SUCCESS"));
    assert_eq!(id.as_deref(), Some("AM-77"));
  }

  #[test]
  fn ignores_non_string_top_level_status() {
    let payload = json!({ "status": { "code": "200" } });
    assert_eq!(transaction_fields(&payload), (None, None));
  }
}
