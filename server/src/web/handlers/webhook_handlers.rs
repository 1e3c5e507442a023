// server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{info, instrument};

use urbanherb::providers::signature::SIGNATURE_HEADER;

use crate::errors::AppError;
use crate::state::AppState;

/// Provider callback. The raw body is passed through untouched because the
/// signature covers its exact bytes.
#[instrument(
  name = "handler::payment_webhook",
  skip(app_state, req, body),
  fields(provider = %provider, payload_size = body.len())
)]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  provider: web::Path<String>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok());

  let outcome = app_state
    .services
    .payments
    .handle_webhook(&provider, &body, signature)
    .await?;
  info!(
    payment_id = %outcome.payment_id,
    status = %outcome.status,
    applied = outcome.applied,
    "Webhook processed."
  );
  Ok(HttpResponse::Ok().json(outcome))
}
