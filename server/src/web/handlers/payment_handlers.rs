// server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use urbanherb::services::payments::InitiatePayment;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CheckStatusPayload {
  pub payment_id: Uuid,
}

#[instrument(name = "handler::list_payments", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_payments_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payments = app_state.services.payments.list_payments(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(payments))
}

#[instrument(name = "handler::get_payment", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn get_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payment_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let detail = app_state
    .services
    .payments
    .get_payment(&auth_user.user, payment_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(detail))
}

#[instrument(
  name = "handler::initiate_payment",
  skip(app_state, auth_user, req_payload),
  fields(user_id = %auth_user.user.id, provider = %req_payload.provider)
)]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<InitiatePayment>,
) -> Result<HttpResponse, AppError> {
  let payment = app_state
    .services
    .payments
    .initiate(&auth_user.user, req_payload.into_inner())
    .await?;
  info!(payment_id = %payment.id, status = %payment.status, "Payment initiated.");
  Ok(HttpResponse::Created().json(payment))
}

#[instrument(name = "handler::check_payment_status", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn check_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CheckStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let payment = app_state
    .services
    .payments
    .check_status(&auth_user.user, req_payload.payment_id)
    .await?;
  Ok(HttpResponse::Ok().json(payment))
}

#[instrument(name = "handler::retry_payment", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn retry_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payment_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let payment = app_state
    .services
    .payments
    .retry(&auth_user.user, payment_id.into_inner())
    .await?;
  info!(payment_id = %payment.id, retry_count = payment.retry_count, "Payment retried.");
  Ok(HttpResponse::Ok().json(payment))
}
