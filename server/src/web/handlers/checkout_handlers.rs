// server/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use urbanherb::services::checkout::NewCheckoutSession;
use urbanherb::ShopError;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

// --- Options ---

pub async fn list_delivery_zones_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let zones = app_state.services.checkout.list_delivery_zones().await?;
  Ok(HttpResponse::Ok().json(zones))
}

pub async fn list_pickup_locations_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let locations = app_state.services.checkout.list_pickup_locations().await?;
  Ok(HttpResponse::Ok().json(locations))
}

pub async fn list_payment_methods_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let methods = app_state.services.checkout.list_payment_methods().await?;
  Ok(HttpResponse::Ok().json(methods))
}

// --- Sessions ---

#[instrument(name = "handler::list_checkout_sessions", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_sessions_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let sessions = app_state.services.checkout.list_sessions(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(sessions))
}

#[instrument(
  name = "handler::start_checkout",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user.id, delivery_type = %req_payload.delivery_type)
)]
pub async fn create_session_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewCheckoutSession>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .services
    .checkout
    .create_session(&auth_user.user, req_payload.into_inner())
    .await?;
  info!(session_id = %session.id, total = %session.total, "Checkout session started.");
  Ok(HttpResponse::Created().json(session))
}

#[instrument(name = "handler::get_checkout_session", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn get_session_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  session_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .services
    .checkout
    .get_session(&auth_user.user, session_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(session))
}

pub async fn session_items_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  session_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let items = app_state
    .services
    .checkout
    .session_items(&auth_user.user, session_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(items))
}

/// A rejected confirmation reports the session's resulting status, so a
/// client can tell an expired session from one that was already confirmed.
#[instrument(name = "handler::confirm_checkout", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn confirm_session_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  session_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let id = session_id.into_inner();
  let checkout = &app_state.services.checkout;
  match checkout.confirm(&auth_user.user, id).await {
    Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
    Err(ShopError::InvalidState(message)) => {
      let session = checkout.get_session(&auth_user.user, id).await?;
      warn!(session_id = %id, status = %session.status, "Checkout confirmation rejected: {}", message);
      Ok(HttpResponse::BadRequest().json(json!({
        "error": message,
        "status": session.status,
      })))
    }
    Err(other) => Err(other.into()),
  }
}

#[instrument(name = "handler::cancel_checkout", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn cancel_session_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  session_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .services
    .checkout
    .cancel(&auth_user.user, session_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(session))
}

#[instrument(name = "handler::calculate_total", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn calculate_total_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  session_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .services
    .checkout
    .calculate_total(&auth_user.user, session_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(session))
}
