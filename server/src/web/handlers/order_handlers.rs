// server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use urbanherb::models::OrderStatus;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct AddNotePayload {
  pub note: String,
  #[serde(default)]
  pub is_public: bool,
}

#[derive(Deserialize, Debug)]
pub struct UpdateStatusPayload {
  pub status: OrderStatus,
  pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateTrackingPayload {
  pub tracking_number: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct CancelPayload {
  pub reason: Option<String>,
}

/// Customers see their own orders; staff see every order.
#[instrument(name = "handler::list_orders", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = &app_state.services.orders;
  let list = if auth_user.user.is_staff {
    orders.list_all_orders(&auth_user.user).await?
  } else {
    orders.list_orders(&auth_user.user).await?
  };
  Ok(HttpResponse::Ok().json(list))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.user.id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let detail = app_state
    .services
    .orders
    .get_order(&auth_user.user, order_id.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(detail))
}

#[instrument(name = "handler::add_order_note", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user.id))]
pub async fn add_note_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<AddNotePayload>,
) -> Result<HttpResponse, AppError> {
  let note = app_state
    .services
    .orders
    .add_note(&auth_user.user, order_id.into_inner(), &payload.note, payload.is_public)
    .await?;
  Ok(HttpResponse::Created().json(note))
}

#[instrument(
  name = "handler::update_order_status",
  skip(app_state, auth_user, payload),
  fields(user_id = %auth_user.user.id, status = %payload.status)
)]
pub async fn update_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<UpdateStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let UpdateStatusPayload { status, notes } = payload.into_inner();
  let order = app_state
    .services
    .orders
    .update_status(&auth_user.user, order_id.into_inner(), status, notes)
    .await?;
  info!(order_number = %order.order_number, "Order status updated.");
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::update_tracking", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user.id))]
pub async fn update_tracking_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: web::Json<UpdateTrackingPayload>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .services
    .orders
    .update_tracking(&auth_user.user, order_id.into_inner(), &payload.tracking_number)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user.id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  order_id: web::Path<Uuid>,
  payload: Option<web::Json<CancelPayload>>,
) -> Result<HttpResponse, AppError> {
  let reason = payload.and_then(|p| p.into_inner().reason);
  let order = app_state
    .services
    .orders
    .cancel(&auth_user.user, order_id.into_inner(), reason)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}
