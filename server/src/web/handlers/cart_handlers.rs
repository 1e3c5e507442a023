// server/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

fn one() -> i32 {
  1
}

// --- Request DTOs ---
#[derive(Deserialize, Debug)]
pub struct AddItemPayload {
  pub product_id: Uuid,
  #[serde(default = "one")]
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct UpdateItemPayload {
  pub item_id: Uuid,
  pub quantity: i32,
}

#[derive(Deserialize, Debug)]
pub struct RemoveItemPayload {
  pub item_id: Uuid,
}

#[instrument(name = "handler::get_cart", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn get_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state.services.cart.get_cart(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user.id, product_id = %req_payload.product_id, quantity = %req_payload.quantity)
)]
pub async fn add_item_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<AddItemPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state
    .services
    .cart
    .add_item(&auth_user.user, req_payload.product_id, req_payload.quantity)
    .await?;
  info!(total_items = cart.total_items, "Item added to cart.");
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(
  name = "handler::update_cart_item",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user.id, item_id = %req_payload.item_id)
)]
pub async fn update_item_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<UpdateItemPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state
    .services
    .cart
    .update_item(&auth_user.user, req_payload.item_id, req_payload.quantity)
    .await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(
  name = "handler::remove_cart_item",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user.id, item_id = %req_payload.item_id)
)]
pub async fn remove_item_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RemoveItemPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state
    .services
    .cart
    .remove_item(&auth_user.user, req_payload.item_id)
    .await?;
  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::clear_cart", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn clear_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let cart = app_state.services.cart.clear(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(cart))
}
