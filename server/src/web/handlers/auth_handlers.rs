// server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use urbanherb::services::accounts::{AddressInput, DefaultAddresses, PasswordChange, PreferenceInput, Registration};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct LoginRequestPayload {
  pub email: String,
  pub password: String,
}

#[instrument(name = "handler::register", skip(app_state, payload), fields(email = %payload.email))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<Registration>,
) -> Result<HttpResponse, AppError> {
  let user = app_state.services.accounts.register(payload.into_inner()).await?;
  info!(user_id = %user.id, "User registered.");
  Ok(HttpResponse::Created().json(json!({
    "message": "User registered successfully",
    "user": user,
  })))
}

#[instrument(name = "handler::login", skip(app_state, payload), fields(email = %payload.email))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<LoginRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let result = app_state
    .services
    .accounts
    .login(&payload.email, &payload.password)
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Login successful",
    "token": result.token.token,
    "expires_at": result.token.expires_at,
    "user": result.user,
  })))
}

#[instrument(name = "handler::logout", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn logout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  app_state.services.accounts.logout(&auth_user.token).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Logout successful" })))
}

pub async fn me_handler(auth_user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(auth_user.user))
}

#[instrument(name = "handler::change_password", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn change_password_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<PasswordChange>,
) -> Result<HttpResponse, AppError> {
  app_state
    .services
    .accounts
    .change_password(&auth_user.user, payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Password updated successfully" })))
}

// --- Addresses ---

#[instrument(name = "handler::list_addresses", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn list_addresses_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let addresses = app_state.services.accounts.list_addresses(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(addresses))
}

#[instrument(name = "handler::create_address", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn create_address_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<AddressInput>,
) -> Result<HttpResponse, AppError> {
  let address = app_state
    .services
    .accounts
    .create_address(&auth_user.user, payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(address))
}

#[instrument(name = "handler::update_address", skip_all, fields(user_id = %auth_user.user.id, address_id = %path))]
pub async fn update_address_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<AddressInput>,
) -> Result<HttpResponse, AppError> {
  let address = app_state
    .services
    .accounts
    .update_address(&auth_user.user, path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(address))
}

#[instrument(name = "handler::delete_address", skip_all, fields(user_id = %auth_user.user.id, address_id = %path))]
pub async fn delete_address_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state
    .services
    .accounts
    .delete_address(&auth_user.user, path.into_inner())
    .await?;
  Ok(HttpResponse::NoContent().finish())
}

// --- Preferences ---

#[derive(Deserialize, Debug)]
pub struct ProductRefPayload {
  pub product_id: Uuid,
}

#[instrument(name = "handler::get_preferences", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn get_preferences_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state.services.accounts.preferences(&auth_user.user).await?;
  Ok(HttpResponse::Ok().json(preferences))
}

#[instrument(name = "handler::update_preferences", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn update_preferences_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<PreferenceInput>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .update_preferences(&auth_user.user, payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}

#[instrument(name = "handler::update_default_addresses", skip_all, fields(user_id = %auth_user.user.id))]
pub async fn update_default_addresses_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<DefaultAddresses>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .update_default_addresses(&auth_user.user, payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}

#[instrument(name = "handler::add_to_wishlist", skip_all, fields(user_id = %auth_user.user.id, product_id = %payload.product_id))]
pub async fn add_to_wishlist_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<ProductRefPayload>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .add_to_wishlist(&auth_user.user, payload.product_id)
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}

#[instrument(name = "handler::remove_from_wishlist", skip_all, fields(user_id = %auth_user.user.id, product_id = %payload.product_id))]
pub async fn remove_from_wishlist_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<ProductRefPayload>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .remove_from_wishlist(&auth_user.user, payload.product_id)
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}

pub async fn add_to_saved_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<ProductRefPayload>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .add_to_saved(&auth_user.user, payload.product_id)
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}

pub async fn remove_from_saved_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<ProductRefPayload>,
) -> Result<HttpResponse, AppError> {
  let preferences = app_state
    .services
    .accounts
    .remove_from_saved(&auth_user.user, payload.product_id)
    .await?;
  Ok(HttpResponse::Ok().json(preferences))
}
