// server/src/web/handlers/admin_handlers.rs

//! Staff data entry: catalog, checkout options and payment providers.

use actix_web::{web, HttpResponse};
use tracing::{info, instrument};
use uuid::Uuid;

use urbanherb::services::catalog::{ImageInput, NewCategory, ProductInput, StockMovementInput};
use urbanherb::services::checkout::{NewDeliveryZone, NewPaymentMethod, NewPickupLocation};
use urbanherb::services::payments::ProviderInput;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::StaffUser;

#[instrument(name = "handler::create_category", skip(app_state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn create_category_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<NewCategory>,
) -> Result<HttpResponse, AppError> {
  let category = app_state.services.catalog.create_category(payload.into_inner()).await?;
  Ok(HttpResponse::Created().json(category))
}

#[instrument(name = "handler::create_product", skip(app_state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.services.catalog.create_product(payload.into_inner()).await?;
  info!(product_id = %product.product.id, "Product created.");
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::update_product", skip(app_state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  product_id: web::Path<Uuid>,
  payload: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
  let product = app_state
    .services
    .catalog
    .update_product(product_id.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::record_stock", skip(app_state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn record_stock_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  product_id: web::Path<Uuid>,
  payload: web::Json<StockMovementInput>,
) -> Result<HttpResponse, AppError> {
  let inventory = app_state
    .services
    .catalog
    .record_stock_movement(product_id.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(inventory))
}

#[instrument(name = "handler::add_product_image", skip(app_state, staff, payload), fields(staff_id = %staff.0.id))]
pub async fn add_product_image_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  product_id: web::Path<Uuid>,
  payload: web::Json<ImageInput>,
) -> Result<HttpResponse, AppError> {
  let image = app_state
    .services
    .catalog
    .add_product_image(product_id.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(image))
}

pub async fn create_delivery_zone_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<NewDeliveryZone>,
) -> Result<HttpResponse, AppError> {
  let zone = app_state
    .services
    .checkout
    .create_delivery_zone(&staff.0, payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(zone))
}

pub async fn create_pickup_location_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<NewPickupLocation>,
) -> Result<HttpResponse, AppError> {
  let location = app_state
    .services
    .checkout
    .create_pickup_location(&staff.0, payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(location))
}

pub async fn create_payment_method_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<NewPaymentMethod>,
) -> Result<HttpResponse, AppError> {
  let method = app_state
    .services
    .checkout
    .create_payment_method(&staff.0, payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(method))
}

pub async fn list_providers_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
) -> Result<HttpResponse, AppError> {
  let providers = app_state.services.payments.list_providers(&staff.0).await?;
  Ok(HttpResponse::Ok().json(providers))
}

#[instrument(name = "handler::upsert_provider", skip(app_state, staff, payload), fields(code = %payload.code))]
pub async fn upsert_provider_handler(
  app_state: web::Data<AppState>,
  staff: StaffUser,
  payload: web::Json<ProviderInput>,
) -> Result<HttpResponse, AppError> {
  let provider = app_state
    .services
    .payments
    .upsert_provider(&staff.0, payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(provider))
}
