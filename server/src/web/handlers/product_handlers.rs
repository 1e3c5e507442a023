// server/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::{debug, info, instrument};

use urbanherb::models::ProductFilter;
use urbanherb::services::catalog::ReviewInput;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

pub async fn list_categories_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let categories = app_state.services.catalog.list_categories().await?;
  Ok(HttpResponse::Ok().json(categories))
}

#[instrument(name = "handler::list_products", skip(app_state), fields(filter = ?filter))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  filter: web::Query<ProductFilter>,
) -> Result<HttpResponse, AppError> {
  let products = app_state.services.catalog.list_products(&filter).await?;
  debug!(count = products.len(), "Products listed.");
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(name = "handler::get_product", skip(app_state), fields(slug = %slug))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.services.catalog.get_product(&slug).await?;
  Ok(HttpResponse::Ok().json(product))
}

pub async fn list_reviews_handler(
  app_state: web::Data<AppState>,
  slug: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let reviews = app_state.services.catalog.list_reviews(&slug).await?;
  Ok(HttpResponse::Ok().json(reviews))
}

#[instrument(name = "handler::create_review", skip(app_state, auth_user, payload), fields(user_id = %auth_user.user.id, slug = %slug))]
pub async fn create_review_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  slug: web::Path<String>,
  payload: web::Json<ReviewInput>,
) -> Result<HttpResponse, AppError> {
  let review = app_state
    .services
    .catalog
    .create_review(&auth_user.user, &slug, payload.into_inner())
    .await?;
  info!(review_id = %review.id, "Review submitted.");
  Ok(HttpResponse::Created().json(review))
}
