// server/src/web/handlers/analytics_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;

use urbanherb::models::DateRange;
use urbanherb::services::AnalyticsService;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::StaffUser;

/// Optional `?start=YYYY-MM-DD&end=YYYY-MM-DD`; the last 30 days otherwise.
#[derive(Deserialize, Debug, Default)]
pub struct RangeQuery {
  pub start: Option<NaiveDate>,
  pub end: Option<NaiveDate>,
}

impl RangeQuery {
  fn resolve(&self) -> Result<DateRange, AppError> {
    let default = AnalyticsService::default_range();
    Ok(DateRange::new(
      self.start.unwrap_or(default.start),
      self.end.unwrap_or(default.end),
    )?)
  }
}

#[derive(Deserialize, Debug)]
pub struct ReportPayload {
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
}

#[instrument(name = "handler::sales_metrics", skip(app_state, _staff))]
pub async fn sales_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  query: web::Query<RangeQuery>,
) -> Result<HttpResponse, AppError> {
  let rows = app_state.services.analytics.sales(query.resolve()?).await?;
  Ok(HttpResponse::Ok().json(rows))
}

#[instrument(name = "handler::inventory_metrics", skip(app_state, _staff))]
pub async fn inventory_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  query: web::Query<RangeQuery>,
) -> Result<HttpResponse, AppError> {
  let rows = app_state.services.analytics.inventory(query.resolve()?).await?;
  Ok(HttpResponse::Ok().json(rows))
}

#[instrument(name = "handler::customer_metrics", skip(app_state, _staff))]
pub async fn customers_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  query: web::Query<RangeQuery>,
) -> Result<HttpResponse, AppError> {
  let rows = app_state.services.analytics.customers(query.resolve()?).await?;
  Ok(HttpResponse::Ok().json(rows))
}

#[instrument(name = "handler::product_performance", skip(app_state, _staff))]
pub async fn products_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  query: web::Query<RangeQuery>,
) -> Result<HttpResponse, AppError> {
  let rows = app_state.services.analytics.products(query.resolve()?).await?;
  Ok(HttpResponse::Ok().json(rows))
}

#[instrument(name = "handler::analytics_summary", skip(app_state, _staff))]
pub async fn summary_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  query: web::Query<RangeQuery>,
) -> Result<HttpResponse, AppError> {
  let summary = app_state.services.analytics.summary(query.resolve()?).await?;
  Ok(HttpResponse::Ok().json(summary))
}

#[instrument(name = "handler::generate_report", skip(app_state, _staff))]
pub async fn generate_report_handler(
  app_state: web::Data<AppState>,
  _staff: StaffUser,
  payload: web::Json<ReportPayload>,
) -> Result<HttpResponse, AppError> {
  let range = DateRange::new(payload.start_date, payload.end_date)?;
  let report = app_state.services.analytics.report(range).await?;
  Ok(HttpResponse::Ok().json(report))
}
