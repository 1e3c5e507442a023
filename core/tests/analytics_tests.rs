// tests/analytics_tests.rs
mod common;
use common::*;
use chrono::Utc;
use rust_decimal_macros::dec;
use serial_test::serial;

use urbanherb::models::{DateRange, MovementType, OrderStatus};
use urbanherb::services::catalog::StockMovementInput;
use urbanherb::services::AnalyticsService;

#[tokio::test]
#[serial]
async fn test_summary_reflects_completed_and_refunded_orders() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let orders = &shop.services.orders;

  let session = shop.confirmed_session(user).await;
  let order = shop.services.checkout.complete(session.id, true).await.unwrap().into_order();
  for status in [OrderStatus::Processing, OrderStatus::Completed] {
    orders.update_status(&shop.staff, order.id, status, None).await.unwrap();
  }

  let second = shop.confirmed_session(user).await;
  let refunded = shop.services.checkout.complete(second.id, true).await.unwrap().into_order();
  orders
    .update_status(&shop.staff, refunded.id, OrderStatus::Refunded, Some("Out of stock".into()))
    .await
    .unwrap();

  let analytics = &shop.services.analytics;
  let summary = analytics.summary(AnalyticsService::default_range()).await.unwrap();
  assert_eq!(summary.total_sales, dec!(25000));
  assert_eq!(summary.total_orders, 1);
  assert_eq!(summary.average_order_value, dec!(25000));
  assert_eq!(summary.total_refunds, dec!(25000));
  // The seeded staff member and customer.
  assert_eq!(summary.new_customers, 2);
  assert_eq!(summary.returning_customers, 1);
  assert_eq!(summary.top_products.len(), 1);
  assert_eq!(summary.top_products[0].product_id, shop.product.product.id);
  assert_eq!(summary.top_products[0].revenue, dec!(20000));
  assert_eq!(summary.top_products[0].purchase_count, 2);

  let inventory = analytics.inventory(AnalyticsService::default_range()).await.unwrap();
  assert_eq!(inventory.len(), 1);
  assert_eq!(inventory[0].units_sold, 2);
  assert_eq!(inventory[0].units_refunded, 2);
}

#[tokio::test]
#[serial]
async fn test_restock_and_low_stock_alerts() {
  let shop = seed_shop().await;
  let catalog = &shop.services.catalog;
  let id = shop.product.product.id;
  let input = |movement_type: MovementType, quantity: i32| StockMovementInput {
    movement_type,
    quantity,
    reference: None,
    notes: None,
  };
  catalog.record_stock_movement(id, input(MovementType::Out, 45)).await.unwrap();
  catalog.record_stock_movement(id, input(MovementType::In, 20)).await.unwrap();

  let rows = shop
    .services
    .analytics
    .inventory(AnalyticsService::default_range())
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  let row = &rows[0];
  assert_eq!(row.opening_stock, 50);
  assert_eq!(row.closing_stock, 25);
  assert_eq!(row.restock_amount, 20);
  assert_eq!(row.low_stock_alerts, 1);
}

#[tokio::test]
#[serial]
async fn test_report_respects_date_range() {
  let shop = seed_shop().await;
  shop.fill_cart(&shop.customer, 1).await;
  let analytics = &shop.services.analytics;

  let today = Utc::now().date_naive();
  let report = analytics.report(DateRange::new(today, today).unwrap()).await.unwrap();
  assert_eq!(report.customers.len(), 1);
  let added: i32 = report.products.iter().map(|p| p.add_to_cart_count).sum();
  assert_eq!(added, 1);

  let yesterday = today - chrono::Duration::days(1);
  let empty = analytics.report(DateRange::new(yesterday, yesterday).unwrap()).await.unwrap();
  assert!(empty.sales.is_empty());
  assert!(empty.products.is_empty());

  assert!(DateRange::new(today, yesterday).is_err());
}
