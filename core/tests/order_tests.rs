// tests/order_tests.rs
mod common;
use common::*;
use rust_decimal_macros::dec;
use serial_test::serial;

use urbanherb::models::{Order, OrderPaymentStatus, OrderStatus, User};
use urbanherb::services::analytics::AnalyticsService;
use urbanherb::ShopError;

async fn paid_order(shop: &TestShop, user: &User) -> Order {
  let session = shop.confirmed_session(user).await;
  shop
    .services
    .checkout
    .complete(session.id, true)
    .await
    .unwrap()
    .into_order()
}

async fn cash_order(shop: &TestShop, user: &User) -> Order {
  shop.fill_cart(user, 1).await;
  let checkout = &shop.services.checkout;
  let session = checkout
    .create_session(user, shop.delivery_request(shop.cash_method.id))
    .await
    .unwrap();
  checkout.confirm(user, session.id).await.unwrap().order.unwrap()
}

#[tokio::test]
#[serial]
async fn test_order_numbers_are_dated_and_sequential() {
  let shop = seed_shop().await;
  let first = paid_order(&shop, &shop.customer).await;
  let other = register(&shop.services, "kato@example.com").await;
  let second = paid_order(&shop, &other).await;

  let today = chrono::Utc::now().format("%Y%m%d").to_string();
  assert_eq!(first.order_number, format!("{}-0001", today));
  assert_eq!(second.order_number, format!("{}-0002", today));
}

#[tokio::test]
#[serial]
async fn test_staff_walks_order_through_fulfilment() {
  let shop = seed_shop().await;
  let order = paid_order(&shop, &shop.customer).await;
  let orders = &shop.services.orders;
  let staff = &shop.staff;

  let processing = orders
    .update_status(staff, order.id, OrderStatus::Processing, Some("Packing".into()))
    .await
    .unwrap();
  assert!(processing.processed_at.is_some());
  orders
    .update_status(staff, order.id, OrderStatus::OutForDelivery, None)
    .await
    .unwrap();
  orders
    .update_status(staff, order.id, OrderStatus::Delivered, None)
    .await
    .unwrap();
  let completed = orders
    .update_status(staff, order.id, OrderStatus::Completed, None)
    .await
    .unwrap();
  assert!(completed.completed_at.is_some());

  let detail = orders.get_order(&shop.customer, order.id).await.unwrap();
  let statuses: Vec<_> = detail.status_history.iter().map(|h| h.status).collect();
  assert_eq!(
    statuses,
    vec![
      OrderStatus::Paid,
      OrderStatus::Processing,
      OrderStatus::OutForDelivery,
      OrderStatus::Delivered,
      OrderStatus::Completed
    ]
  );

  let sales = shop
    .services
    .analytics
    .sales(AnalyticsService::default_range())
    .await
    .unwrap();
  let total: rust_decimal::Decimal = sales.iter().map(|s| s.total_sales).sum();
  assert_eq!(total, dec!(25000));
}

#[tokio::test]
#[serial]
async fn test_invalid_transitions_are_rejected() {
  let shop = seed_shop().await;
  let order = paid_order(&shop, &shop.customer).await;
  let orders = &shop.services.orders;

  let err = orders
    .update_status(&shop.staff, order.id, OrderStatus::Delivered, None)
    .await
    .unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)), "got {:?}", err);

  let err = orders
    .update_status(&shop.customer, order.id, OrderStatus::Processing, None)
    .await
    .unwrap_err();
  assert!(matches!(err, ShopError::Forbidden(_)));
}

#[tokio::test]
#[serial]
async fn test_customer_cancels_pending_order_with_reason() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let order = cash_order(&shop, user).await;
  let orders = &shop.services.orders;

  let cancelled = orders
    .cancel(user, order.id, Some("Changed my mind".into()))
    .await
    .unwrap();
  assert_eq!(cancelled.status, OrderStatus::Cancelled);
  assert!(cancelled.cancelled_at.is_some());

  let detail = orders.get_order(user, order.id).await.unwrap();
  assert!(detail.notes.iter().any(|n| n.note.contains("Changed my mind")));

  let err = orders.cancel(user, order.id, None).await.unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)));
}

#[tokio::test]
#[serial]
async fn test_paid_order_cannot_be_cancelled_by_customer() {
  let shop = seed_shop().await;
  let order = paid_order(&shop, &shop.customer).await;
  let err = shop
    .services
    .orders
    .cancel(&shop.customer, order.id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)));
}

#[tokio::test]
#[serial]
async fn test_private_notes_are_staff_only() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let order = paid_order(&shop, user).await;
  let orders = &shop.services.orders;

  orders.add_note(&shop.staff, order.id, "Fragile, pack well", false).await.unwrap();
  let own = orders.add_note(user, order.id, "Please call on arrival", false).await.unwrap();
  assert!(own.is_public);

  let customer_view = orders.get_order(user, order.id).await.unwrap();
  assert_eq!(customer_view.notes.len(), 1);
  let staff_view = orders.get_order(&shop.staff, order.id).await.unwrap();
  assert_eq!(staff_view.notes.len(), 2);

  let err = orders.add_note(user, order.id, "  ", true).await.unwrap_err();
  assert!(matches!(err, ShopError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn test_orders_are_private_and_listed_newest_first() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let first = paid_order(&shop, user).await;
  let second = cash_order(&shop, user).await;
  let orders = &shop.services.orders;

  let listed = orders.list_orders(user).await.unwrap();
  assert_eq!(listed.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id, first.id]);

  let stranger = register(&shop.services, "stranger@example.com").await;
  assert!(matches!(
    orders.get_order(&stranger, first.id).await,
    Err(ShopError::NotFound(_))
  ));
  assert!(matches!(orders.list_all_orders(&stranger).await, Err(ShopError::Forbidden(_))));
  assert_eq!(orders.list_all_orders(&shop.staff).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_tracking_and_mark_paid() {
  let shop = seed_shop().await;
  let order = cash_order(&shop, &shop.customer).await;
  let orders = &shop.services.orders;

  let tracked = orders.update_tracking(&shop.staff, order.id, "UG-TRK-42").await.unwrap();
  assert_eq!(tracked.tracking_number.as_deref(), Some("UG-TRK-42"));

  let paid = orders.mark_paid(order.id).await.unwrap();
  assert_eq!(paid.status, OrderStatus::Paid);
  assert_eq!(paid.payment_status, OrderPaymentStatus::Paid);
  let again = orders.mark_paid(order.id).await.unwrap();
  assert_eq!(again.paid_at, paid.paid_at);
}
