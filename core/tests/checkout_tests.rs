// tests/checkout_tests.rs
mod common;
use common::*;
use rust_decimal_macros::dec;
use serial_test::serial;

use urbanherb::models::{CheckoutStatus, DeliveryType, OrderPaymentStatus, OrderStatus};
use urbanherb::services::checkout::NewCheckoutSession;
use urbanherb::{ShopError, Store};

#[tokio::test]
#[serial]
async fn test_session_total_is_subtotal_plus_delivery_fee() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 2).await;

  let session = shop
    .services
    .checkout
    .create_session(user, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap();
  assert_eq!(session.subtotal, dec!(20000));
  assert_eq!(session.delivery_fee, dec!(5000));
  assert_eq!(session.total, dec!(25000));
  assert_eq!(session.status, CheckoutStatus::Pending);
  assert!(session.expires_at > session.created_at);

  let recalculated = shop.services.checkout.calculate_total(user, session.id).await.unwrap();
  assert_eq!(recalculated.total, dec!(25000));
}

#[tokio::test]
#[serial]
async fn test_pickup_session_has_no_delivery_fee() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 1).await;

  let session = shop
    .services
    .checkout
    .create_session(
      user,
      NewCheckoutSession {
        delivery_type: DeliveryType::Pickup,
        delivery_zone_id: None,
        pickup_location_id: Some(shop.pickup.id),
        delivery_address: Some("ignored".to_string()),
        address_id: None,
        delivery_instructions: None,
        payment_method_id: shop.mtn_method.id,
      },
    )
    .await
    .unwrap();
  assert_eq!(session.delivery_fee, dec!(0));
  assert_eq!(session.total, dec!(10000));
  assert!(session.delivery_address.is_none());
}

#[tokio::test]
#[serial]
async fn test_delivery_requires_zone_and_address() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 1).await;

  let mut request = shop.delivery_request(shop.mtn_method.id);
  request.delivery_address = Some("   ".to_string());
  let err = shop.services.checkout.create_session(user, request).await.unwrap_err();
  assert!(matches!(err, ShopError::Validation(_)), "got {:?}", err);

  let mut request = shop.delivery_request(shop.mtn_method.id);
  request.delivery_zone_id = None;
  let err = shop.services.checkout.create_session(user, request).await.unwrap_err();
  assert!(matches!(err, ShopError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
#[serial]
async fn test_empty_cart_cannot_check_out() {
  let shop = seed_shop().await;
  let err = shop
    .services
    .checkout
    .create_session(&shop.customer, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap_err();
  assert!(matches!(err, ShopError::Validation(ref m) if m.contains("empty")));
}

#[tokio::test]
#[serial]
async fn test_new_session_cancels_previous_open_session() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 1).await;
  let checkout = &shop.services.checkout;

  let first = checkout
    .create_session(user, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap();
  let second = checkout
    .create_session(user, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap();

  assert_eq!(checkout.get_session(user, first.id).await.unwrap().status, CheckoutStatus::Cancelled);
  assert_eq!(checkout.get_session(user, second.id).await.unwrap().status, CheckoutStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_confirm_after_expiry_marks_session_expired() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 2).await;
  let checkout = &shop.services.checkout;
  let session = checkout
    .create_session(user, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap();
  shop.backdate(session.id).await;

  let err = checkout.confirm(user, session.id).await.unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(ref m) if m.contains("expired")), "got {:?}", err);

  let stored = shop.store.get_checkout_session(session.id).await.unwrap().unwrap();
  assert_eq!(stored.status, CheckoutStatus::Expired);

  let err = checkout.confirm(user, session.id).await.unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)));
}

#[tokio::test]
#[serial]
async fn test_reading_a_stale_session_expires_it() {
  let shop = seed_shop().await;
  let session = shop.confirmed_session(&shop.customer).await;
  assert_eq!(session.status, CheckoutStatus::PaymentPending);
  shop.backdate(session.id).await;

  let read = shop.services.checkout.get_session(&shop.customer, session.id).await.unwrap();
  assert_eq!(read.status, CheckoutStatus::Expired);
}

#[tokio::test]
#[serial]
async fn test_sweep_expires_only_stale_open_sessions() {
  let shop = seed_shop().await;
  let stale = shop.confirmed_session(&shop.customer).await;
  shop.backdate(stale.id).await;

  let other = register(&shop.services, "kato@example.com").await;
  let fresh = shop.confirmed_session(&other).await;

  let now = chrono::Utc::now();
  let preview = shop.services.checkout.stale_sessions(now).await.unwrap();
  assert_eq!(preview.len(), 1);
  assert_eq!(preview[0].id, stale.id);

  let expired = shop.services.checkout.expire_stale_sessions(now).await.unwrap();
  assert_eq!(expired, vec![stale.id]);
  let fresh = shop.store.get_checkout_session(fresh.id).await.unwrap().unwrap();
  assert_eq!(fresh.status, CheckoutStatus::PaymentPending);
}

#[tokio::test]
#[serial]
async fn test_completing_twice_creates_exactly_one_order() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let session = shop.confirmed_session(user).await;
  let checkout = &shop.services.checkout;

  let first = checkout.complete(session.id, true).await.unwrap();
  assert!(first.is_created());
  let second = checkout.complete(session.id, true).await.unwrap();
  assert!(!second.is_created());
  assert_eq!(first.order().id, second.order().id);

  let orders = shop.store.list_orders(Some(user.id)).await.unwrap();
  assert_eq!(orders.len(), 1);
  let order = &orders[0];
  assert_eq!(order.checkout_session_id, Some(session.id));
  assert_eq!(order.total, dec!(25000));
  assert_eq!(order.status, OrderStatus::Paid);
  assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
  assert!(order.paid_at.is_some());

  let items = shop.store.order_items(order.id).await.unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].quantity, 2);
  assert_eq!(items[0].subtotal, dec!(20000));

  let cart = shop.services.cart.get_cart(user).await.unwrap();
  assert!(cart.is_empty());
  let stored = shop.store.get_checkout_session(session.id).await.unwrap().unwrap();
  assert_eq!(stored.status, CheckoutStatus::Completed);
  assert!(shop.sender.subjects().iter().any(|s| s.contains(&order.order_number)));
}

#[tokio::test]
#[serial]
async fn test_cash_checkout_completes_on_confirmation() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 1).await;
  let checkout = &shop.services.checkout;
  let session = checkout
    .create_session(user, shop.delivery_request(shop.cash_method.id))
    .await
    .unwrap();

  let outcome = checkout.confirm(user, session.id).await.unwrap();
  let order = outcome.order.expect("cash confirmation creates the order");
  assert_eq!(outcome.session.status, CheckoutStatus::Completed);
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
  assert_eq!(order.total, dec!(15000));
}

#[tokio::test]
#[serial]
async fn test_cancel_only_open_sessions() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let session = shop.confirmed_session(user).await;
  let checkout = &shop.services.checkout;

  let cancelled = checkout.cancel(user, session.id).await.unwrap();
  assert_eq!(cancelled.status, CheckoutStatus::Cancelled);
  let err = checkout.cancel(user, session.id).await.unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)));
  let err = checkout.complete(session.id, false).await.unwrap_err();
  assert!(matches!(err, ShopError::InvalidState(_)));
}

#[tokio::test]
#[serial]
async fn test_collected_payment_still_completes_a_cancelled_session() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let session = shop.confirmed_session(user).await;
  let checkout = &shop.services.checkout;
  checkout.cancel(user, session.id).await.unwrap();

  let outcome = checkout.complete(session.id, true).await.unwrap();
  assert!(outcome.is_created());
  assert_eq!(outcome.order().payment_status, OrderPaymentStatus::Paid);
  let items = shop.store.order_items(outcome.order().id).await.unwrap();
  assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
#[serial]
async fn test_session_snapshot_is_stored_with_the_session() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  shop.fill_cart(user, 3).await;
  let session = shop
    .services
    .checkout
    .create_session(user, shop.delivery_request(shop.mtn_method.id))
    .await
    .unwrap();

  let lines = shop.store.checkout_lines(session.id).await.unwrap();
  assert_eq!(lines.len(), 1);
  assert_eq!(lines[0].session_id, session.id);
  assert_eq!(lines[0].product_id, shop.product.product.id);
  assert_eq!(lines[0].subtotal, session.subtotal);

  let stranger = register(&shop.services, "stranger@example.com").await;
  let err = shop.services.checkout.session_items(&stranger, session.id).await.unwrap_err();
  assert!(matches!(err, ShopError::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn test_sessions_are_private_to_their_owner() {
  let shop = seed_shop().await;
  let session = shop.confirmed_session(&shop.customer).await;
  let stranger = register(&shop.services, "stranger@example.com").await;
  let err = shop.services.checkout.get_session(&stranger, session.id).await.unwrap_err();
  assert!(matches!(err, ShopError::NotFound(_)));
}
