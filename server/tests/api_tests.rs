// server/tests/api_tests.rs
mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

use urbanherb::providers::signature;
use urbanherb::Store;
use urbanherb_server::web::configure_app_routes;

use common::{bearer, build_context, TestContext, WEBHOOK_SECRET};

macro_rules! init_app {
  ($ctx:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($ctx.state.clone()))
        .configure(configure_app_routes),
    )
    .await
  };
}

fn session_request(ctx: &TestContext) -> Value {
  json!({
    "delivery_type": "DELIVERY",
    "delivery_zone_id": ctx.zone.id,
    "delivery_address": "Plot 3, Entebbe Road",
    "payment_method_id": ctx.mtn_method.id,
  })
}

#[actix_web::test]
#[serial]
async fn health_endpoint_reports_ok() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["status"], "ok");
}

#[actix_web::test]
#[serial]
async fn register_login_and_fetch_profile() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/register")
    .set_json(json!({
      "email": "okello@example.com",
      "password": "long-enough-pw",
      "first_name": "James",
      "last_name": "Okello",
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .set_json(json!({ "email": "okello@example.com", "password": "long-enough-pw" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  let token = body["token"].as_str().expect("login returns a token").to_string();

  let req = test::TestRequest::get()
    .uri("/api/v1/auth/me")
    .insert_header(bearer(&token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let me: Value = test::read_body_json(resp).await;
  assert_eq!(me["email"], "okello@example.com");

  // The token is useless after logout.
  let req = test::TestRequest::post()
    .uri("/api/v1/auth/logout")
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
  let req = test::TestRequest::get()
    .uri("/api/v1/auth/me")
    .insert_header(bearer(&token))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
#[serial]
async fn wrong_password_is_rejected() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .set_json(json!({ "email": "grace@example.com", "password": "not-the-password" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].is_string());
}

#[actix_web::test]
#[serial]
async fn cart_requires_bearer_token() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/cart").to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::get()
    .uri("/api/v1/cart")
    .insert_header(("Authorization", "Bearer not-a-real-token"))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
#[serial]
async fn customers_cannot_use_staff_routes() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/admin/categories")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "name": "Teas" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"], "Staff access required");

  let req = test::TestRequest::get()
    .uri("/api/v1/analytics/summary")
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::get()
    .uri("/api/v1/analytics/summary")
    .insert_header(bearer(&ctx.staff_token))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
#[serial]
async fn staff_publishes_product_that_customers_can_browse() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/admin/products")
    .insert_header(bearer(&ctx.staff_token))
    .set_json(json!({
      "category_id": ctx.product.product.category_id,
      "name": "Rosemary Sprigs",
      "price": "4500",
      "initial_stock": 5,
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let resp = test::call_service(
    &app,
    test::TestRequest::get().uri("/api/v1/products/rosemary-sprigs").to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let product: Value = test::read_body_json(resp).await;
  assert_eq!(product["stock"], 5);
  assert_eq!(product["in_stock"], true);

  let resp = test::call_service(
    &app,
    test::TestRequest::get().uri("/api/v1/products/no-such-herb").to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
#[serial]
async fn confirming_an_expired_session_reports_expired_status() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/cart/add_item")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": ctx.product.product.id, "quantity": 2 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/sessions")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(session_request(&ctx))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let session: Value = test::read_body_json(resp).await;
  let session_id: Uuid = serde_json::from_value(session["id"].clone()).unwrap();

  let mut stored = ctx.store.get_checkout_session(session_id).await.unwrap().unwrap();
  stored.expires_at = Utc::now() - chrono::Duration::minutes(1);
  ctx.store.update_checkout_session(&stored).await.unwrap();

  let req = test::TestRequest::post()
    .uri(&format!("/api/v1/checkout/sessions/{}/confirm", session_id))
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["status"], "EXPIRED");
  assert_eq!(body["error"], "Checkout session has expired");
}

#[actix_web::test]
#[serial]
async fn mobile_money_checkout_produces_paid_order() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/cart/add_item")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": ctx.product.product.id, "quantity": 1 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/sessions")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(session_request(&ctx))
    .to_request();
  let session: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let session_id = session["id"].as_str().unwrap().to_string();

  let req = test::TestRequest::post()
    .uri(&format!("/api/v1/checkout/sessions/{}/confirm", session_id))
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let confirmed: Value = test::read_body_json(resp).await;
  assert_eq!(confirmed["session"]["status"], "PAYMENT_PENDING");
  assert!(confirmed["order"].is_null());

  // The sandbox adapter answers SUCCESSFUL straight away.
  let req = test::TestRequest::post()
    .uri("/api/v1/payments/initiate")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({
      "checkout_session_id": session_id,
      "provider": "MTN",
      "phone_number": "0772000111",
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let payment: Value = test::read_body_json(resp).await;
  assert_eq!(payment["status"], "SUCCESSFUL");
  assert!(payment["order_id"].is_string());

  let req = test::TestRequest::get()
    .uri("/api/v1/orders")
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  let orders: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let orders = orders.as_array().unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0]["payment_status"], "paid");
  assert_eq!(orders[0]["id"], payment["order_id"]);

  // Customers never see somebody else's order; staff see all of them.
  let req = test::TestRequest::get()
    .uri("/api/v1/orders")
    .insert_header(bearer(&ctx.staff_token))
    .to_request();
  let all: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(all.as_array().unwrap().len(), 1);
}

#[actix_web::test]
#[serial]
async fn webhook_signature_and_provider_are_checked() {
  let ctx = build_context().await;
  let app = init_app!(ctx);
  let body = serde_json::to_vec(&json!({ "transaction_id": "UH-UNKNOWN", "status": "SUCCESSFUL" })).unwrap();

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/webhooks/mtn")
    .insert_header(("X-Signature", "deadbeef"))
    .set_payload(body.clone())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/webhooks/mtn")
    .set_payload(body.clone())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  // Correctly signed, but no payment carries that reference.
  let signed = signature::sign(WEBHOOK_SECRET, &body).unwrap();
  let req = test::TestRequest::post()
    .uri("/api/v1/payments/webhooks/mtn")
    .insert_header(("X-Signature", signed))
    .set_payload(body.clone())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

  let req = test::TestRequest::post()
    .uri("/api/v1/payments/webhooks/paypal")
    .set_payload(body)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
#[serial]
async fn change_password_requires_the_current_one() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/change-password")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({
      "old_password": "not-my-password",
      "new_password": "fresh-password",
      "confirm_new_password": "fresh-password",
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"], "Invalid old password");

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/change-password")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({
      "old_password": common::CUSTOMER_PASSWORD,
      "new_password": "fresh-password",
      "confirm_new_password": "fresh-password",
    }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/login")
    .set_json(json!({ "email": "grace@example.com", "password": "fresh-password" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
#[serial]
async fn preferences_wishlist_and_default_addresses() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::get()
    .uri("/api/v1/auth/preferences")
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let prefs: Value = test::read_body_json(resp).await;
  assert_eq!(prefs["theme"], "SYSTEM");
  assert_eq!(prefs["email_notifications"], "all");

  let req = test::TestRequest::patch()
    .uri("/api/v1/auth/preferences")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "theme": "DARK", "email_notifications": "none" }))
    .to_request();
  let prefs: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(prefs["theme"], "DARK");
  assert_eq!(prefs["email_notifications"], "none");

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/preferences/add-to-wishlist")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": ctx.product.product.id }))
    .to_request();
  let prefs: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(prefs["wishlist_items"][0]["slug"], "moringa-powder");

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/preferences/add-to-saved")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": Uuid::new_v4() }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/addresses")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({
      "address_type": "SHIPPING",
      "full_name": "Grace Achieng",
      "street_address1": "Plot 3, Entebbe Road",
      "city": "Entebbe",
      "country": "Uganda",
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let address: Value = test::read_body_json(resp).await;

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/preferences/update-default-addresses")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "default_shipping_address": address["id"] }))
    .to_request();
  let prefs: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(prefs["default_shipping_address"]["id"], address["id"]);

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/preferences/update-default-addresses")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "default_shipping_address": null }))
    .to_request();
  let prefs: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert!(prefs["default_shipping_address"].is_null());
  assert_eq!(prefs["wishlist_items"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
#[serial]
async fn reviews_need_a_login_and_show_up_on_the_product() {
  let ctx = build_context().await;
  let app = init_app!(ctx);
  let review = json!({ "rating": 4, "comment": "Fine powder, mixes well" });

  let req = test::TestRequest::post()
    .uri("/api/v1/products/moringa-powder/reviews")
    .set_json(&review)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/v1/products/moringa-powder/reviews")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(&review)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created: Value = test::read_body_json(resp).await;
  assert_eq!(created["is_verified_purchase"], false);

  let req = test::TestRequest::post()
    .uri("/api/v1/products/moringa-powder/reviews")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(&review)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

  let resp = test::call_service(
    &app,
    test::TestRequest::get().uri("/api/v1/products/moringa-powder/reviews").to_request(),
  )
  .await;
  let reviews: Value = test::read_body_json(resp).await;
  assert_eq!(reviews.as_array().unwrap().len(), 1);

  let resp = test::call_service(
    &app,
    test::TestRequest::get().uri("/api/v1/products/moringa-powder").to_request(),
  )
  .await;
  let product: Value = test::read_body_json(resp).await;
  assert_eq!(product["review_count"], 1);
  let average: rust_decimal::Decimal = product["average_rating"].as_str().unwrap().parse().unwrap();
  assert_eq!(average, rust_decimal::Decimal::from(4));
}

#[actix_web::test]
#[serial]
async fn staff_attach_product_images() {
  let ctx = build_context().await;
  let app = init_app!(ctx);
  let uri = format!("/api/v1/admin/products/{}/images", ctx.product.product.id);
  let image = json!({ "image_url": "https://cdn.test/moringa.jpg", "is_primary": true });

  let req = test::TestRequest::post()
    .uri(&uri)
    .insert_header(bearer(&ctx.customer_token))
    .set_json(&image)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::post()
    .uri(&uri)
    .insert_header(bearer(&ctx.staff_token))
    .set_json(&image)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

  let resp = test::call_service(
    &app,
    test::TestRequest::get().uri("/api/v1/products/moringa-powder").to_request(),
  )
  .await;
  let product: Value = test::read_body_json(resp).await;
  assert_eq!(product["images"][0]["image_url"], "https://cdn.test/moringa.jpg");
  assert_eq!(product["images"][0]["is_primary"], true);
}

#[actix_web::test]
#[serial]
async fn session_items_are_frozen_at_creation() {
  let ctx = build_context().await;
  let app = init_app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/v1/cart/add_item")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": ctx.product.product.id, "quantity": 2 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/v1/checkout/sessions")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(session_request(&ctx))
    .to_request();
  let session: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let session_id = session["id"].as_str().unwrap().to_string();

  let req = test::TestRequest::post()
    .uri("/api/v1/cart/add_item")
    .insert_header(bearer(&ctx.customer_token))
    .set_json(json!({ "product_id": ctx.product.product.id, "quantity": 3 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/checkout/sessions/{}/items", session_id))
    .insert_header(bearer(&ctx.customer_token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let items: Value = test::read_body_json(resp).await;
  let items = items.as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["quantity"], 2);
}
