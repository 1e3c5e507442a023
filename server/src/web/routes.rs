// server/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::web::handlers::{
  admin_handlers, analytics_handlers, auth_handlers, cart_handlers, checkout_handlers, order_handlers,
  payment_handlers, product_handlers, webhook_handlers,
};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .route("/register", web::post().to(auth_handlers::register_handler))
          .route("/login", web::post().to(auth_handlers::login_handler))
          .route("/logout", web::post().to(auth_handlers::logout_handler))
          .route("/me", web::get().to(auth_handlers::me_handler))
          .route("/change-password", web::post().to(auth_handlers::change_password_handler))
          .route("/preferences", web::get().to(auth_handlers::get_preferences_handler))
          .route("/preferences", web::patch().to(auth_handlers::update_preferences_handler))
          .route(
            "/preferences/add-to-wishlist",
            web::post().to(auth_handlers::add_to_wishlist_handler),
          )
          .route(
            "/preferences/remove-from-wishlist",
            web::post().to(auth_handlers::remove_from_wishlist_handler),
          )
          .route("/preferences/add-to-saved", web::post().to(auth_handlers::add_to_saved_handler))
          .route(
            "/preferences/remove-from-saved",
            web::post().to(auth_handlers::remove_from_saved_handler),
          )
          .route(
            "/preferences/update-default-addresses",
            web::post().to(auth_handlers::update_default_addresses_handler),
          )
          .route("/addresses", web::get().to(auth_handlers::list_addresses_handler))
          .route("/addresses", web::post().to(auth_handlers::create_address_handler))
          .route("/addresses/{id}", web::put().to(auth_handlers::update_address_handler))
          .route("/addresses/{id}", web::delete().to(auth_handlers::delete_address_handler)),
      )
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/categories", web::get().to(product_handlers::list_categories_handler))
          .route("/{slug}", web::get().to(product_handlers::get_product_handler))
          .route("/{slug}/reviews", web::get().to(product_handlers::list_reviews_handler))
          .route("/{slug}/reviews", web::post().to(product_handlers::create_review_handler)),
      )
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::get_cart_handler))
          .route("/add_item", web::post().to(cart_handlers::add_item_handler))
          .route("/update_item", web::post().to(cart_handlers::update_item_handler))
          .route("/remove_item", web::post().to(cart_handlers::remove_item_handler))
          .route("/clear", web::post().to(cart_handlers::clear_cart_handler)),
      )
      .service(
        web::scope("/checkout")
          .route("/delivery-zones", web::get().to(checkout_handlers::list_delivery_zones_handler))
          .route("/pickup-locations", web::get().to(checkout_handlers::list_pickup_locations_handler))
          .route("/payment-methods", web::get().to(checkout_handlers::list_payment_methods_handler))
          .route("/sessions", web::get().to(checkout_handlers::list_sessions_handler))
          .route("/sessions", web::post().to(checkout_handlers::create_session_handler))
          .route("/sessions/{id}", web::get().to(checkout_handlers::get_session_handler))
          .route("/sessions/{id}/items", web::get().to(checkout_handlers::session_items_handler))
          .route("/sessions/{id}/confirm", web::post().to(checkout_handlers::confirm_session_handler))
          .route("/sessions/{id}/cancel", web::post().to(checkout_handlers::cancel_session_handler))
          .route(
            "/sessions/{id}/calculate_total",
            web::post().to(checkout_handlers::calculate_total_handler),
          ),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{id}", web::get().to(order_handlers::get_order_handler))
          .route("/{id}/add_note", web::post().to(order_handlers::add_note_handler))
          .route("/{id}/update_status", web::post().to(order_handlers::update_status_handler))
          .route("/{id}/update_tracking", web::post().to(order_handlers::update_tracking_handler))
          .route("/{id}/cancel", web::post().to(order_handlers::cancel_order_handler)),
      )
      .service(
        web::scope("/payments")
          // Registered before `/{id}/...` so a provider name never parses as an id.
          .route(
            "/webhooks/{provider}",
            web::post().to(webhook_handlers::payment_webhook_handler),
          )
          .route("", web::get().to(payment_handlers::list_payments_handler))
          .route("/initiate", web::post().to(payment_handlers::initiate_payment_handler))
          .route("/check_status", web::post().to(payment_handlers::check_status_handler))
          .route("/{id}", web::get().to(payment_handlers::get_payment_handler))
          .route("/{id}/retry", web::post().to(payment_handlers::retry_payment_handler)),
      )
      .service(
        web::scope("/analytics")
          .route("/sales", web::get().to(analytics_handlers::sales_handler))
          .route("/inventory", web::get().to(analytics_handlers::inventory_handler))
          .route("/customers", web::get().to(analytics_handlers::customers_handler))
          .route("/products", web::get().to(analytics_handlers::products_handler))
          .route("/summary", web::get().to(analytics_handlers::summary_handler))
          .route("/generate_report", web::post().to(analytics_handlers::generate_report_handler)),
      )
      .service(
        web::scope("/admin")
          .route("/categories", web::post().to(admin_handlers::create_category_handler))
          .route("/products", web::post().to(admin_handlers::create_product_handler))
          .route("/products/{id}", web::put().to(admin_handlers::update_product_handler))
          .route("/products/{id}/stock", web::post().to(admin_handlers::record_stock_handler))
          .route("/products/{id}/images", web::post().to(admin_handlers::add_product_image_handler))
          .route("/delivery-zones", web::post().to(admin_handlers::create_delivery_zone_handler))
          .route("/pickup-locations", web::post().to(admin_handlers::create_pickup_location_handler))
          .route("/payment-methods", web::post().to(admin_handlers::create_payment_method_handler))
          .route("/providers", web::get().to(admin_handlers::list_providers_handler))
          .route("/providers", web::post().to(admin_handlers::upsert_provider_handler)),
      ),
  );
}
