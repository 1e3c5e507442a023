// server/src/db/rows.rs

//! Row shapes read back from Postgres. Enum columns arrive as TEXT and are
//! parsed into the core enums when a row is converted into its model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use urbanherb::models::{
  Address, AuthToken, Cart, CartItem, CartLine, Category, CheckoutLine, CheckoutSession, CustomerMetric, DeliveryZone, Inventory,
  InventoryMetric, MobilePayment, MobilePaymentProvider, Order, OrderItem, OrderNote, OrderStatusHistory,
  PaymentMethod, PaymentNotification, PickupLocation, Product, ProductImage, ProductPerformance, ProductReview,
  SalesMetric, User, UserPreference,
};
use urbanherb::{ShopError, ShopResult};

fn parse_column<T>(column: &str, raw: &str) -> ShopResult<T>
where
  T: FromStr<Err = ShopError>,
{
  raw
    .parse::<T>()
    .map_err(|e| ShopError::Storage(format!("Bad value in column {}: {}", column, e.message())))
}

/// Converts a batch of rows, failing on the first unreadable one.
pub fn convert_all<R, T>(rows: Vec<R>) -> ShopResult<Vec<T>>
where
  R: TryInto<T, Error = ShopError>,
{
  rows.into_iter().map(TryInto::try_into).collect()
}

#[derive(Debug, FromRow)]
pub struct UserRow {
  pub id: Uuid,
  pub email: String,
  pub password_hash: String,
  pub first_name: String,
  pub last_name: String,
  pub phone: Option<String>,
  pub is_staff: bool,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
  type Error = ShopError;

  fn try_from(row: UserRow) -> ShopResult<Self> {
    Ok(User {
      id: row.id,
      email: row.email,
      password_hash: row.password_hash,
      first_name: row.first_name,
      last_name: row.last_name,
      phone: row.phone,
      is_staff: row.is_staff,
      is_active: row.is_active,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct AuthTokenRow {
  pub token: String,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl TryFrom<AuthTokenRow> for AuthToken {
  type Error = ShopError;

  fn try_from(row: AuthTokenRow) -> ShopResult<Self> {
    Ok(AuthToken {
      token: row.token,
      user_id: row.user_id,
      created_at: row.created_at,
      expires_at: row.expires_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct AddressRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub address_type: String,
  pub is_default: bool,
  pub full_name: String,
  pub street_address1: String,
  pub street_address2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: Option<String>,
  pub country: String,
  pub phone: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
  type Error = ShopError;

  fn try_from(row: AddressRow) -> ShopResult<Self> {
    Ok(Address {
      id: row.id,
      user_id: row.user_id,
      address_type: parse_column("address_type", &row.address_type)?,
      is_default: row.is_default,
      full_name: row.full_name,
      street_address1: row.street_address1,
      street_address2: row.street_address2,
      city: row.city,
      state: row.state,
      postal_code: row.postal_code,
      country: row.country,
      phone: row.phone,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct UserPreferenceRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub theme: String,
  pub email_notifications: String,
  pub push_notifications: String,
  pub default_shipping_address_id: Option<Uuid>,
  pub default_billing_address_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserPreferenceRow> for UserPreference {
  type Error = ShopError;

  fn try_from(row: UserPreferenceRow) -> ShopResult<Self> {
    Ok(UserPreference {
      id: row.id,
      user_id: row.user_id,
      theme: parse_column("theme", &row.theme)?,
      email_notifications: parse_column("email_notifications", &row.email_notifications)?,
      push_notifications: parse_column("push_notifications", &row.push_notifications)?,
      default_shipping_address_id: row.default_shipping_address_id,
      default_billing_address_id: row.default_billing_address_id,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CategoryRow {
  pub id: Uuid,
  pub name: String,
  pub slug: String,
  pub parent_id: Option<Uuid>,
  pub description: Option<String>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
  type Error = ShopError;

  fn try_from(row: CategoryRow) -> ShopResult<Self> {
    Ok(Category {
      id: row.id,
      name: row.name,
      slug: row.slug,
      parent_id: row.parent_id,
      description: row.description,
      is_active: row.is_active,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
  pub id: Uuid,
  pub category_id: Uuid,
  pub name: String,
  pub slug: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
  type Error = ShopError;

  fn try_from(row: ProductRow) -> ShopResult<Self> {
    Ok(Product {
      id: row.id,
      category_id: row.category_id,
      name: row.name,
      slug: row.slug,
      description: row.description,
      price: row.price,
      is_active: row.is_active,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct ProductImageRow {
  pub id: Uuid,
  pub product_id: Uuid,
  pub image_url: String,
  pub alt_text: Option<String>,
  pub is_primary: bool,
  pub is_feature: bool,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<ProductImageRow> for ProductImage {
  type Error = ShopError;

  fn try_from(row: ProductImageRow) -> ShopResult<Self> {
    Ok(ProductImage {
      id: row.id,
      product_id: row.product_id,
      image_url: row.image_url,
      alt_text: row.alt_text,
      is_primary: row.is_primary,
      is_feature: row.is_feature,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct ProductReviewRow {
  pub id: Uuid,
  pub product_id: Uuid,
  pub user_id: Uuid,
  pub rating: i32,
  pub comment: String,
  pub is_verified_purchase: bool,
  pub is_approved: bool,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<ProductReviewRow> for ProductReview {
  type Error = ShopError;

  fn try_from(row: ProductReviewRow) -> ShopResult<Self> {
    Ok(ProductReview {
      id: row.id,
      product_id: row.product_id,
      user_id: row.user_id,
      rating: row.rating,
      comment: row.comment,
      is_verified_purchase: row.is_verified_purchase,
      is_approved: row.is_approved,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct InventoryRow {
  pub product_id: Uuid,
  pub quantity: i32,
  pub low_stock_threshold: i32,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<InventoryRow> for Inventory {
  type Error = ShopError;

  fn try_from(row: InventoryRow) -> ShopResult<Self> {
    Ok(Inventory {
      product_id: row.product_id,
      quantity: row.quantity,
      low_stock_threshold: row.low_stock_threshold,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CartRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
  type Error = ShopError;

  fn try_from(row: CartRow) -> ShopResult<Self> {
    Ok(Cart {
      id: row.id,
      user_id: row.user_id,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CartItemRow {
  pub id: Uuid,
  pub cart_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
  type Error = ShopError;

  fn try_from(row: CartItemRow) -> ShopResult<Self> {
    Ok(CartItem {
      id: row.id,
      cart_id: row.cart_id,
      product_id: row.product_id,
      quantity: row.quantity,
      added_at: row.added_at,
    })
  }
}

/// A cart item joined with its product.
#[derive(Debug, FromRow)]
pub struct CartLineRow {
  pub item_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
  type Error = ShopError;

  fn try_from(row: CartLineRow) -> ShopResult<Self> {
    Ok(CartLine::new(
      row.item_id,
      row.product_id,
      row.product_name,
      row.unit_price,
      row.quantity,
    ))
  }
}

#[derive(Debug, FromRow)]
pub struct DeliveryZoneRow {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub delivery_fee: Decimal,
  pub estimated_days: i32,
  pub is_active: bool,
}

impl TryFrom<DeliveryZoneRow> for DeliveryZone {
  type Error = ShopError;

  fn try_from(row: DeliveryZoneRow) -> ShopResult<Self> {
    Ok(DeliveryZone {
      id: row.id,
      name: row.name,
      description: row.description,
      delivery_fee: row.delivery_fee,
      estimated_days: row.estimated_days,
      is_active: row.is_active,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct PickupLocationRow {
  pub id: Uuid,
  pub name: String,
  pub address: String,
  pub contact_phone: Option<String>,
  pub operating_hours: Option<String>,
  pub is_active: bool,
}

impl TryFrom<PickupLocationRow> for PickupLocation {
  type Error = ShopError;

  fn try_from(row: PickupLocationRow) -> ShopResult<Self> {
    Ok(PickupLocation {
      id: row.id,
      name: row.name,
      address: row.address,
      contact_phone: row.contact_phone,
      operating_hours: row.operating_hours,
      is_active: row.is_active,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct PaymentMethodRow {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub provider: String,
  pub is_active: bool,
  pub requires_verification: bool,
  pub min_amount: Option<Decimal>,
  pub max_amount: Option<Decimal>,
}

impl TryFrom<PaymentMethodRow> for PaymentMethod {
  type Error = ShopError;

  fn try_from(row: PaymentMethodRow) -> ShopResult<Self> {
    Ok(PaymentMethod {
      id: row.id,
      name: row.name,
      description: row.description,
      provider: parse_column("provider", &row.provider)?,
      is_active: row.is_active,
      requires_verification: row.requires_verification,
      min_amount: row.min_amount,
      max_amount: row.max_amount,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CheckoutSessionRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub cart_id: Uuid,
  pub delivery_type: String,
  pub delivery_zone_id: Option<Uuid>,
  pub pickup_location_id: Option<Uuid>,
  pub delivery_address: Option<String>,
  pub delivery_instructions: Option<String>,
  pub payment_method_id: Uuid,
  pub subtotal: Decimal,
  pub delivery_fee: Decimal,
  pub total: Decimal,
  pub status: String,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<CheckoutSessionRow> for CheckoutSession {
  type Error = ShopError;

  fn try_from(row: CheckoutSessionRow) -> ShopResult<Self> {
    Ok(CheckoutSession {
      id: row.id,
      user_id: row.user_id,
      cart_id: row.cart_id,
      delivery_type: parse_column("delivery_type", &row.delivery_type)?,
      delivery_zone_id: row.delivery_zone_id,
      pickup_location_id: row.pickup_location_id,
      delivery_address: row.delivery_address,
      delivery_instructions: row.delivery_instructions,
      payment_method_id: row.payment_method_id,
      subtotal: row.subtotal,
      delivery_fee: row.delivery_fee,
      total: row.total,
      status: parse_column("status", &row.status)?,
      expires_at: row.expires_at,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CheckoutLineRow {
  pub id: Uuid,
  pub session_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub subtotal: Decimal,
}

impl TryFrom<CheckoutLineRow> for CheckoutLine {
  type Error = ShopError;

  fn try_from(row: CheckoutLineRow) -> ShopResult<Self> {
    Ok(CheckoutLine {
      id: row.id,
      session_id: row.session_id,
      product_id: row.product_id,
      product_name: row.product_name,
      unit_price: row.unit_price,
      quantity: row.quantity,
      subtotal: row.subtotal,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Uuid,
  pub checkout_session_id: Option<Uuid>,
  pub status: String,
  pub payment_status: String,
  pub delivery_method: String,
  pub delivery_zone_id: Option<Uuid>,
  pub delivery_address: Option<String>,
  pub delivery_instructions: Option<String>,
  pub pickup_location_id: Option<Uuid>,
  pub payment_provider: Option<String>,
  pub subtotal: Decimal,
  pub delivery_fee: Decimal,
  pub tax: Decimal,
  pub total: Decimal,
  pub tracking_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub paid_at: Option<DateTime<Utc>>,
  pub processed_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
  type Error = ShopError;

  fn try_from(row: OrderRow) -> ShopResult<Self> {
    let payment_provider = match row.payment_provider.as_deref() {
      Some(raw) => Some(parse_column("payment_provider", raw)?),
      None => None,
    };
    Ok(Order {
      id: row.id,
      order_number: row.order_number,
      user_id: row.user_id,
      checkout_session_id: row.checkout_session_id,
      status: parse_column("status", &row.status)?,
      payment_status: parse_column("payment_status", &row.payment_status)?,
      delivery_method: parse_column("delivery_method", &row.delivery_method)?,
      delivery_zone_id: row.delivery_zone_id,
      delivery_address: row.delivery_address,
      delivery_instructions: row.delivery_instructions,
      pickup_location_id: row.pickup_location_id,
      payment_provider,
      subtotal: row.subtotal,
      delivery_fee: row.delivery_fee,
      tax: row.tax,
      total: row.total,
      tracking_number: row.tracking_number,
      created_at: row.created_at,
      updated_at: row.updated_at,
      paid_at: row.paid_at,
      processed_at: row.processed_at,
      completed_at: row.completed_at,
      cancelled_at: row.cancelled_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct OrderItemRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub subtotal: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
  type Error = ShopError;

  fn try_from(row: OrderItemRow) -> ShopResult<Self> {
    Ok(OrderItem {
      id: row.id,
      order_id: row.order_id,
      product_id: row.product_id,
      product_name: row.product_name,
      quantity: row.quantity,
      unit_price: row.unit_price,
      subtotal: row.subtotal,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct OrderHistoryRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub status: String,
  pub notes: Option<String>,
  pub created_by: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderHistoryRow> for OrderStatusHistory {
  type Error = ShopError;

  fn try_from(row: OrderHistoryRow) -> ShopResult<Self> {
    Ok(OrderStatusHistory {
      id: row.id,
      order_id: row.order_id,
      status: parse_column("status", &row.status)?,
      notes: row.notes,
      created_by: row.created_by,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct OrderNoteRow {
  pub id: Uuid,
  pub order_id: Uuid,
  pub note: String,
  pub is_public: bool,
  pub created_by: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderNoteRow> for OrderNote {
  type Error = ShopError;

  fn try_from(row: OrderNoteRow) -> ShopResult<Self> {
    Ok(OrderNote {
      id: row.id,
      order_id: row.order_id,
      note: row.note,
      is_public: row.is_public,
      created_by: row.created_by,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct ProviderRow {
  pub id: Uuid,
  pub name: String,
  pub code: String,
  pub is_active: bool,
  pub api_base_url: String,
  pub api_key: String,
  pub api_secret: String,
  pub webhook_secret: String,
  pub created_at: DateTime<Utc>,
}

impl TryFrom<ProviderRow> for MobilePaymentProvider {
  type Error = ShopError;

  fn try_from(row: ProviderRow) -> ShopResult<Self> {
    Ok(MobilePaymentProvider {
      id: row.id,
      name: row.name,
      code: parse_column("code", &row.code)?,
      is_active: row.is_active,
      api_base_url: row.api_base_url,
      api_key: row.api_key,
      api_secret: row.api_secret,
      webhook_secret: row.webhook_secret,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct PaymentRow {
  pub id: Uuid,
  pub user_id: Uuid,
  pub checkout_session_id: Option<Uuid>,
  pub order_id: Option<Uuid>,
  pub provider_code: String,
  pub amount: Decimal,
  pub currency: String,
  pub phone_number: String,
  pub provider_tx_ref: String,
  pub provider_tx_id: Option<String>,
  pub status: String,
  pub retry_count: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for MobilePayment {
  type Error = ShopError;

  fn try_from(row: PaymentRow) -> ShopResult<Self> {
    Ok(MobilePayment {
      id: row.id,
      user_id: row.user_id,
      checkout_session_id: row.checkout_session_id,
      order_id: row.order_id,
      provider_code: parse_column("provider_code", &row.provider_code)?,
      amount: row.amount,
      currency: row.currency,
      phone_number: row.phone_number,
      provider_tx_ref: row.provider_tx_ref,
      provider_tx_id: row.provider_tx_id,
      status: parse_column("status", &row.status)?,
      retry_count: row.retry_count,
      created_at: row.created_at,
      updated_at: row.updated_at,
      completed_at: row.completed_at,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct NotificationRow {
  pub id: Uuid,
  pub payment_id: Uuid,
  pub provider_code: String,
  pub notification_type: String,
  pub status: String,
  pub raw_payload: serde_json::Value,
  pub is_processed: bool,
  pub processing_errors: Option<String>,
  pub received_at: DateTime<Utc>,
  pub processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for PaymentNotification {
  type Error = ShopError;

  fn try_from(row: NotificationRow) -> ShopResult<Self> {
    Ok(PaymentNotification {
      id: row.id,
      payment_id: row.payment_id,
      provider_code: parse_column("provider_code", &row.provider_code)?,
      notification_type: parse_column("notification_type", &row.notification_type)?,
      status: row.status,
      raw_payload: row.raw_payload,
      is_processed: row.is_processed,
      processing_errors: row.processing_errors,
      received_at: row.received_at,
      processed_at: row.processed_at,
    })
  }
}

// --- metrics ---

#[derive(Debug, FromRow)]
pub struct SalesMetricRow {
  pub date: NaiveDate,
  pub total_sales: Decimal,
  pub order_count: i64,
  pub refund_amount: Decimal,
  pub refund_count: i64,
}

impl TryFrom<SalesMetricRow> for SalesMetric {
  type Error = ShopError;

  fn try_from(row: SalesMetricRow) -> ShopResult<Self> {
    Ok(
      SalesMetric {
        total_sales: row.total_sales,
        order_count: row.order_count,
        refund_amount: row.refund_amount,
        refund_count: row.refund_count,
        ..SalesMetric::empty(row.date)
      }
      .derive(),
    )
  }
}

#[derive(Debug, FromRow)]
pub struct InventoryMetricRow {
  pub date: NaiveDate,
  pub product_id: Uuid,
  pub opening_stock: i32,
  pub closing_stock: i32,
  pub units_sold: i32,
  pub units_refunded: i32,
  pub restock_amount: i32,
  pub low_stock_alerts: i32,
}

impl TryFrom<InventoryMetricRow> for InventoryMetric {
  type Error = ShopError;

  fn try_from(row: InventoryMetricRow) -> ShopResult<Self> {
    Ok(InventoryMetric {
      date: row.date,
      product_id: row.product_id,
      opening_stock: row.opening_stock,
      closing_stock: row.closing_stock,
      units_sold: row.units_sold,
      units_refunded: row.units_refunded,
      restock_amount: row.restock_amount,
      low_stock_alerts: row.low_stock_alerts,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct CustomerMetricRow {
  pub date: NaiveDate,
  pub new_customers: i32,
  pub returning_customers: i32,
  pub orders_placed: i32,
}

impl TryFrom<CustomerMetricRow> for CustomerMetric {
  type Error = ShopError;

  fn try_from(row: CustomerMetricRow) -> ShopResult<Self> {
    Ok(CustomerMetric {
      date: row.date,
      new_customers: row.new_customers,
      returning_customers: row.returning_customers,
      orders_placed: row.orders_placed,
    })
  }
}

#[derive(Debug, FromRow)]
pub struct ProductPerformanceRow {
  pub date: NaiveDate,
  pub product_id: Uuid,
  pub views: i32,
  pub add_to_cart_count: i32,
  pub purchase_count: i32,
  pub revenue: Decimal,
}

impl TryFrom<ProductPerformanceRow> for ProductPerformance {
  type Error = ShopError;

  fn try_from(row: ProductPerformanceRow) -> ShopResult<Self> {
    Ok(
      ProductPerformance {
        date: row.date,
        product_id: row.product_id,
        views: row.views,
        add_to_cart_count: row.add_to_cart_count,
        purchase_count: row.purchase_count,
        revenue: row.revenue,
        conversion_rate: Decimal::ZERO,
      }
      .derive(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::parse_column;
  use urbanherb::models::{OrderStatus, PaymentStatus};
  use urbanherb::ShopError;

  #[test]
  fn enum_columns_parse_their_stored_text() {
    let status: OrderStatus = parse_column("status", "ready_for_pickup").unwrap();
    assert_eq!(status, OrderStatus::ReadyForPickup);
    let payment: PaymentStatus = parse_column("status", "PROCESSING").unwrap();
    assert_eq!(payment, PaymentStatus::Processing);
  }

  #[test]
  fn unknown_enum_text_is_a_storage_error() {
    let err = parse_column::<OrderStatus>("status", "teleported").unwrap_err();
    assert!(matches!(err, ShopError::Storage(ref m) if m.contains("status")));
  }
}
