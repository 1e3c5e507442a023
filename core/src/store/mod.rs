// core/src/store/mod.rs

//! Persistence boundary.
//!
//! Services only talk to a `dyn Store`. Every method is a single atomic unit:
//! composite operations such as `commit_checkout` or `save_address` must run
//! in one transaction in a database-backed implementation, and under one lock
//! in the in-memory one. Status changes are compare-and-set: the caller names
//! the status it expects and gets `None` back when another writer got there
//! first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ShopResult;
use crate::models::{
  Address, AuthToken, Cart, CartItem, CartLine, Category, CheckoutLine, CheckoutSession, CheckoutStatus, CustomerMetric, DateRange,
  DeliveryZone, Inventory, InventoryMetric, MetricDelta, MobilePayment, MobilePaymentProvider, Order, OrderItem,
  OrderNote, OrderStatus, OrderStatusHistory, PaymentMethod, PaymentNotification, PaymentStatus, PickupLocation,
  Product, ProductImage, ProductList, ProductPerformance, ProductReview, ProviderCode, SalesMetric, StockMovement, User,
  UserPreference,
};

pub mod memory;

pub use memory::MemoryStore;

pub type DynStore = Arc<dyn Store>;

/// Product listing criteria with the category slug already resolved to the
/// set of category ids (the category and all its descendants).
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
  pub category_ids: Option<Vec<Uuid>>,
  pub min_price: Option<Decimal>,
  pub max_price: Option<Decimal>,
  pub in_stock: Option<bool>,
  pub search: Option<String>,
  pub active_only: bool,
}

impl ProductQuery {
  /// Evaluates the filter against one product. Used by the in-memory store;
  /// the SQL store expresses the same predicate in its WHERE clause.
  pub fn matches(&self, product: &Product, category: Option<&Category>, stock: i32) -> bool {
    if self.active_only && !product.is_active {
      return false;
    }
    if let Some(ids) = &self.category_ids {
      if !ids.contains(&product.category_id) {
        return false;
      }
    }
    if self.min_price.is_some_and(|min| product.price < min) {
      return false;
    }
    if self.max_price.is_some_and(|max| product.price > max) {
      return false;
    }
    match self.in_stock {
      Some(true) if stock <= 0 => return false,
      Some(false) if stock > 0 => return false,
      _ => {}
    }
    if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      let term = term.to_lowercase();
      let in_name = product.name.to_lowercase().contains(&term);
      let in_description = product
        .description
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains(&term));
      let in_category = category.is_some_and(|c| c.name.to_lowercase().contains(&term));
      if !(in_name || in_description || in_category) {
        return false;
      }
    }
    true
  }
}

/// Field changes applied together with a payment status compare-and-set.
#[derive(Debug, Clone, Default)]
pub struct PaymentChange {
  pub status: Option<PaymentStatus>,
  pub provider_tx_id: Option<String>,
  pub order_id: Option<Uuid>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Increment `retry_count`, but only while it is below this bound.
  pub retry_below: Option<i32>,
}

impl PaymentChange {
  pub fn to(status: PaymentStatus) -> Self {
    Self {
      status: Some(status),
      completed_at: (status == PaymentStatus::Successful).then(Utc::now),
      ..Self::default()
    }
  }

  pub fn with_tx_id(mut self, tx_id: Option<String>) -> Self {
    self.provider_tx_id = tx_id;
    self
  }

  /// Whether `payment` satisfies the non-status guards of this change.
  pub fn guards_hold(&self, payment: &MobilePayment) -> bool {
    self.retry_below.map_or(true, |max| payment.retry_count < max)
  }

  /// Applies the change to an in-memory copy of the payment.
  pub fn apply(&self, payment: &mut MobilePayment, now: DateTime<Utc>) {
    if let Some(status) = self.status {
      payment.status = status;
    }
    if let Some(tx_id) = &self.provider_tx_id {
      payment.provider_tx_id = Some(tx_id.clone());
    }
    if let Some(order_id) = self.order_id {
      payment.order_id = Some(order_id);
    }
    if let Some(completed_at) = self.completed_at {
      payment.completed_at = Some(completed_at);
    }
    if self.retry_below.is_some() {
      payment.retry_count += 1;
    }
    payment.updated_at = now;
  }
}

/// Everything needed to turn a checkout session into an order.
#[derive(Debug, Clone)]
pub struct CheckoutCommit {
  pub session_id: Uuid,
  /// Session statuses the commit may start from.
  pub allowed_from: Vec<CheckoutStatus>,
  /// Order template; `order_number` is assigned by the store.
  pub order: Order,
  pub history_note: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CommitOutcome {
  Created(Order),
  /// The session had already been converted; nothing was written.
  Existing(Order),
}

impl CommitOutcome {
  pub fn order(&self) -> &Order {
    match self {
      CommitOutcome::Created(order) | CommitOutcome::Existing(order) => order,
    }
  }

  pub fn into_order(self) -> Order {
    match self {
      CommitOutcome::Created(order) | CommitOutcome::Existing(order) => order,
    }
  }

  pub fn is_created(&self) -> bool {
    matches!(self, CommitOutcome::Created(_))
  }
}

/// Filter for admin payment sweeps.
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
  pub user_id: Option<Uuid>,
  pub checkout_session_id: Option<Uuid>,
  pub statuses: Vec<PaymentStatus>,
  pub created_after: Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
}

impl PaymentQuery {
  pub fn matches(&self, payment: &MobilePayment) -> bool {
    self.user_id.map_or(true, |id| payment.user_id == id)
      && self
        .checkout_session_id
        .map_or(true, |id| payment.checkout_session_id == Some(id))
      && (self.statuses.is_empty() || self.statuses.contains(&payment.status))
      && self.created_after.map_or(true, |t| payment.created_at >= t)
      && self.created_before.map_or(true, |t| payment.created_at <= t)
  }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
  // --- users & tokens ---

  /// Fails with `Conflict` when the email is taken.
  async fn insert_user(&self, user: &User) -> ShopResult<()>;
  async fn get_user(&self, id: Uuid) -> ShopResult<Option<User>>;
  async fn find_user_by_email(&self, email: &str) -> ShopResult<Option<User>>;
  async fn set_user_staff(&self, id: Uuid, is_staff: bool) -> ShopResult<bool>;
  async fn set_user_password(&self, id: Uuid, password_hash: &str) -> ShopResult<bool>;
  async fn insert_token(&self, token: &AuthToken) -> ShopResult<()>;
  async fn get_token(&self, token: &str) -> ShopResult<Option<AuthToken>>;
  async fn delete_token(&self, token: &str) -> ShopResult<bool>;

  // --- addresses ---

  async fn list_addresses(&self, user_id: Uuid) -> ShopResult<Vec<Address>>;
  async fn get_address(&self, id: Uuid) -> ShopResult<Option<Address>>;
  /// Inserts or replaces the address. When it is a default, every other
  /// address of the same user and type loses its default flag in the same
  /// write.
  async fn save_address(&self, address: &Address) -> ShopResult<()>;
  /// Also clears the address from any preference that names it as a default.
  async fn delete_address(&self, id: Uuid) -> ShopResult<bool>;

  // --- preferences ---

  async fn get_or_create_preferences(&self, user_id: Uuid) -> ShopResult<UserPreference>;
  /// Overwrites theme, notification levels and default addresses.
  async fn update_preferences(&self, preference: &UserPreference) -> ShopResult<()>;
  /// Product ids on the list, oldest entry first.
  async fn product_list(&self, user_id: Uuid, list: ProductList) -> ShopResult<Vec<Uuid>>;
  /// Adds (`present`) or removes the product. Returns whether the list changed.
  async fn set_product_list_entry(
    &self,
    user_id: Uuid,
    list: ProductList,
    product_id: Uuid,
    present: bool,
  ) -> ShopResult<bool>;

  // --- catalog ---

  /// Fails with `Conflict` when the slug is taken.
  async fn insert_category(&self, category: &Category) -> ShopResult<()>;
  async fn list_categories(&self, active_only: bool) -> ShopResult<Vec<Category>>;
  async fn find_category_by_slug(&self, slug: &str) -> ShopResult<Option<Category>>;
  /// Inserts the product together with its inventory row.
  async fn insert_product(&self, product: &Product, initial_stock: i32) -> ShopResult<()>;
  async fn update_product(&self, product: &Product) -> ShopResult<()>;
  async fn get_product(&self, id: Uuid) -> ShopResult<Option<Product>>;
  async fn find_product_by_slug(&self, slug: &str) -> ShopResult<Option<Product>>;
  async fn list_products(&self, query: &ProductQuery) -> ShopResult<Vec<Product>>;
  async fn get_inventory(&self, product_id: Uuid) -> ShopResult<Option<Inventory>>;
  /// Records the movement and applies it to the inventory counter. Returns
  /// the stock level before the movement and the updated inventory.
  async fn apply_stock_movement(&self, movement: &StockMovement) -> ShopResult<(i32, Inventory)>;
  /// A primary image demotes the product's other images in the same write.
  async fn insert_product_image(&self, image: &ProductImage) -> ShopResult<()>;
  /// Primary image first, then oldest first.
  async fn list_product_images(&self, product_id: Uuid) -> ShopResult<Vec<ProductImage>>;
  /// Fails with `Conflict` when the user already reviewed the product.
  async fn insert_review(&self, review: &ProductReview) -> ShopResult<()>;
  /// Newest first.
  async fn list_reviews(&self, product_id: Uuid) -> ShopResult<Vec<ProductReview>>;
  /// Whether the user has a paid order containing the product.
  async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> ShopResult<bool>;

  // --- cart ---

  async fn get_or_create_cart(&self, user_id: Uuid) -> ShopResult<Cart>;
  async fn cart_lines(&self, cart_id: Uuid) -> ShopResult<Vec<CartLine>>;
  /// Adds `quantity` to the line for `product_id`, creating it if needed.
  async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: i32) -> ShopResult<CartItem>;
  async fn get_cart_item(&self, item_id: Uuid) -> ShopResult<Option<CartItem>>;
  /// Sets the quantity; a quantity of zero or less removes the line.
  async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> ShopResult<Option<CartItem>>;
  async fn delete_cart_item(&self, item_id: Uuid) -> ShopResult<bool>;
  async fn clear_cart(&self, cart_id: Uuid) -> ShopResult<()>;

  // --- checkout options ---

  async fn insert_delivery_zone(&self, zone: &DeliveryZone) -> ShopResult<()>;
  async fn list_delivery_zones(&self, active_only: bool) -> ShopResult<Vec<DeliveryZone>>;
  async fn get_delivery_zone(&self, id: Uuid) -> ShopResult<Option<DeliveryZone>>;
  async fn insert_pickup_location(&self, location: &PickupLocation) -> ShopResult<()>;
  async fn list_pickup_locations(&self, active_only: bool) -> ShopResult<Vec<PickupLocation>>;
  async fn get_pickup_location(&self, id: Uuid) -> ShopResult<Option<PickupLocation>>;
  async fn insert_payment_method(&self, method: &PaymentMethod) -> ShopResult<()>;
  async fn list_payment_methods(&self, active_only: bool) -> ShopResult<Vec<PaymentMethod>>;
  async fn get_payment_method(&self, id: Uuid) -> ShopResult<Option<PaymentMethod>>;

  // --- checkout sessions ---

  /// Inserts a new session with its item snapshot and cancels any other open
  /// session on the same cart. Fails with `InvalidState`, writing nothing,
  /// when one of those sessions still has an open payment.
  async fn insert_checkout_session(&self, session: &CheckoutSession, lines: &[CheckoutLine]) -> ShopResult<()>;
  async fn checkout_lines(&self, session_id: Uuid) -> ShopResult<Vec<CheckoutLine>>;
  async fn get_checkout_session(&self, id: Uuid) -> ShopResult<Option<CheckoutSession>>;
  async fn list_checkout_sessions(&self, user_id: Uuid) -> ShopResult<Vec<CheckoutSession>>;
  /// Overwrites the mutable fields (amounts, delivery choice, expiry).
  async fn update_checkout_session(&self, session: &CheckoutSession) -> ShopResult<()>;
  /// Moves the session to `to` if its status is one of `from`.
  async fn transition_checkout_session(
    &self,
    id: Uuid,
    from: &[CheckoutStatus],
    to: CheckoutStatus,
  ) -> ShopResult<Option<CheckoutSession>>;
  /// Open sessions whose deadline is before `now`.
  async fn list_stale_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<CheckoutSession>>;
  /// Moves every open session whose deadline is before `now` to EXPIRED.
  async fn expire_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<Uuid>>;
  /// Converts the session into an order in one transaction: creates the order
  /// and its items from the session's item snapshot, records the first history
  /// entry, clears the cart and completes the session. Returns the existing
  /// order untouched when the session was already converted.
  async fn commit_checkout(&self, commit: &CheckoutCommit) -> ShopResult<CommitOutcome>;

  // --- orders ---

  async fn get_order(&self, id: Uuid) -> ShopResult<Option<Order>>;
  async fn find_order_by_session(&self, session_id: Uuid) -> ShopResult<Option<Order>>;
  /// Orders of one user, or every order when `user_id` is `None`; newest first.
  async fn list_orders(&self, user_id: Option<Uuid>) -> ShopResult<Vec<Order>>;
  async fn order_items(&self, order_id: Uuid) -> ShopResult<Vec<OrderItem>>;
  async fn order_history(&self, order_id: Uuid) -> ShopResult<Vec<OrderStatusHistory>>;
  async fn order_notes(&self, order_id: Uuid) -> ShopResult<Vec<OrderNote>>;
  /// Writes the status, payment status and lifecycle timestamps of `order`
  /// and appends `history`, provided the stored status still equals
  /// `expected`. Returns false when it did not.
  async fn update_order_status(
    &self,
    order: &Order,
    expected: OrderStatus,
    history: &OrderStatusHistory,
  ) -> ShopResult<bool>;
  async fn set_order_tracking(&self, id: Uuid, tracking_number: &str) -> ShopResult<Option<Order>>;
  async fn insert_order_note(&self, note: &OrderNote) -> ShopResult<()>;

  // --- payment providers ---

  /// Inserts or replaces the provider with the same code.
  async fn upsert_provider(&self, provider: &MobilePaymentProvider) -> ShopResult<()>;
  async fn get_provider(&self, code: ProviderCode) -> ShopResult<Option<MobilePaymentProvider>>;
  async fn list_providers(&self) -> ShopResult<Vec<MobilePaymentProvider>>;

  // --- payments ---

  /// Fails with `Conflict` when the target already has an open payment.
  async fn insert_payment(&self, payment: &MobilePayment) -> ShopResult<()>;
  async fn get_payment(&self, id: Uuid) -> ShopResult<Option<MobilePayment>>;
  async fn find_payment_by_ref(&self, provider_tx_ref: &str) -> ShopResult<Option<MobilePayment>>;
  async fn list_payments(&self, query: &PaymentQuery) -> ShopResult<Vec<MobilePayment>>;
  /// Applies `change` if the payment's status is one of `from` and the
  /// change's guards hold.
  async fn transition_payment(
    &self,
    id: Uuid,
    from: &[PaymentStatus],
    change: &PaymentChange,
  ) -> ShopResult<Option<MobilePayment>>;
  async fn insert_notification(&self, notification: &PaymentNotification) -> ShopResult<()>;
  async fn list_notifications(&self, payment_id: Uuid) -> ShopResult<Vec<PaymentNotification>>;

  // --- analytics ---

  /// Applies each delta as an additive upsert on its (date, dimension) row.
  async fn record_metrics(&self, deltas: &[MetricDelta]) -> ShopResult<()>;
  async fn sales_metrics(&self, range: DateRange) -> ShopResult<Vec<SalesMetric>>;
  async fn inventory_metrics(&self, range: DateRange) -> ShopResult<Vec<InventoryMetric>>;
  async fn customer_metrics(&self, range: DateRange) -> ShopResult<Vec<CustomerMetric>>;
  async fn product_performance(&self, range: DateRange) -> ShopResult<Vec<ProductPerformance>>;
}
