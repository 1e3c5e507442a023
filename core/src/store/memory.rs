// core/src/store/memory.rs

//! In-memory `Store` used by tests and by the server when no database URL is
//! configured. All state sits behind one `RwLock`, so every trait method is
//! atomic with respect to every other.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CheckoutCommit, CommitOutcome, PaymentChange, PaymentQuery, ProductQuery, Store};
use crate::error::{ShopError, ShopResult};
use crate::models::order::{format_order_number, order_number_sequence};
use crate::models::{
  Address, AuthToken, Cart, CartItem, CartLine, Category, CheckoutLine, CheckoutSession, CheckoutStatus, CustomerMetric, DateRange,
  DeliveryZone, Inventory, InventoryMetric, MetricDelta, MobilePayment, MobilePaymentProvider, Order, OrderItem,
  OrderNote, OrderPaymentStatus, OrderStatus, OrderStatusHistory, PaymentMethod, PaymentNotification, PaymentStatus,
  PickupLocation, Product, ProductImage, ProductList, ProductPerformance, ProductReview, ProviderCode, SalesMetric,
  StockMovement, User, UserPreference,
};

#[derive(Default)]
struct Inner {
  users: HashMap<Uuid, User>,
  tokens: HashMap<String, AuthToken>,
  addresses: HashMap<Uuid, Address>,
  preferences: HashMap<Uuid, UserPreference>,
  product_lists: Vec<(Uuid, ProductList, Uuid)>,
  categories: HashMap<Uuid, Category>,
  products: HashMap<Uuid, Product>,
  inventory: HashMap<Uuid, Inventory>,
  images: Vec<ProductImage>,
  reviews: Vec<ProductReview>,
  movements: Vec<StockMovement>,
  carts: HashMap<Uuid, Cart>,
  cart_items: HashMap<Uuid, CartItem>,
  zones: HashMap<Uuid, DeliveryZone>,
  pickups: HashMap<Uuid, PickupLocation>,
  methods: HashMap<Uuid, PaymentMethod>,
  sessions: HashMap<Uuid, CheckoutSession>,
  session_lines: Vec<CheckoutLine>,
  orders: HashMap<Uuid, Order>,
  order_items: Vec<OrderItem>,
  history: Vec<OrderStatusHistory>,
  notes: Vec<OrderNote>,
  providers: HashMap<ProviderCode, MobilePaymentProvider>,
  payments: HashMap<Uuid, MobilePayment>,
  notifications: Vec<PaymentNotification>,
  sales: BTreeMap<NaiveDate, SalesMetric>,
  stock_metrics: BTreeMap<(NaiveDate, Uuid), InventoryMetric>,
  customers: BTreeMap<NaiveDate, CustomerMetric>,
  performance: BTreeMap<(NaiveDate, Uuid), ProductPerformance>,
}

impl Inner {
  fn cart_lines(&self, cart_id: Uuid) -> Vec<CartLine> {
    let mut items: Vec<&CartItem> = self.cart_items.values().filter(|i| i.cart_id == cart_id).collect();
    items.sort_by_key(|i| i.added_at);
    items
      .into_iter()
      .filter_map(|item| {
        let product = self.products.get(&item.product_id)?;
        Some(CartLine::new(
          item.id,
          product.id,
          product.name.clone(),
          product.price,
          item.quantity,
        ))
      })
      .collect()
  }

  fn session_has_open_payment(&self, session_id: Uuid) -> bool {
    self
      .payments
      .values()
      .any(|p| p.checkout_session_id == Some(session_id) && p.status.is_open())
  }

  fn next_order_number(&self, date: NaiveDate) -> String {
    let last = self
      .orders
      .values()
      .filter_map(|o| order_number_sequence(&o.order_number, date))
      .max()
      .unwrap_or(0);
    format_order_number(date, last + 1)
  }

  fn apply_metric(&mut self, delta: &MetricDelta) {
    match delta {
      MetricDelta::Sales {
        date,
        total_sales,
        order_count,
        refund_amount,
        refund_count,
      } => {
        let row = self.sales.entry(*date).or_insert_with(|| SalesMetric::empty(*date));
        row.total_sales += *total_sales;
        row.order_count += *order_count;
        row.refund_amount += *refund_amount;
        row.refund_count += *refund_count;
      }
      MetricDelta::Inventory {
        date,
        product_id,
        units_sold,
        units_refunded,
        restock_amount,
        low_stock_alerts,
        stock_before,
        stock_after,
      } => {
        let opening = stock_before.or(*stock_after).unwrap_or(0);
        let row = self
          .stock_metrics
          .entry((*date, *product_id))
          .or_insert_with(|| InventoryMetric {
            date: *date,
            product_id: *product_id,
            opening_stock: opening,
            closing_stock: opening,
            units_sold: 0,
            units_refunded: 0,
            restock_amount: 0,
            low_stock_alerts: 0,
          });
        row.units_sold += units_sold;
        row.units_refunded += units_refunded;
        row.restock_amount += restock_amount;
        row.low_stock_alerts += low_stock_alerts;
        if let Some(after) = stock_after {
          row.closing_stock = *after;
        }
      }
      MetricDelta::Customers {
        date,
        new_customers,
        returning_customers,
        orders_placed,
      } => {
        let row = self
          .customers
          .entry(*date)
          .or_insert_with(|| CustomerMetric::empty(*date));
        row.new_customers += new_customers;
        row.returning_customers += returning_customers;
        row.orders_placed += orders_placed;
      }
      MetricDelta::Product {
        date,
        product_id,
        views,
        add_to_cart_count,
        purchase_count,
        revenue,
      } => {
        let row = self
          .performance
          .entry((*date, *product_id))
          .or_insert_with(|| ProductPerformance {
            date: *date,
            product_id: *product_id,
            views: 0,
            add_to_cart_count: 0,
            purchase_count: 0,
            revenue: rust_decimal::Decimal::ZERO,
            conversion_rate: rust_decimal::Decimal::ZERO,
          });
        row.views += views;
        row.add_to_cart_count += add_to_cart_count;
        row.purchase_count += purchase_count;
        row.revenue += *revenue;
      }
    }
  }
}

#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stock movements recorded so far.
  pub fn movement_count(&self) -> usize {
    self.inner.read().movements.len()
  }
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
  rows.sort_by_key(key);
  rows
}

#[async_trait]
impl Store for MemoryStore {
  async fn insert_user(&self, user: &User) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if inner.users.values().any(|u| u.email == user.email) {
      return Err(ShopError::Conflict(format!("A user with email {} already exists", user.email)));
    }
    inner.users.insert(user.id, user.clone());
    Ok(())
  }

  async fn get_user(&self, id: Uuid) -> ShopResult<Option<User>> {
    Ok(self.inner.read().users.get(&id).cloned())
  }

  async fn find_user_by_email(&self, email: &str) -> ShopResult<Option<User>> {
    Ok(self.inner.read().users.values().find(|u| u.email == email).cloned())
  }

  async fn set_user_staff(&self, id: Uuid, is_staff: bool) -> ShopResult<bool> {
    let mut inner = self.inner.write();
    Ok(match inner.users.get_mut(&id) {
      Some(user) => {
        user.is_staff = is_staff;
        true
      }
      None => false,
    })
  }

  async fn set_user_password(&self, id: Uuid, password_hash: &str) -> ShopResult<bool> {
    let mut inner = self.inner.write();
    Ok(match inner.users.get_mut(&id) {
      Some(user) => {
        user.password_hash = password_hash.to_string();
        true
      }
      None => false,
    })
  }

  async fn insert_token(&self, token: &AuthToken) -> ShopResult<()> {
    self.inner.write().tokens.insert(token.token.clone(), token.clone());
    Ok(())
  }

  async fn get_token(&self, token: &str) -> ShopResult<Option<AuthToken>> {
    Ok(self.inner.read().tokens.get(token).cloned())
  }

  async fn delete_token(&self, token: &str) -> ShopResult<bool> {
    Ok(self.inner.write().tokens.remove(token).is_some())
  }

  async fn list_addresses(&self, user_id: Uuid) -> ShopResult<Vec<Address>> {
    let rows = self
      .inner
      .read()
      .addresses
      .values()
      .filter(|a| a.user_id == user_id)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |a: &Address| (!a.is_default, a.created_at)))
  }

  async fn get_address(&self, id: Uuid) -> ShopResult<Option<Address>> {
    Ok(self.inner.read().addresses.get(&id).cloned())
  }

  #[instrument(level = "debug", skip(self, address), fields(address_id = %address.id))]
  async fn save_address(&self, address: &Address) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if address.is_default {
      for other in inner.addresses.values_mut() {
        if other.id != address.id
          && other.user_id == address.user_id
          && other.address_type == address.address_type
          && other.is_default
        {
          debug!(other_id = %other.id, "Clearing previous default address.");
          other.is_default = false;
          other.updated_at = address.updated_at;
        }
      }
    }
    inner.addresses.insert(address.id, address.clone());
    Ok(())
  }

  async fn delete_address(&self, id: Uuid) -> ShopResult<bool> {
    let mut inner = self.inner.write();
    let Some(address) = inner.addresses.remove(&id) else {
      return Ok(false);
    };
    if let Some(prefs) = inner.preferences.get_mut(&address.user_id) {
      if prefs.forget_address(id) {
        prefs.updated_at = Utc::now();
      }
    }
    Ok(true)
  }

  async fn get_or_create_preferences(&self, user_id: Uuid) -> ShopResult<UserPreference> {
    let mut inner = self.inner.write();
    let prefs = inner
      .preferences
      .entry(user_id)
      .or_insert_with(|| UserPreference::defaults_for(user_id, Utc::now()));
    Ok(prefs.clone())
  }

  async fn update_preferences(&self, preference: &UserPreference) -> ShopResult<()> {
    let mut inner = self.inner.write();
    match inner.preferences.get_mut(&preference.user_id) {
      Some(stored) => {
        *stored = UserPreference {
          id: stored.id,
          created_at: stored.created_at,
          ..preference.clone()
        };
        Ok(())
      }
      None => Err(ShopError::not_found("Preferences for user", preference.user_id)),
    }
  }

  async fn product_list(&self, user_id: Uuid, list: ProductList) -> ShopResult<Vec<Uuid>> {
    Ok(
      self
        .inner
        .read()
        .product_lists
        .iter()
        .filter(|(owner, l, _)| *owner == user_id && *l == list)
        .map(|(_, _, product_id)| *product_id)
        .collect(),
    )
  }

  async fn set_product_list_entry(
    &self,
    user_id: Uuid,
    list: ProductList,
    product_id: Uuid,
    present: bool,
  ) -> ShopResult<bool> {
    let mut inner = self.inner.write();
    let entry = (user_id, list, product_id);
    let exists = inner.product_lists.contains(&entry);
    match (present, exists) {
      (true, false) => inner.product_lists.push(entry),
      (false, true) => inner.product_lists.retain(|e| *e != entry),
      _ => return Ok(false),
    }
    Ok(true)
  }

  async fn insert_category(&self, category: &Category) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if inner.categories.values().any(|c| c.slug == category.slug) {
      return Err(ShopError::Conflict(format!("Category slug '{}' is taken", category.slug)));
    }
    inner.categories.insert(category.id, category.clone());
    Ok(())
  }

  async fn list_categories(&self, active_only: bool) -> ShopResult<Vec<Category>> {
    let rows = self
      .inner
      .read()
      .categories
      .values()
      .filter(|c| !active_only || c.is_active)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |c: &Category| c.name.clone()))
  }

  async fn find_category_by_slug(&self, slug: &str) -> ShopResult<Option<Category>> {
    Ok(self.inner.read().categories.values().find(|c| c.slug == slug).cloned())
  }

  async fn insert_product(&self, product: &Product, initial_stock: i32) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if inner.products.values().any(|p| p.slug == product.slug) {
      return Err(ShopError::Conflict(format!("Product slug '{}' is taken", product.slug)));
    }
    inner.products.insert(product.id, product.clone());
    inner
      .inventory
      .insert(product.id, Inventory::new(product.id, initial_stock));
    Ok(())
  }

  async fn update_product(&self, product: &Product) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if inner
      .products
      .values()
      .any(|p| p.slug == product.slug && p.id != product.id)
    {
      return Err(ShopError::Conflict(format!("Product slug '{}' is taken", product.slug)));
    }
    match inner.products.get_mut(&product.id) {
      Some(existing) => {
        *existing = product.clone();
        Ok(())
      }
      None => Err(ShopError::not_found("Product", product.id)),
    }
  }

  async fn get_product(&self, id: Uuid) -> ShopResult<Option<Product>> {
    Ok(self.inner.read().products.get(&id).cloned())
  }

  async fn find_product_by_slug(&self, slug: &str) -> ShopResult<Option<Product>> {
    Ok(self.inner.read().products.values().find(|p| p.slug == slug).cloned())
  }

  async fn list_products(&self, query: &ProductQuery) -> ShopResult<Vec<Product>> {
    let inner = self.inner.read();
    let rows = inner
      .products
      .values()
      .filter(|p| {
        let stock = inner.inventory.get(&p.id).map_or(0, |i| i.quantity);
        query.matches(p, inner.categories.get(&p.category_id), stock)
      })
      .cloned()
      .collect();
    Ok(sorted_by(rows, |p: &Product| p.name.clone()))
  }

  async fn get_inventory(&self, product_id: Uuid) -> ShopResult<Option<Inventory>> {
    Ok(self.inner.read().inventory.get(&product_id).cloned())
  }

  #[instrument(level = "debug", skip(self, movement), fields(product_id = %movement.product_id))]
  async fn apply_stock_movement(&self, movement: &StockMovement) -> ShopResult<(i32, Inventory)> {
    let mut inner = self.inner.write();
    let inventory = inner
      .inventory
      .get_mut(&movement.product_id)
      .ok_or_else(|| ShopError::not_found("Inventory for product", movement.product_id))?;
    let before = inventory.quantity;
    let after = movement
      .movement_type
      .apply(before, movement.quantity)
      .ok_or_else(|| ShopError::Validation(format!("Insufficient stock: {} available", before)))?;
    inventory.quantity = after;
    inventory.updated_at = movement.created_at;
    let updated = inventory.clone();
    inner.movements.push(movement.clone());
    Ok((before, updated))
  }

  async fn insert_product_image(&self, image: &ProductImage) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if !inner.products.contains_key(&image.product_id) {
      return Err(ShopError::not_found("Product", image.product_id));
    }
    if image.is_primary {
      for other in inner.images.iter_mut().filter(|i| i.product_id == image.product_id) {
        other.is_primary = false;
      }
    }
    inner.images.push(image.clone());
    Ok(())
  }

  async fn list_product_images(&self, product_id: Uuid) -> ShopResult<Vec<ProductImage>> {
    let rows = self
      .inner
      .read()
      .images
      .iter()
      .filter(|i| i.product_id == product_id)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |i: &ProductImage| (!i.is_primary, i.created_at)))
  }

  async fn insert_review(&self, review: &ProductReview) -> ShopResult<()> {
    let mut inner = self.inner.write();
    if inner
      .reviews
      .iter()
      .any(|r| r.product_id == review.product_id && r.user_id == review.user_id)
    {
      return Err(ShopError::Conflict("You have already reviewed this product".to_string()));
    }
    inner.reviews.push(review.clone());
    Ok(())
  }

  async fn list_reviews(&self, product_id: Uuid) -> ShopResult<Vec<ProductReview>> {
    let rows = self
      .inner
      .read()
      .reviews
      .iter()
      .filter(|r| r.product_id == product_id)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |r: &ProductReview| std::cmp::Reverse(r.created_at)))
  }

  async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> ShopResult<bool> {
    let inner = self.inner.read();
    Ok(inner.order_items.iter().any(|item| {
      item.product_id == product_id
        && inner
          .orders
          .get(&item.order_id)
          .is_some_and(|o| o.user_id == user_id && o.payment_status == OrderPaymentStatus::Paid)
    }))
  }

  async fn get_or_create_cart(&self, user_id: Uuid) -> ShopResult<Cart> {
    let mut inner = self.inner.write();
    if let Some(cart) = inner.carts.values().find(|c| c.user_id == user_id) {
      return Ok(cart.clone());
    }
    let now = Utc::now();
    let cart = Cart {
      id: Uuid::new_v4(),
      user_id,
      created_at: now,
      updated_at: now,
    };
    inner.carts.insert(cart.id, cart.clone());
    Ok(cart)
  }

  async fn cart_lines(&self, cart_id: Uuid) -> ShopResult<Vec<CartLine>> {
    Ok(self.inner.read().cart_lines(cart_id))
  }

  async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: i32) -> ShopResult<CartItem> {
    let mut inner = self.inner.write();
    if let Some(item) = inner
      .cart_items
      .values_mut()
      .find(|i| i.cart_id == cart_id && i.product_id == product_id)
    {
      item.quantity += quantity;
      return Ok(item.clone());
    }
    let item = CartItem {
      id: Uuid::new_v4(),
      cart_id,
      product_id,
      quantity,
      added_at: Utc::now(),
    };
    inner.cart_items.insert(item.id, item.clone());
    Ok(item)
  }

  async fn get_cart_item(&self, item_id: Uuid) -> ShopResult<Option<CartItem>> {
    Ok(self.inner.read().cart_items.get(&item_id).cloned())
  }

  async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> ShopResult<Option<CartItem>> {
    let mut inner = self.inner.write();
    if quantity <= 0 {
      inner.cart_items.remove(&item_id);
      return Ok(None);
    }
    Ok(inner.cart_items.get_mut(&item_id).map(|item| {
      item.quantity = quantity;
      item.clone()
    }))
  }

  async fn delete_cart_item(&self, item_id: Uuid) -> ShopResult<bool> {
    Ok(self.inner.write().cart_items.remove(&item_id).is_some())
  }

  async fn clear_cart(&self, cart_id: Uuid) -> ShopResult<()> {
    self.inner.write().cart_items.retain(|_, i| i.cart_id != cart_id);
    Ok(())
  }

  async fn insert_delivery_zone(&self, zone: &DeliveryZone) -> ShopResult<()> {
    self.inner.write().zones.insert(zone.id, zone.clone());
    Ok(())
  }

  async fn list_delivery_zones(&self, active_only: bool) -> ShopResult<Vec<DeliveryZone>> {
    let rows = self
      .inner
      .read()
      .zones
      .values()
      .filter(|z| !active_only || z.is_active)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |z: &DeliveryZone| z.name.clone()))
  }

  async fn get_delivery_zone(&self, id: Uuid) -> ShopResult<Option<DeliveryZone>> {
    Ok(self.inner.read().zones.get(&id).cloned())
  }

  async fn insert_pickup_location(&self, location: &PickupLocation) -> ShopResult<()> {
    self.inner.write().pickups.insert(location.id, location.clone());
    Ok(())
  }

  async fn list_pickup_locations(&self, active_only: bool) -> ShopResult<Vec<PickupLocation>> {
    let rows = self
      .inner
      .read()
      .pickups
      .values()
      .filter(|p| !active_only || p.is_active)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |p: &PickupLocation| p.name.clone()))
  }

  async fn get_pickup_location(&self, id: Uuid) -> ShopResult<Option<PickupLocation>> {
    Ok(self.inner.read().pickups.get(&id).cloned())
  }

  async fn insert_payment_method(&self, method: &PaymentMethod) -> ShopResult<()> {
    self.inner.write().methods.insert(method.id, method.clone());
    Ok(())
  }

  async fn list_payment_methods(&self, active_only: bool) -> ShopResult<Vec<PaymentMethod>> {
    let rows = self
      .inner
      .read()
      .methods
      .values()
      .filter(|m| !active_only || m.is_active)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |m: &PaymentMethod| m.name.clone()))
  }

  async fn get_payment_method(&self, id: Uuid) -> ShopResult<Option<PaymentMethod>> {
    Ok(self.inner.read().methods.get(&id).cloned())
  }

  #[instrument(level = "debug", skip(self, session), fields(session_id = %session.id))]
  async fn insert_checkout_session(&self, session: &CheckoutSession, lines: &[CheckoutLine]) -> ShopResult<()> {
    let mut inner = self.inner.write();
    let superseded: Vec<Uuid> = inner
      .sessions
      .values()
      .filter(|other| other.cart_id == session.cart_id && other.status.is_open())
      .map(|other| other.id)
      .collect();
    if superseded.iter().any(|id| inner.session_has_open_payment(*id)) {
      return Err(ShopError::InvalidState(
        "A payment is in progress for this cart; wait for it to finish".to_string(),
      ));
    }
    for id in superseded {
      if let Some(other) = inner.sessions.get_mut(&id) {
        debug!(previous_session = %other.id, "Cancelling superseded checkout session.");
        other.status = CheckoutStatus::Cancelled;
        other.updated_at = session.created_at;
      }
    }
    inner.sessions.insert(session.id, session.clone());
    inner.session_lines.extend(lines.iter().cloned());
    Ok(())
  }

  async fn checkout_lines(&self, session_id: Uuid) -> ShopResult<Vec<CheckoutLine>> {
    Ok(
      self
        .inner
        .read()
        .session_lines
        .iter()
        .filter(|l| l.session_id == session_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_checkout_session(&self, id: Uuid) -> ShopResult<Option<CheckoutSession>> {
    Ok(self.inner.read().sessions.get(&id).cloned())
  }

  async fn list_checkout_sessions(&self, user_id: Uuid) -> ShopResult<Vec<CheckoutSession>> {
    let rows = self
      .inner
      .read()
      .sessions
      .values()
      .filter(|s| s.user_id == user_id)
      .cloned()
      .collect();
    Ok(sorted_by(rows, |s: &CheckoutSession| std::cmp::Reverse(s.created_at)))
  }

  async fn update_checkout_session(&self, session: &CheckoutSession) -> ShopResult<()> {
    let mut inner = self.inner.write();
    let stored = inner
      .sessions
      .get_mut(&session.id)
      .ok_or_else(|| ShopError::not_found("Checkout session", session.id))?;
    let status = stored.status;
    *stored = CheckoutSession {
      status,
      ..session.clone()
    };
    Ok(())
  }

  async fn transition_checkout_session(
    &self,
    id: Uuid,
    from: &[CheckoutStatus],
    to: CheckoutStatus,
  ) -> ShopResult<Option<CheckoutSession>> {
    let mut inner = self.inner.write();
    let session = inner
      .sessions
      .get_mut(&id)
      .ok_or_else(|| ShopError::not_found("Checkout session", id))?;
    if !from.contains(&session.status) {
      return Ok(None);
    }
    session.status = to;
    session.updated_at = Utc::now();
    Ok(Some(session.clone()))
  }

  async fn list_stale_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<CheckoutSession>> {
    let rows = self
      .inner
      .read()
      .sessions
      .values()
      .filter(|s| s.needs_expiry(now))
      .cloned()
      .collect();
    Ok(sorted_by(rows, |s: &CheckoutSession| s.expires_at))
  }

  async fn expire_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<Uuid>> {
    let mut inner = self.inner.write();
    let mut expired = Vec::new();
    for session in inner.sessions.values_mut() {
      if session.needs_expiry(now) {
        session.status = CheckoutStatus::Expired;
        session.updated_at = now;
        expired.push(session.id);
      }
    }
    Ok(expired)
  }

  #[instrument(level = "debug", skip(self, commit), fields(session_id = %commit.session_id))]
  async fn commit_checkout(&self, commit: &CheckoutCommit) -> ShopResult<CommitOutcome> {
    let mut inner = self.inner.write();
    if let Some(existing) = inner
      .orders
      .values()
      .find(|o| o.checkout_session_id == Some(commit.session_id))
    {
      return Ok(CommitOutcome::Existing(existing.clone()));
    }

    let session = inner
      .sessions
      .get(&commit.session_id)
      .cloned()
      .ok_or_else(|| ShopError::not_found("Checkout session", commit.session_id))?;
    if !commit.allowed_from.contains(&session.status) {
      return Err(ShopError::InvalidState(format!(
        "Checkout session is {} and cannot be completed",
        session.status
      )));
    }
    let mut order = commit.order.clone();
    let items: Vec<OrderItem> = inner
      .session_lines
      .iter()
      .filter(|l| l.session_id == session.id)
      .map(|l| OrderItem::from_checkout_line(order.id, l))
      .collect();
    if items.is_empty() {
      return Err(ShopError::InvalidState("Checkout session has no items".to_string()));
    }

    order.order_number = inner.next_order_number(order.created_at.date_naive());
    let history = OrderStatusHistory::new(order.id, order.status, commit.history_note.clone(), None);

    inner.order_items.extend(items);
    inner.history.push(history);
    inner.cart_items.retain(|_, i| i.cart_id != session.cart_id);
    if let Some(stored) = inner.sessions.get_mut(&session.id) {
      stored.status = CheckoutStatus::Completed;
      stored.updated_at = order.created_at;
    }
    inner.orders.insert(order.id, order.clone());
    debug!(order_number = %order.order_number, "Order created from checkout session.");
    Ok(CommitOutcome::Created(order))
  }

  async fn get_order(&self, id: Uuid) -> ShopResult<Option<Order>> {
    Ok(self.inner.read().orders.get(&id).cloned())
  }

  async fn find_order_by_session(&self, session_id: Uuid) -> ShopResult<Option<Order>> {
    Ok(
      self
        .inner
        .read()
        .orders
        .values()
        .find(|o| o.checkout_session_id == Some(session_id))
        .cloned(),
    )
  }

  async fn list_orders(&self, user_id: Option<Uuid>) -> ShopResult<Vec<Order>> {
    let rows = self
      .inner
      .read()
      .orders
      .values()
      .filter(|o| user_id.map_or(true, |id| o.user_id == id))
      .cloned()
      .collect();
    Ok(sorted_by(rows, |o: &Order| std::cmp::Reverse((o.created_at, o.order_number.clone()))))
  }

  async fn order_items(&self, order_id: Uuid) -> ShopResult<Vec<OrderItem>> {
    Ok(
      self
        .inner
        .read()
        .order_items
        .iter()
        .filter(|i| i.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn order_history(&self, order_id: Uuid) -> ShopResult<Vec<OrderStatusHistory>> {
    Ok(
      self
        .inner
        .read()
        .history
        .iter()
        .filter(|h| h.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn order_notes(&self, order_id: Uuid) -> ShopResult<Vec<OrderNote>> {
    Ok(
      self
        .inner
        .read()
        .notes
        .iter()
        .filter(|n| n.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn update_order_status(
    &self,
    order: &Order,
    expected: OrderStatus,
    history: &OrderStatusHistory,
  ) -> ShopResult<bool> {
    let mut inner = self.inner.write();
    let stored = inner
      .orders
      .get_mut(&order.id)
      .ok_or_else(|| ShopError::not_found("Order", order.id))?;
    if stored.status != expected {
      return Ok(false);
    }
    stored.status = order.status;
    stored.payment_status = order.payment_status;
    stored.paid_at = order.paid_at;
    stored.processed_at = order.processed_at;
    stored.completed_at = order.completed_at;
    stored.cancelled_at = order.cancelled_at;
    stored.updated_at = order.updated_at;
    inner.history.push(history.clone());
    Ok(true)
  }

  async fn set_order_tracking(&self, id: Uuid, tracking_number: &str) -> ShopResult<Option<Order>> {
    let mut inner = self.inner.write();
    Ok(inner.orders.get_mut(&id).map(|order| {
      order.tracking_number = Some(tracking_number.to_string());
      order.updated_at = Utc::now();
      order.clone()
    }))
  }

  async fn insert_order_note(&self, note: &OrderNote) -> ShopResult<()> {
    self.inner.write().notes.push(note.clone());
    Ok(())
  }

  async fn upsert_provider(&self, provider: &MobilePaymentProvider) -> ShopResult<()> {
    self.inner.write().providers.insert(provider.code, provider.clone());
    Ok(())
  }

  async fn get_provider(&self, code: ProviderCode) -> ShopResult<Option<MobilePaymentProvider>> {
    Ok(self.inner.read().providers.get(&code).cloned())
  }

  async fn list_providers(&self) -> ShopResult<Vec<MobilePaymentProvider>> {
    let rows = self.inner.read().providers.values().cloned().collect();
    Ok(sorted_by(rows, |p: &MobilePaymentProvider| p.name.clone()))
  }

  #[instrument(level = "debug", skip(self, payment), fields(tx_ref = %payment.provider_tx_ref))]
  async fn insert_payment(&self, payment: &MobilePayment) -> ShopResult<()> {
    let target = payment
      .target()
      .ok_or_else(|| ShopError::Validation("Payment needs a checkout session or an order".to_string()))?;
    let mut inner = self.inner.write();
    if inner
      .payments
      .values()
      .any(|p| p.status.is_open() && p.matches_target(target))
    {
      return Err(ShopError::Conflict(
        "A payment is already in progress for this purchase".to_string(),
      ));
    }
    if inner
      .payments
      .values()
      .any(|p| p.provider_tx_ref == payment.provider_tx_ref)
    {
      return Err(ShopError::Conflict(format!(
        "Duplicate transaction reference {}",
        payment.provider_tx_ref
      )));
    }
    inner.payments.insert(payment.id, payment.clone());
    Ok(())
  }

  async fn get_payment(&self, id: Uuid) -> ShopResult<Option<MobilePayment>> {
    Ok(self.inner.read().payments.get(&id).cloned())
  }

  async fn find_payment_by_ref(&self, provider_tx_ref: &str) -> ShopResult<Option<MobilePayment>> {
    Ok(
      self
        .inner
        .read()
        .payments
        .values()
        .find(|p| p.provider_tx_ref == provider_tx_ref)
        .cloned(),
    )
  }

  async fn list_payments(&self, query: &PaymentQuery) -> ShopResult<Vec<MobilePayment>> {
    let rows = self
      .inner
      .read()
      .payments
      .values()
      .filter(|p| query.matches(p))
      .cloned()
      .collect();
    Ok(sorted_by(rows, |p: &MobilePayment| std::cmp::Reverse(p.created_at)))
  }

  async fn transition_payment(
    &self,
    id: Uuid,
    from: &[PaymentStatus],
    change: &PaymentChange,
  ) -> ShopResult<Option<MobilePayment>> {
    let mut inner = self.inner.write();
    let payment = inner
      .payments
      .get_mut(&id)
      .ok_or_else(|| ShopError::not_found("Payment", id))?;
    if !from.contains(&payment.status) || !change.guards_hold(payment) {
      return Ok(None);
    }
    change.apply(payment, Utc::now());
    Ok(Some(payment.clone()))
  }

  async fn insert_notification(&self, notification: &PaymentNotification) -> ShopResult<()> {
    self.inner.write().notifications.push(notification.clone());
    Ok(())
  }

  async fn list_notifications(&self, payment_id: Uuid) -> ShopResult<Vec<PaymentNotification>> {
    Ok(
      self
        .inner
        .read()
        .notifications
        .iter()
        .filter(|n| n.payment_id == payment_id)
        .cloned()
        .collect(),
    )
  }

  async fn record_metrics(&self, deltas: &[MetricDelta]) -> ShopResult<()> {
    let mut inner = self.inner.write();
    for delta in deltas {
      inner.apply_metric(delta);
    }
    Ok(())
  }

  async fn sales_metrics(&self, range: DateRange) -> ShopResult<Vec<SalesMetric>> {
    Ok(
      self
        .inner
        .read()
        .sales
        .range(range.start..=range.end)
        .map(|(_, m)| m.clone().derive())
        .collect(),
    )
  }

  async fn inventory_metrics(&self, range: DateRange) -> ShopResult<Vec<InventoryMetric>> {
    Ok(
      self
        .inner
        .read()
        .stock_metrics
        .values()
        .filter(|m| range.contains(m.date))
        .cloned()
        .collect(),
    )
  }

  async fn customer_metrics(&self, range: DateRange) -> ShopResult<Vec<CustomerMetric>> {
    Ok(
      self
        .inner
        .read()
        .customers
        .range(range.start..=range.end)
        .map(|(_, m)| m.clone())
        .collect(),
    )
  }

  async fn product_performance(&self, range: DateRange) -> ShopResult<Vec<ProductPerformance>> {
    Ok(
      self
        .inner
        .read()
        .performance
        .values()
        .filter(|m| range.contains(m.date))
        .map(|m| m.clone().derive())
        .collect(),
    )
  }
}
