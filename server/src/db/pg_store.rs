// server/src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use urbanherb::models::order::{format_order_number, order_number_sequence};
use urbanherb::models::{
  Address, AuthToken, Cart, CartItem, CartLine, Category, CheckoutLine, CheckoutSession, CheckoutStatus, CustomerMetric, DateRange,
  DeliveryZone, Inventory, InventoryMetric, MetricDelta, MobilePayment, MobilePaymentProvider, Order, OrderItem,
  OrderNote, OrderPaymentStatus, OrderStatus, OrderStatusHistory, PaymentMethod, PaymentNotification, PaymentStatus,
  PickupLocation, Product, ProductImage, ProductList, ProductPerformance, ProductReview, ProviderCode, SalesMetric,
  StockMovement, User, UserPreference,
};
use urbanherb::store::{CheckoutCommit, CommitOutcome, PaymentChange, PaymentQuery, ProductQuery, Store};
use urbanherb::{ShopError, ShopResult};

use super::rows::*;

/// Maps a driver error into the core error space. Unique violations become
/// `Conflict` so services can report them as 409.
fn db_error(err: sqlx::Error) -> ShopError {
  if let Some(db) = err.as_database_error() {
    if db.is_unique_violation() {
      let message = match db.constraint() {
        Some("users_email_key") => "An account with this email already exists".to_string(),
        Some("categories_slug_key") => "Category slug is taken".to_string(),
        Some("products_slug_key") => "Product slug is taken".to_string(),
        Some("mobile_payments_open_per_session") | Some("mobile_payments_open_per_order") => {
          "A payment is already in progress for this purchase".to_string()
        }
        Some("mobile_payments_provider_tx_ref_key") => "Duplicate transaction reference".to_string(),
        Some("orders_checkout_session_id_key") => "Checkout session already has an order".to_string(),
        Some("product_reviews_one_per_user") => "You have already reviewed this product".to_string(),
        Some(other) => format!("Duplicate record ({})", other),
        None => "Duplicate record".to_string(),
      };
      return ShopError::Conflict(message);
    }
  }
  ShopError::Storage(err.to_string())
}

fn status_texts<T: Copy>(statuses: &[T], as_str: fn(&T) -> &'static str) -> Vec<String> {
  statuses.iter().map(|s| as_str(s).to_string()).collect()
}

fn open_session_statuses() -> Vec<String> {
  let open: Vec<CheckoutStatus> = CheckoutStatus::ALL.iter().copied().filter(CheckoutStatus::is_open).collect();
  status_texts(&open, CheckoutStatus::as_str)
}

/// Postgres-backed `Store`. Composite operations run in one transaction.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  async fn begin(&self) -> ShopResult<Transaction<'static, Postgres>> {
    self.pool.begin().await.map_err(db_error)
  }

  async fn session_lines_in(tx: &mut Transaction<'static, Postgres>, session_id: Uuid) -> ShopResult<Vec<CheckoutLine>> {
    let rows = sqlx::query_as::<_, CheckoutLineRow>(SESSION_LINES_SQL)
      .bind(session_id)
      .fetch_all(&mut **tx)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn payment_exists(&self, id: Uuid) -> ShopResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM mobile_payments WHERE id = $1)")
      .bind(id)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)
  }
}

const CART_LINES_SQL: &str = "SELECT ci.id AS item_id, p.id AS product_id, p.name AS product_name, \
   p.price AS unit_price, ci.quantity \
   FROM cart_items ci JOIN products p ON p.id = ci.product_id \
   WHERE ci.cart_id = $1 ORDER BY ci.added_at";

const SESSION_LINES_SQL: &str = "SELECT * FROM checkout_session_items WHERE session_id = $1 ORDER BY product_name";

#[async_trait]
impl Store for PgStore {
  // --- users & tokens ---

  async fn insert_user(&self, user: &User) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO users (id, email, password_hash, first_name, last_name, phone, is_staff, is_active, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.is_staff)
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn get_user(&self, id: Uuid) -> ShopResult<Option<User>> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(User::try_from)
      .transpose()
  }

  async fn find_user_by_email(&self, email: &str) -> ShopResult<Option<User>> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
      .bind(email)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(User::try_from)
      .transpose()
  }

  async fn set_user_staff(&self, id: Uuid, is_staff: bool) -> ShopResult<bool> {
    let result = sqlx::query("UPDATE users SET is_staff = $2 WHERE id = $1")
      .bind(id)
      .bind(is_staff)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  async fn set_user_password(&self, id: Uuid, password_hash: &str) -> ShopResult<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
      .bind(id)
      .bind(password_hash)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  async fn insert_token(&self, token: &AuthToken) -> ShopResult<()> {
    sqlx::query("INSERT INTO auth_tokens (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)")
      .bind(&token.token)
      .bind(token.user_id)
      .bind(token.created_at)
      .bind(token.expires_at)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(())
  }

  async fn get_token(&self, token: &str) -> ShopResult<Option<AuthToken>> {
    sqlx::query_as::<_, AuthTokenRow>("SELECT * FROM auth_tokens WHERE token = $1")
      .bind(token)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(AuthToken::try_from)
      .transpose()
  }

  async fn delete_token(&self, token: &str) -> ShopResult<bool> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE token = $1")
      .bind(token)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  // --- addresses ---

  async fn list_addresses(&self, user_id: Uuid) -> ShopResult<Vec<Address>> {
    let rows = sqlx::query_as::<_, AddressRow>(
      "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at",
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_address(&self, id: Uuid) -> ShopResult<Option<Address>> {
    sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Address::try_from)
      .transpose()
  }

  #[instrument(level = "debug", skip(self, address), fields(address_id = %address.id))]
  async fn save_address(&self, address: &Address) -> ShopResult<()> {
    let mut tx = self.begin().await?;
    if address.is_default {
      let cleared = sqlx::query(
        "UPDATE addresses SET is_default = FALSE, updated_at = $4 \
         WHERE user_id = $1 AND address_type = $2 AND id <> $3 AND is_default",
      )
      .bind(address.user_id)
      .bind(address.address_type.as_str())
      .bind(address.id)
      .bind(address.updated_at)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
      debug!(cleared = cleared.rows_affected(), "Cleared previous default address.");
    }
    sqlx::query(
      "INSERT INTO addresses (id, user_id, address_type, is_default, full_name, street_address1, street_address2, \
         city, state, postal_code, country, phone, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
       ON CONFLICT (id) DO UPDATE SET address_type = EXCLUDED.address_type, is_default = EXCLUDED.is_default, \
         full_name = EXCLUDED.full_name, street_address1 = EXCLUDED.street_address1, \
         street_address2 = EXCLUDED.street_address2, city = EXCLUDED.city, state = EXCLUDED.state, \
         postal_code = EXCLUDED.postal_code, country = EXCLUDED.country, phone = EXCLUDED.phone, \
         updated_at = EXCLUDED.updated_at",
    )
    .bind(address.id)
    .bind(address.user_id)
    .bind(address.address_type.as_str())
    .bind(address.is_default)
    .bind(&address.full_name)
    .bind(&address.street_address1)
    .bind(&address.street_address2)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(&address.phone)
    .bind(address.created_at)
    .bind(address.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)
  }

  // Preference defaults pointing at the address are nulled by ON DELETE SET NULL.
  async fn delete_address(&self, id: Uuid) -> ShopResult<bool> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  // --- preferences ---

  async fn get_or_create_preferences(&self, user_id: Uuid) -> ShopResult<UserPreference> {
    let defaults = UserPreference::defaults_for(user_id, Utc::now());
    sqlx::query(
      "INSERT INTO user_preferences (id, user_id, theme, email_notifications, push_notifications, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $6) \
       ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(defaults.id)
    .bind(user_id)
    .bind(defaults.theme.as_str())
    .bind(defaults.email_notifications.as_str())
    .bind(defaults.push_notifications.as_str())
    .bind(defaults.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    sqlx::query_as::<_, UserPreferenceRow>("SELECT * FROM user_preferences WHERE user_id = $1")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)?
      .try_into()
  }

  async fn update_preferences(&self, preference: &UserPreference) -> ShopResult<()> {
    sqlx::query(
      "UPDATE user_preferences SET theme = $2, email_notifications = $3, push_notifications = $4, \
         default_shipping_address_id = $5, default_billing_address_id = $6, updated_at = $7 \
       WHERE user_id = $1",
    )
    .bind(preference.user_id)
    .bind(preference.theme.as_str())
    .bind(preference.email_notifications.as_str())
    .bind(preference.push_notifications.as_str())
    .bind(preference.default_shipping_address_id)
    .bind(preference.default_billing_address_id)
    .bind(preference.updated_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn product_list(&self, user_id: Uuid, list: ProductList) -> ShopResult<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
      "SELECT product_id FROM user_product_lists WHERE user_id = $1 AND list = $2 ORDER BY added_at",
    )
    .bind(user_id)
    .bind(list.as_str())
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)
  }

  async fn set_product_list_entry(
    &self,
    user_id: Uuid,
    list: ProductList,
    product_id: Uuid,
    present: bool,
  ) -> ShopResult<bool> {
    let query = if present {
      sqlx::query(
        "INSERT INTO user_product_lists (user_id, list, product_id, added_at) VALUES ($1, $2, $3, $4) \
         ON CONFLICT DO NOTHING",
      )
      .bind(user_id)
      .bind(list.as_str())
      .bind(product_id)
      .bind(Utc::now())
    } else {
      sqlx::query("DELETE FROM user_product_lists WHERE user_id = $1 AND list = $2 AND product_id = $3")
        .bind(user_id)
        .bind(list.as_str())
        .bind(product_id)
    };
    let result = query.execute(&self.pool).await.map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  // --- catalog ---

  async fn insert_category(&self, category: &Category) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO categories (id, name, slug, parent_id, description, is_active, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.parent_id)
    .bind(&category.description)
    .bind(category.is_active)
    .bind(category.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_categories(&self, active_only: bool) -> ShopResult<Vec<Category>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
      "SELECT * FROM categories WHERE ($1 = FALSE OR is_active) ORDER BY name",
    )
    .bind(active_only)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn find_category_by_slug(&self, slug: &str) -> ShopResult<Option<Category>> {
    sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE slug = $1")
      .bind(slug)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Category::try_from)
      .transpose()
  }

  async fn insert_product(&self, product: &Product, initial_stock: i32) -> ShopResult<()> {
    let inventory = Inventory::new(product.id, initial_stock);
    let mut tx = self.begin().await?;
    sqlx::query(
      "INSERT INTO products (id, category_id, name, slug, description, price, is_active, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(product.id)
    .bind(product.category_id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    sqlx::query("INSERT INTO inventory (product_id, quantity, low_stock_threshold, updated_at) VALUES ($1, $2, $3, $4)")
      .bind(inventory.product_id)
      .bind(inventory.quantity)
      .bind(inventory.low_stock_threshold)
      .bind(inventory.updated_at)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    tx.commit().await.map_err(db_error)
  }

  async fn update_product(&self, product: &Product) -> ShopResult<()> {
    let result = sqlx::query(
      "UPDATE products SET category_id = $2, name = $3, slug = $4, description = $5, price = $6, \
         is_active = $7, updated_at = $8 WHERE id = $1",
    )
    .bind(product.id)
    .bind(product.category_id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.is_active)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    if result.rows_affected() == 0 {
      return Err(ShopError::not_found("Product", product.id));
    }
    Ok(())
  }

  async fn get_product(&self, id: Uuid) -> ShopResult<Option<Product>> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Product::try_from)
      .transpose()
  }

  async fn find_product_by_slug(&self, slug: &str) -> ShopResult<Option<Product>> {
    sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1")
      .bind(slug)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Product::try_from)
      .transpose()
  }

  async fn list_products(&self, query: &ProductQuery) -> ShopResult<Vec<Product>> {
    let mut sql = QueryBuilder::<Postgres>::new(
      "SELECT p.* FROM products p \
       LEFT JOIN inventory i ON i.product_id = p.id \
       LEFT JOIN categories c ON c.id = p.category_id WHERE TRUE",
    );
    if query.active_only {
      sql.push(" AND p.is_active");
    }
    if let Some(ids) = &query.category_ids {
      sql.push(" AND p.category_id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(min) = query.min_price {
      sql.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
      sql.push(" AND p.price <= ").push_bind(max);
    }
    match query.in_stock {
      Some(true) => {
        sql.push(" AND COALESCE(i.quantity, 0) > 0");
      }
      Some(false) => {
        sql.push(" AND COALESCE(i.quantity, 0) <= 0");
      }
      None => {}
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      let pattern = format!("%{}%", term);
      sql
        .push(" AND (p.name ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR p.description ILIKE ")
        .push_bind(pattern.clone())
        .push(" OR c.name ILIKE ")
        .push_bind(pattern)
        .push(")");
    }
    sql.push(" ORDER BY p.name");

    let rows = sql
      .build_query_as::<ProductRow>()
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_inventory(&self, product_id: Uuid) -> ShopResult<Option<Inventory>> {
    sqlx::query_as::<_, InventoryRow>("SELECT * FROM inventory WHERE product_id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Inventory::try_from)
      .transpose()
  }

  #[instrument(level = "debug", skip(self, movement), fields(product_id = %movement.product_id))]
  async fn apply_stock_movement(&self, movement: &StockMovement) -> ShopResult<(i32, Inventory)> {
    let mut tx = self.begin().await?;
    let before = sqlx::query_scalar::<_, i32>("SELECT quantity FROM inventory WHERE product_id = $1 FOR UPDATE")
      .bind(movement.product_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(db_error)?
      .ok_or_else(|| ShopError::not_found("Inventory for product", movement.product_id))?;
    let after = movement
      .movement_type
      .apply(before, movement.quantity)
      .ok_or_else(|| ShopError::Validation(format!("Insufficient stock: {} available", before)))?;

    let updated = sqlx::query_as::<_, InventoryRow>(
      "UPDATE inventory SET quantity = $2, updated_at = $3 WHERE product_id = $1 RETURNING *",
    )
    .bind(movement.product_id)
    .bind(after)
    .bind(movement.created_at)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;
    sqlx::query(
      "INSERT INTO stock_movements (id, product_id, movement_type, quantity, reference, notes, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(movement.id)
    .bind(movement.product_id)
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity)
    .bind(&movement.reference)
    .bind(&movement.notes)
    .bind(movement.created_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;
    Ok((before, updated.try_into()?))
  }

  #[instrument(level = "debug", skip(self, image), fields(image_id = %image.id))]
  async fn insert_product_image(&self, image: &ProductImage) -> ShopResult<()> {
    let mut tx = self.begin().await?;
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
      .bind(image.product_id)
      .fetch_one(&mut *tx)
      .await
      .map_err(db_error)?;
    if !exists {
      return Err(ShopError::not_found("Product", image.product_id));
    }
    if image.is_primary {
      sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1 AND is_primary")
        .bind(image.product_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }
    sqlx::query(
      "INSERT INTO product_images (id, product_id, image_url, alt_text, is_primary, is_feature, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(image.id)
    .bind(image.product_id)
    .bind(&image.image_url)
    .bind(&image.alt_text)
    .bind(image.is_primary)
    .bind(image.is_feature)
    .bind(image.created_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)
  }

  async fn list_product_images(&self, product_id: Uuid) -> ShopResult<Vec<ProductImage>> {
    let rows = sqlx::query_as::<_, ProductImageRow>(
      "SELECT * FROM product_images WHERE product_id = $1 ORDER BY is_primary DESC, created_at",
    )
    .bind(product_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn insert_review(&self, review: &ProductReview) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO product_reviews (id, product_id, user_id, rating, comment, is_verified_purchase, is_approved, \
         created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(review.id)
    .bind(review.product_id)
    .bind(review.user_id)
    .bind(review.rating)
    .bind(&review.comment)
    .bind(review.is_verified_purchase)
    .bind(review.is_approved)
    .bind(review.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_reviews(&self, product_id: Uuid) -> ShopResult<Vec<ProductReview>> {
    let rows = sqlx::query_as::<_, ProductReviewRow>(
      "SELECT * FROM product_reviews WHERE product_id = $1 ORDER BY created_at DESC",
    )
    .bind(product_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> ShopResult<bool> {
    sqlx::query_scalar::<_, bool>(
      "SELECT EXISTS(SELECT 1 FROM order_items oi JOIN orders o ON o.id = oi.order_id \
         WHERE o.user_id = $1 AND oi.product_id = $2 AND o.payment_status = $3)",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(OrderPaymentStatus::Paid.as_str())
    .fetch_one(&self.pool)
    .await
    .map_err(db_error)
  }

  // --- cart ---

  async fn get_or_create_cart(&self, user_id: Uuid) -> ShopResult<Cart> {
    let now = Utc::now();
    sqlx::query(
      "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, $3, $3) \
       ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(now)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)?
      .try_into()
  }

  async fn cart_lines(&self, cart_id: Uuid) -> ShopResult<Vec<CartLine>> {
    let rows = sqlx::query_as::<_, CartLineRow>(CART_LINES_SQL)
      .bind(cart_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: i32) -> ShopResult<CartItem> {
    sqlx::query_as::<_, CartItemRow>(
      "INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
       RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_one(&self.pool)
    .await
    .map_err(db_error)?
    .try_into()
  }

  async fn get_cart_item(&self, item_id: Uuid) -> ShopResult<Option<CartItem>> {
    sqlx::query_as::<_, CartItemRow>("SELECT * FROM cart_items WHERE id = $1")
      .bind(item_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(CartItem::try_from)
      .transpose()
  }

  async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> ShopResult<Option<CartItem>> {
    if quantity <= 0 {
      self.delete_cart_item(item_id).await?;
      return Ok(None);
    }
    sqlx::query_as::<_, CartItemRow>("UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING *")
      .bind(item_id)
      .bind(quantity)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(CartItem::try_from)
      .transpose()
  }

  async fn delete_cart_item(&self, item_id: Uuid) -> ShopResult<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
      .bind(item_id)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(result.rows_affected() > 0)
  }

  async fn clear_cart(&self, cart_id: Uuid) -> ShopResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
      .bind(cart_id)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(())
  }

  // --- checkout options ---

  async fn insert_delivery_zone(&self, zone: &DeliveryZone) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO delivery_zones (id, name, description, delivery_fee, estimated_days, is_active) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(zone.id)
    .bind(&zone.name)
    .bind(&zone.description)
    .bind(zone.delivery_fee)
    .bind(zone.estimated_days)
    .bind(zone.is_active)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_delivery_zones(&self, active_only: bool) -> ShopResult<Vec<DeliveryZone>> {
    let rows = sqlx::query_as::<_, DeliveryZoneRow>(
      "SELECT * FROM delivery_zones WHERE ($1 = FALSE OR is_active) ORDER BY name",
    )
    .bind(active_only)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_delivery_zone(&self, id: Uuid) -> ShopResult<Option<DeliveryZone>> {
    sqlx::query_as::<_, DeliveryZoneRow>("SELECT * FROM delivery_zones WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(DeliveryZone::try_from)
      .transpose()
  }

  async fn insert_pickup_location(&self, location: &PickupLocation) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO pickup_locations (id, name, address, contact_phone, operating_hours, is_active) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(location.id)
    .bind(&location.name)
    .bind(&location.address)
    .bind(&location.contact_phone)
    .bind(&location.operating_hours)
    .bind(location.is_active)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_pickup_locations(&self, active_only: bool) -> ShopResult<Vec<PickupLocation>> {
    let rows = sqlx::query_as::<_, PickupLocationRow>(
      "SELECT * FROM pickup_locations WHERE ($1 = FALSE OR is_active) ORDER BY name",
    )
    .bind(active_only)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_pickup_location(&self, id: Uuid) -> ShopResult<Option<PickupLocation>> {
    sqlx::query_as::<_, PickupLocationRow>("SELECT * FROM pickup_locations WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(PickupLocation::try_from)
      .transpose()
  }

  async fn insert_payment_method(&self, method: &PaymentMethod) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO payment_methods (id, name, description, provider, is_active, requires_verification, \
         min_amount, max_amount) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(method.id)
    .bind(&method.name)
    .bind(&method.description)
    .bind(method.provider.as_str())
    .bind(method.is_active)
    .bind(method.requires_verification)
    .bind(method.min_amount)
    .bind(method.max_amount)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_payment_methods(&self, active_only: bool) -> ShopResult<Vec<PaymentMethod>> {
    let rows = sqlx::query_as::<_, PaymentMethodRow>(
      "SELECT * FROM payment_methods WHERE ($1 = FALSE OR is_active) ORDER BY name",
    )
    .bind(active_only)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_payment_method(&self, id: Uuid) -> ShopResult<Option<PaymentMethod>> {
    sqlx::query_as::<_, PaymentMethodRow>("SELECT * FROM payment_methods WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(PaymentMethod::try_from)
      .transpose()
  }

  // --- checkout sessions ---

  #[instrument(level = "debug", skip(self, session), fields(session_id = %session.id))]
  async fn insert_checkout_session(&self, session: &CheckoutSession, lines: &[CheckoutLine]) -> ShopResult<()> {
    let mut tx = self.begin().await?;
    let open_ids = sqlx::query_scalar::<_, Uuid>(
      "SELECT id FROM checkout_sessions WHERE cart_id = $1 AND status = ANY($2) FOR UPDATE",
    )
    .bind(session.cart_id)
    .bind(open_session_statuses())
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error)?;
    let paying = sqlx::query_scalar::<_, bool>(
      "SELECT EXISTS(SELECT 1 FROM mobile_payments WHERE checkout_session_id = ANY($1) AND status = ANY($2))",
    )
    .bind(&open_ids)
    .bind(status_texts(
      &[PaymentStatus::Pending, PaymentStatus::Processing],
      PaymentStatus::as_str,
    ))
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;
    if paying {
      return Err(ShopError::InvalidState(
        "A payment is in progress for this cart; wait for it to finish".to_string(),
      ));
    }
    let superseded = sqlx::query(
      "UPDATE checkout_sessions SET status = 'CANCELLED', updated_at = $2 \
       WHERE cart_id = $1 AND status = ANY($3)",
    )
    .bind(session.cart_id)
    .bind(session.created_at)
    .bind(open_session_statuses())
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    if superseded.rows_affected() > 0 {
      debug!(count = superseded.rows_affected(), "Cancelled superseded checkout sessions.");
    }
    sqlx::query(
      "INSERT INTO checkout_sessions (id, user_id, cart_id, delivery_type, delivery_zone_id, pickup_location_id, \
         delivery_address, delivery_instructions, payment_method_id, subtotal, delivery_fee, total, status, \
         expires_at, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.cart_id)
    .bind(session.delivery_type.as_str())
    .bind(session.delivery_zone_id)
    .bind(session.pickup_location_id)
    .bind(&session.delivery_address)
    .bind(&session.delivery_instructions)
    .bind(session.payment_method_id)
    .bind(session.subtotal)
    .bind(session.delivery_fee)
    .bind(session.total)
    .bind(session.status.as_str())
    .bind(session.expires_at)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    for line in lines {
      sqlx::query(
        "INSERT INTO checkout_session_items (id, session_id, product_id, product_name, unit_price, quantity, subtotal) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
      )
      .bind(line.id)
      .bind(line.session_id)
      .bind(line.product_id)
      .bind(&line.product_name)
      .bind(line.unit_price)
      .bind(line.quantity)
      .bind(line.subtotal)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)
  }

  async fn checkout_lines(&self, session_id: Uuid) -> ShopResult<Vec<CheckoutLine>> {
    let rows = sqlx::query_as::<_, CheckoutLineRow>(SESSION_LINES_SQL)
      .bind(session_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn get_checkout_session(&self, id: Uuid) -> ShopResult<Option<CheckoutSession>> {
    sqlx::query_as::<_, CheckoutSessionRow>("SELECT * FROM checkout_sessions WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(CheckoutSession::try_from)
      .transpose()
  }

  async fn list_checkout_sessions(&self, user_id: Uuid) -> ShopResult<Vec<CheckoutSession>> {
    let rows = sqlx::query_as::<_, CheckoutSessionRow>(
      "SELECT * FROM checkout_sessions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn update_checkout_session(&self, session: &CheckoutSession) -> ShopResult<()> {
    let result = sqlx::query(
      "UPDATE checkout_sessions SET delivery_type = $2, delivery_zone_id = $3, pickup_location_id = $4, \
         delivery_address = $5, delivery_instructions = $6, payment_method_id = $7, subtotal = $8, \
         delivery_fee = $9, total = $10, expires_at = $11, updated_at = $12 WHERE id = $1",
    )
    .bind(session.id)
    .bind(session.delivery_type.as_str())
    .bind(session.delivery_zone_id)
    .bind(session.pickup_location_id)
    .bind(&session.delivery_address)
    .bind(&session.delivery_instructions)
    .bind(session.payment_method_id)
    .bind(session.subtotal)
    .bind(session.delivery_fee)
    .bind(session.total)
    .bind(session.expires_at)
    .bind(session.updated_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    if result.rows_affected() == 0 {
      return Err(ShopError::not_found("Checkout session", session.id));
    }
    Ok(())
  }

  async fn transition_checkout_session(
    &self,
    id: Uuid,
    from: &[CheckoutStatus],
    to: CheckoutStatus,
  ) -> ShopResult<Option<CheckoutSession>> {
    let updated = sqlx::query_as::<_, CheckoutSessionRow>(
      "UPDATE checkout_sessions SET status = $3, updated_at = NOW() \
       WHERE id = $1 AND status = ANY($2) RETURNING *",
    )
    .bind(id)
    .bind(status_texts(from, CheckoutStatus::as_str))
    .bind(to.as_str())
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;
    match updated {
      Some(row) => Ok(Some(row.try_into()?)),
      None if self.get_checkout_session(id).await?.is_some() => Ok(None),
      None => Err(ShopError::not_found("Checkout session", id)),
    }
  }

  async fn list_stale_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<CheckoutSession>> {
    let rows = sqlx::query_as::<_, CheckoutSessionRow>(
      "SELECT * FROM checkout_sessions WHERE status = ANY($1) AND expires_at < $2 ORDER BY expires_at",
    )
    .bind(open_session_statuses())
    .bind(now)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn expire_checkout_sessions(&self, now: DateTime<Utc>) -> ShopResult<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
      "UPDATE checkout_sessions SET status = 'EXPIRED', updated_at = $2 \
       WHERE status = ANY($1) AND expires_at < $2 RETURNING id",
    )
    .bind(open_session_statuses())
    .bind(now)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)
  }

  #[instrument(level = "debug", skip(self, commit), fields(session_id = %commit.session_id))]
  async fn commit_checkout(&self, commit: &CheckoutCommit) -> ShopResult<CommitOutcome> {
    let mut tx = self.begin().await?;

    // The row lock serializes concurrent completions of the same session.
    let session: CheckoutSession = sqlx::query_as::<_, CheckoutSessionRow>(
      "SELECT * FROM checkout_sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(commit.session_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ShopError::not_found("Checkout session", commit.session_id))?
    .try_into()?;

    let existing = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE checkout_session_id = $1")
      .bind(commit.session_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(db_error)?;
    if let Some(row) = existing {
      return Ok(CommitOutcome::Existing(row.try_into()?));
    }

    if !commit.allowed_from.contains(&session.status) {
      return Err(ShopError::InvalidState(format!(
        "Checkout session is {} and cannot be completed",
        session.status
      )));
    }
    let lines = Self::session_lines_in(&mut tx, session.id).await?;
    if lines.is_empty() {
      return Err(ShopError::InvalidState("Checkout session has no items".to_string()));
    }

    let mut order = commit.order.clone();
    let date = order.created_at.date_naive();
    let prefix = date.format("%Y%m%d").to_string();
    let day_key: i64 = prefix.parse().unwrap_or_default();
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
      .bind(day_key)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    let numbers = sqlx::query_scalar::<_, String>("SELECT order_number FROM orders WHERE order_number LIKE $1")
      .bind(format!("{}-%", prefix))
      .fetch_all(&mut *tx)
      .await
      .map_err(db_error)?;
    let last = numbers
      .iter()
      .filter_map(|n| order_number_sequence(n, date))
      .max()
      .unwrap_or(0);
    order.order_number = format_order_number(date, last + 1);

    sqlx::query(
      "INSERT INTO orders (id, order_number, user_id, checkout_session_id, status, payment_status, \
         delivery_method, delivery_zone_id, delivery_address, delivery_instructions, pickup_location_id, \
         payment_provider, subtotal, delivery_fee, tax, total, tracking_number, created_at, updated_at, \
         paid_at, processed_at, completed_at, cancelled_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, \
         $22, $23)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.checkout_session_id)
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.delivery_method.as_str())
    .bind(order.delivery_zone_id)
    .bind(&order.delivery_address)
    .bind(&order.delivery_instructions)
    .bind(order.pickup_location_id)
    .bind(order.payment_provider.map(|p| p.as_str()))
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.tax)
    .bind(order.total)
    .bind(&order.tracking_number)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .bind(order.processed_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    for line in &lines {
      let item = OrderItem::from_checkout_line(order.id, line);
      sqlx::query(
        "INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price, subtotal) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
      )
      .bind(item.id)
      .bind(item.order_id)
      .bind(item.product_id)
      .bind(&item.product_name)
      .bind(item.quantity)
      .bind(item.unit_price)
      .bind(item.subtotal)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    }

    let history = OrderStatusHistory::new(order.id, order.status, commit.history_note.clone(), None);
    insert_history(&mut tx, &history).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
      .bind(session.cart_id)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    sqlx::query("UPDATE checkout_sessions SET status = 'COMPLETED', updated_at = $2 WHERE id = $1")
      .bind(session.id)
      .bind(order.created_at)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;
    debug!(order_number = %order.order_number, "Order created from checkout session.");
    Ok(CommitOutcome::Created(order))
  }

  // --- orders ---

  async fn get_order(&self, id: Uuid) -> ShopResult<Option<Order>> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Order::try_from)
      .transpose()
  }

  async fn find_order_by_session(&self, session_id: Uuid) -> ShopResult<Option<Order>> {
    sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE checkout_session_id = $1")
      .bind(session_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(Order::try_from)
      .transpose()
  }

  async fn list_orders(&self, user_id: Option<Uuid>) -> ShopResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(
      "SELECT * FROM orders WHERE ($1::uuid IS NULL OR user_id = $1) \
       ORDER BY created_at DESC, order_number DESC",
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn order_items(&self, order_id: Uuid) -> ShopResult<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name")
      .bind(order_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn order_history(&self, order_id: Uuid) -> ShopResult<Vec<OrderStatusHistory>> {
    let rows = sqlx::query_as::<_, OrderHistoryRow>(
      "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn order_notes(&self, order_id: Uuid) -> ShopResult<Vec<OrderNote>> {
    let rows = sqlx::query_as::<_, OrderNoteRow>("SELECT * FROM order_notes WHERE order_id = $1 ORDER BY created_at")
      .bind(order_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn update_order_status(
    &self,
    order: &Order,
    expected: OrderStatus,
    history: &OrderStatusHistory,
  ) -> ShopResult<bool> {
    let mut tx = self.begin().await?;
    let result = sqlx::query(
      "UPDATE orders SET status = $3, payment_status = $4, paid_at = $5, processed_at = $6, completed_at = $7, \
         cancelled_at = $8, updated_at = $9 WHERE id = $1 AND status = $2",
    )
    .bind(order.id)
    .bind(expected.as_str())
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.paid_at)
    .bind(order.processed_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    if result.rows_affected() == 0 {
      tx.rollback().await.map_err(db_error)?;
      return match self.get_order(order.id).await? {
        Some(_) => Ok(false),
        None => Err(ShopError::not_found("Order", order.id)),
      };
    }
    insert_history(&mut tx, history).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(true)
  }

  async fn set_order_tracking(&self, id: Uuid, tracking_number: &str) -> ShopResult<Option<Order>> {
    sqlx::query_as::<_, OrderRow>(
      "UPDATE orders SET tracking_number = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(tracking_number)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?
    .map(Order::try_from)
    .transpose()
  }

  async fn insert_order_note(&self, note: &OrderNote) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO order_notes (id, order_id, note, is_public, created_by, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(note.id)
    .bind(note.order_id)
    .bind(&note.note)
    .bind(note.is_public)
    .bind(note.created_by)
    .bind(note.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  // --- payment providers ---

  async fn upsert_provider(&self, provider: &MobilePaymentProvider) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO mobile_payment_providers (id, name, code, is_active, api_base_url, api_key, api_secret, \
         webhook_secret, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
       ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, is_active = EXCLUDED.is_active, \
         api_base_url = EXCLUDED.api_base_url, api_key = EXCLUDED.api_key, api_secret = EXCLUDED.api_secret, \
         webhook_secret = EXCLUDED.webhook_secret",
    )
    .bind(provider.id)
    .bind(&provider.name)
    .bind(provider.code.as_str())
    .bind(provider.is_active)
    .bind(&provider.api_base_url)
    .bind(&provider.api_key)
    .bind(&provider.api_secret)
    .bind(&provider.webhook_secret)
    .bind(provider.created_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn get_provider(&self, code: ProviderCode) -> ShopResult<Option<MobilePaymentProvider>> {
    sqlx::query_as::<_, ProviderRow>("SELECT * FROM mobile_payment_providers WHERE code = $1")
      .bind(code.as_str())
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(MobilePaymentProvider::try_from)
      .transpose()
  }

  async fn list_providers(&self) -> ShopResult<Vec<MobilePaymentProvider>> {
    let rows = sqlx::query_as::<_, ProviderRow>("SELECT * FROM mobile_payment_providers ORDER BY name")
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  // --- payments ---

  #[instrument(level = "debug", skip(self, payment), fields(tx_ref = %payment.provider_tx_ref))]
  async fn insert_payment(&self, payment: &MobilePayment) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO mobile_payments (id, user_id, checkout_session_id, order_id, provider_code, amount, currency, \
         phone_number, provider_tx_ref, provider_tx_id, status, retry_count, created_at, updated_at, completed_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(payment.id)
    .bind(payment.user_id)
    .bind(payment.checkout_session_id)
    .bind(payment.order_id)
    .bind(payment.provider_code.as_str())
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.phone_number)
    .bind(&payment.provider_tx_ref)
    .bind(&payment.provider_tx_id)
    .bind(payment.status.as_str())
    .bind(payment.retry_count)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .bind(payment.completed_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn get_payment(&self, id: Uuid) -> ShopResult<Option<MobilePayment>> {
    sqlx::query_as::<_, PaymentRow>("SELECT * FROM mobile_payments WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(MobilePayment::try_from)
      .transpose()
  }

  async fn find_payment_by_ref(&self, provider_tx_ref: &str) -> ShopResult<Option<MobilePayment>> {
    sqlx::query_as::<_, PaymentRow>("SELECT * FROM mobile_payments WHERE provider_tx_ref = $1")
      .bind(provider_tx_ref)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?
      .map(MobilePayment::try_from)
      .transpose()
  }

  async fn list_payments(&self, query: &PaymentQuery) -> ShopResult<Vec<MobilePayment>> {
    let mut sql = QueryBuilder::<Postgres>::new("SELECT * FROM mobile_payments WHERE TRUE");
    if let Some(user_id) = query.user_id {
      sql.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(session_id) = query.checkout_session_id {
      sql.push(" AND checkout_session_id = ").push_bind(session_id);
    }
    if !query.statuses.is_empty() {
      sql
        .push(" AND status = ANY(")
        .push_bind(status_texts(&query.statuses, PaymentStatus::as_str))
        .push(")");
    }
    if let Some(after) = query.created_after {
      sql.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(before) = query.created_before {
      sql.push(" AND created_at <= ").push_bind(before);
    }
    sql.push(" ORDER BY created_at DESC");

    let rows = sql
      .build_query_as::<PaymentRow>()
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    convert_all(rows)
  }

  async fn transition_payment(
    &self,
    id: Uuid,
    from: &[PaymentStatus],
    change: &PaymentChange,
  ) -> ShopResult<Option<MobilePayment>> {
    let updated = sqlx::query_as::<_, PaymentRow>(
      "UPDATE mobile_payments SET \
         status = COALESCE($3, status), \
         provider_tx_id = COALESCE($4, provider_tx_id), \
         order_id = COALESCE($5, order_id), \
         completed_at = COALESCE($6, completed_at), \
         retry_count = CASE WHEN $7::int IS NULL THEN retry_count ELSE retry_count + 1 END, \
         updated_at = NOW() \
       WHERE id = $1 AND status = ANY($2) AND ($7::int IS NULL OR retry_count < $7) \
       RETURNING *",
    )
    .bind(id)
    .bind(status_texts(from, PaymentStatus::as_str))
    .bind(change.status.map(|s| s.as_str()))
    .bind(&change.provider_tx_id)
    .bind(change.order_id)
    .bind(change.completed_at)
    .bind(change.retry_below)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;
    match updated {
      Some(row) => Ok(Some(row.try_into()?)),
      None if self.payment_exists(id).await? => Ok(None),
      None => Err(ShopError::not_found("Payment", id)),
    }
  }

  async fn insert_notification(&self, notification: &PaymentNotification) -> ShopResult<()> {
    sqlx::query(
      "INSERT INTO payment_notifications (id, payment_id, provider_code, notification_type, status, raw_payload, \
         is_processed, processing_errors, received_at, processed_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(notification.id)
    .bind(notification.payment_id)
    .bind(notification.provider_code.as_str())
    .bind(notification.notification_type.as_str())
    .bind(&notification.status)
    .bind(&notification.raw_payload)
    .bind(notification.is_processed)
    .bind(&notification.processing_errors)
    .bind(notification.received_at)
    .bind(notification.processed_at)
    .execute(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(())
  }

  async fn list_notifications(&self, payment_id: Uuid) -> ShopResult<Vec<PaymentNotification>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
      "SELECT * FROM payment_notifications WHERE payment_id = $1 ORDER BY received_at",
    )
    .bind(payment_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  // --- analytics ---

  async fn record_metrics(&self, deltas: &[MetricDelta]) -> ShopResult<()> {
    let mut tx = self.begin().await?;
    for delta in deltas {
      apply_metric(&mut tx, delta).await?;
    }
    tx.commit().await.map_err(db_error)
  }

  async fn sales_metrics(&self, range: DateRange) -> ShopResult<Vec<SalesMetric>> {
    let rows = sqlx::query_as::<_, SalesMetricRow>(
      "SELECT * FROM sales_metrics WHERE date BETWEEN $1 AND $2 ORDER BY date",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn inventory_metrics(&self, range: DateRange) -> ShopResult<Vec<InventoryMetric>> {
    let rows = sqlx::query_as::<_, InventoryMetricRow>(
      "SELECT * FROM inventory_metrics WHERE date BETWEEN $1 AND $2 ORDER BY date, product_id",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn customer_metrics(&self, range: DateRange) -> ShopResult<Vec<CustomerMetric>> {
    let rows = sqlx::query_as::<_, CustomerMetricRow>(
      "SELECT * FROM customer_metrics WHERE date BETWEEN $1 AND $2 ORDER BY date",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }

  async fn product_performance(&self, range: DateRange) -> ShopResult<Vec<ProductPerformance>> {
    let rows = sqlx::query_as::<_, ProductPerformanceRow>(
      "SELECT * FROM product_performance WHERE date BETWEEN $1 AND $2 ORDER BY date, product_id",
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    convert_all(rows)
  }
}

async fn insert_history(tx: &mut Transaction<'static, Postgres>, history: &OrderStatusHistory) -> ShopResult<()> {
  sqlx::query(
    "INSERT INTO order_status_history (id, order_id, status, notes, created_by, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6)",
  )
  .bind(history.id)
  .bind(history.order_id)
  .bind(history.status.as_str())
  .bind(&history.notes)
  .bind(history.created_by)
  .bind(history.created_at)
  .execute(&mut **tx)
  .await
  .map_err(db_error)?;
  Ok(())
}

/// Additive upsert of one counter row.
async fn apply_metric(tx: &mut Transaction<'static, Postgres>, delta: &MetricDelta) -> ShopResult<()> {
  let query = match delta {
    MetricDelta::Sales {
      date,
      total_sales,
      order_count,
      refund_amount,
      refund_count,
    } => sqlx::query(
      "INSERT INTO sales_metrics (date, total_sales, order_count, refund_amount, refund_count) \
       VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (date) DO UPDATE SET \
         total_sales = sales_metrics.total_sales + EXCLUDED.total_sales, \
         order_count = sales_metrics.order_count + EXCLUDED.order_count, \
         refund_amount = sales_metrics.refund_amount + EXCLUDED.refund_amount, \
         refund_count = sales_metrics.refund_count + EXCLUDED.refund_count",
    )
    .bind(*date)
    .bind(*total_sales)
    .bind(*order_count)
    .bind(*refund_amount)
    .bind(*refund_count),
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
      sqlx::query(
        "INSERT INTO inventory_metrics (date, product_id, opening_stock, closing_stock, units_sold, \
           units_refunded, restock_amount, low_stock_alerts) \
         VALUES ($1, $2, $3, COALESCE($8, $3), $4, $5, $6, $7) \
         ON CONFLICT (date, product_id) DO UPDATE SET \
           units_sold = inventory_metrics.units_sold + EXCLUDED.units_sold, \
           units_refunded = inventory_metrics.units_refunded + EXCLUDED.units_refunded, \
           restock_amount = inventory_metrics.restock_amount + EXCLUDED.restock_amount, \
           low_stock_alerts = inventory_metrics.low_stock_alerts + EXCLUDED.low_stock_alerts, \
           closing_stock = COALESCE($8, inventory_metrics.closing_stock)",
      )
      .bind(*date)
      .bind(*product_id)
      .bind(opening)
      .bind(*units_sold)
      .bind(*units_refunded)
      .bind(*restock_amount)
      .bind(*low_stock_alerts)
      .bind(*stock_after)
    }
    MetricDelta::Customers {
      date,
      new_customers,
      returning_customers,
      orders_placed,
    } => sqlx::query(
      "INSERT INTO customer_metrics (date, new_customers, returning_customers, orders_placed) \
       VALUES ($1, $2, $3, $4) \
       ON CONFLICT (date) DO UPDATE SET \
         new_customers = customer_metrics.new_customers + EXCLUDED.new_customers, \
         returning_customers = customer_metrics.returning_customers + EXCLUDED.returning_customers, \
         orders_placed = customer_metrics.orders_placed + EXCLUDED.orders_placed",
    )
    .bind(*date)
    .bind(*new_customers)
    .bind(*returning_customers)
    .bind(*orders_placed),
    MetricDelta::Product {
      date,
      product_id,
      views,
      add_to_cart_count,
      purchase_count,
      revenue,
    } => sqlx::query(
      "INSERT INTO product_performance (date, product_id, views, add_to_cart_count, purchase_count, revenue) \
       VALUES ($1, $2, $3, $4, $5, $6) \
       ON CONFLICT (date, product_id) DO UPDATE SET \
         views = product_performance.views + EXCLUDED.views, \
         add_to_cart_count = product_performance.add_to_cart_count + EXCLUDED.add_to_cart_count, \
         purchase_count = product_performance.purchase_count + EXCLUDED.purchase_count, \
         revenue = product_performance.revenue + EXCLUDED.revenue",
    )
    .bind(*date)
    .bind(*product_id)
    .bind(*views)
    .bind(*add_to_cart_count)
    .bind(*purchase_count)
    .bind(*revenue),
  };
  query.execute(&mut **tx).await.map_err(db_error)?;
  Ok(())
}
