// core/src/services/cart.rs

use tracing::{info, instrument};
use uuid::Uuid;

use super::analytics::AnalyticsService;
use super::ensure_no_payment_in_progress;
use crate::error::{ShopError, ShopResult};
use crate::models::{Cart, CartView, User};
use crate::store::DynStore;

#[derive(Clone)]
pub struct CartService {
  store: DynStore,
  analytics: AnalyticsService,
}

impl CartService {
  pub fn new(store: DynStore, analytics: AnalyticsService) -> Self {
    Self { store, analytics }
  }

  async fn view(&self, cart: &Cart) -> ShopResult<CartView> {
    let lines = self.store.cart_lines(cart.id).await?;
    Ok(CartView::new(cart, lines))
  }

  pub async fn get_cart(&self, user: &User) -> ShopResult<CartView> {
    let cart = self.store.get_or_create_cart(user.id).await?;
    self.view(&cart).await
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn add_item(&self, user: &User, product_id: Uuid, quantity: i32) -> ShopResult<CartView> {
    if quantity <= 0 {
      return Err(ShopError::Validation("Quantity must be greater than zero".to_string()));
    }
    let product = self
      .store
      .get_product(product_id)
      .await?
      .ok_or_else(|| ShopError::not_found("Product", product_id))?;
    if !product.is_active {
      return Err(ShopError::Validation(format!("{} is not available", product.name)));
    }
    ensure_no_payment_in_progress(&self.store, user.id).await?;
    let cart = self.store.get_or_create_cart(user.id).await?;
    let item = self.store.add_cart_item(cart.id, product_id, quantity).await?;
    info!(item_id = %item.id, quantity = item.quantity, "Cart item added.");
    self.analytics.added_to_cart(product_id).await;
    self.view(&cart).await
  }

  async fn owned_item(&self, cart: &Cart, item_id: Uuid) -> ShopResult<()> {
    match self.store.get_cart_item(item_id).await? {
      Some(item) if item.cart_id == cart.id => Ok(()),
      _ => Err(ShopError::not_found("Cart item", item_id)),
    }
  }

  /// Sets a line's quantity; zero or less removes the line.
  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn update_item(&self, user: &User, item_id: Uuid, quantity: i32) -> ShopResult<CartView> {
    let cart = self.store.get_or_create_cart(user.id).await?;
    self.owned_item(&cart, item_id).await?;
    ensure_no_payment_in_progress(&self.store, user.id).await?;
    self.store.set_cart_item_quantity(item_id, quantity).await?;
    self.view(&cart).await
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn remove_item(&self, user: &User, item_id: Uuid) -> ShopResult<CartView> {
    let cart = self.store.get_or_create_cart(user.id).await?;
    self.owned_item(&cart, item_id).await?;
    ensure_no_payment_in_progress(&self.store, user.id).await?;
    self.store.delete_cart_item(item_id).await?;
    self.view(&cart).await
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn clear(&self, user: &User) -> ShopResult<CartView> {
    ensure_no_payment_in_progress(&self.store, user.id).await?;
    let cart = self.store.get_or_create_cart(user.id).await?;
    self.store.clear_cart(cart.id).await?;
    self.view(&cart).await
  }
}
