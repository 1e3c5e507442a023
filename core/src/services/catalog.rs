// core/src/services/catalog.rs

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::analytics::AnalyticsService;
use crate::error::{ShopError, ShopResult};
use crate::models::catalog::slugify;
use crate::models::catalog::{MAX_RATING, MIN_RATING};
use crate::models::{
  round_money, Category, Inventory, MovementType, Product, ProductFilter, ProductImage, ProductReview, ReviewSummary,
  StockMovement, User,
};
use crate::store::{DynStore, ProductQuery};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
  pub name: String,
  pub slug: Option<String>,
  pub parent_id: Option<Uuid>,
  pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
  pub category_id: Uuid,
  pub name: String,
  pub slug: Option<String>,
  pub description: Option<String>,
  pub price: Decimal,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub initial_stock: i32,
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockMovementInput {
  pub movement_type: MovementType,
  pub quantity: i32,
  pub reference: Option<String>,
  pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInput {
  pub image_url: String,
  pub alt_text: Option<String>,
  #[serde(default)]
  pub is_primary: bool,
  #[serde(default)]
  pub is_feature: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
  pub rating: i32,
  pub comment: String,
}

/// Product with its current stock, images and rating, as returned by the
/// catalog endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
  #[serde(flatten)]
  pub product: Product,
  pub stock: i32,
  pub in_stock: bool,
  pub images: Vec<ProductImage>,
  #[serde(flatten)]
  pub reviews: ReviewSummary,
}

/// Ids of `root` and every category below it.
pub fn descendant_ids(categories: &[Category], root: Uuid) -> Vec<Uuid> {
  let mut ids = vec![root];
  let mut frontier = vec![root];
  while let Some(parent) = frontier.pop() {
    for child in categories.iter().filter(|c| c.parent_id == Some(parent)) {
      if !ids.contains(&child.id) {
        ids.push(child.id);
        frontier.push(child.id);
      }
    }
  }
  ids
}

#[derive(Clone)]
pub struct CatalogService {
  store: DynStore,
  analytics: AnalyticsService,
}

impl CatalogService {
  pub fn new(store: DynStore, analytics: AnalyticsService) -> Self {
    Self { store, analytics }
  }

  #[instrument(skip(self, input), fields(name = %input.name))]
  pub async fn create_category(&self, input: NewCategory) -> ShopResult<Category> {
    if input.name.trim().is_empty() {
      return Err(ShopError::Validation("Category name is required".to_string()));
    }
    let slug = input
      .slug
      .as_deref()
      .map(slugify)
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| slugify(&input.name));
    if slug.is_empty() {
      return Err(ShopError::Validation("Category slug cannot be empty".to_string()));
    }
    if let Some(parent_id) = input.parent_id {
      let all = self.store.list_categories(false).await?;
      if !all.iter().any(|c| c.id == parent_id) {
        return Err(ShopError::not_found("Parent category", parent_id));
      }
    }
    let category = Category {
      id: Uuid::new_v4(),
      name: input.name.trim().to_string(),
      slug,
      parent_id: input.parent_id,
      description: input.description,
      is_active: true,
      created_at: Utc::now(),
    };
    self.store.insert_category(&category).await?;
    Ok(category)
  }

  pub async fn list_categories(&self) -> ShopResult<Vec<Category>> {
    self.store.list_categories(true).await
  }

  /// The category with `slug` and all of its descendants.
  pub async fn category_tree(&self, slug: &str) -> ShopResult<Vec<Category>> {
    let root = self
      .store
      .find_category_by_slug(slug)
      .await?
      .ok_or_else(|| ShopError::not_found("Category", slug))?;
    let all = self.store.list_categories(false).await?;
    let ids = descendant_ids(&all, root.id);
    Ok(all.into_iter().filter(|c| ids.contains(&c.id)).collect())
  }

  #[instrument(skip(self, input), fields(name = %input.name))]
  pub async fn create_product(&self, input: ProductInput) -> ShopResult<ProductDetail> {
    let now = Utc::now();
    let product = self.validated_product(Uuid::new_v4(), &input, now, now).await?;
    if input.initial_stock < 0 {
      return Err(ShopError::Validation("initial_stock cannot be negative".to_string()));
    }
    self.store.insert_product(&product, input.initial_stock).await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created.");
    Ok(ProductDetail {
      in_stock: input.initial_stock > 0,
      stock: input.initial_stock,
      product,
      images: Vec::new(),
      reviews: ReviewSummary::default(),
    })
  }

  #[instrument(skip(self, input))]
  pub async fn update_product(&self, id: Uuid, input: ProductInput) -> ShopResult<ProductDetail> {
    let existing = self
      .store
      .get_product(id)
      .await?
      .ok_or_else(|| ShopError::not_found("Product", id))?;
    let product = self.validated_product(id, &input, existing.created_at, Utc::now()).await?;
    self.store.update_product(&product).await?;
    self.detail(product).await
  }

  async fn validated_product(
    &self,
    id: Uuid,
    input: &ProductInput,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
  ) -> ShopResult<Product> {
    if input.name.trim().is_empty() {
      return Err(ShopError::Validation("Product name is required".to_string()));
    }
    if input.price < Decimal::ZERO {
      return Err(ShopError::Validation("Price cannot be negative".to_string()));
    }
    let categories = self.store.list_categories(false).await?;
    if !categories.iter().any(|c| c.id == input.category_id) {
      return Err(ShopError::not_found("Category", input.category_id));
    }
    let slug = input
      .slug
      .as_deref()
      .map(slugify)
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| slugify(&input.name));
    Ok(Product {
      id,
      category_id: input.category_id,
      name: input.name.trim().to_string(),
      slug,
      description: input.description.clone(),
      price: round_money(input.price),
      is_active: input.is_active,
      created_at,
      updated_at,
    })
  }

  async fn detail(&self, product: Product) -> ShopResult<ProductDetail> {
    let stock = self
      .store
      .get_inventory(product.id)
      .await?
      .map_or(0, |i| i.quantity);
    let images = self.store.list_product_images(product.id).await?;
    let reviews = self.store.list_reviews(product.id).await?;
    Ok(ProductDetail {
      product,
      stock,
      in_stock: stock > 0,
      images,
      reviews: ReviewSummary::from_ratings(reviews.iter().map(|r| r.rating)),
    })
  }

  async fn active_product(&self, slug: &str) -> ShopResult<Product> {
    self
      .store
      .find_product_by_slug(slug)
      .await?
      .filter(|p| p.is_active)
      .ok_or_else(|| ShopError::not_found("Product", slug))
  }

  /// Active product by slug. Counts as a product view.
  #[instrument(skip(self))]
  pub async fn get_product(&self, slug: &str) -> ShopResult<ProductDetail> {
    let product = self.active_product(slug).await?;
    self.analytics.product_viewed(product.id).await;
    self.detail(product).await
  }

  #[instrument(skip(self))]
  pub async fn list_products(&self, filter: &ProductFilter) -> ShopResult<Vec<ProductDetail>> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
      if min > max {
        return Err(ShopError::Validation("min_price cannot exceed max_price".to_string()));
      }
    }
    let category_ids = match filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
      Some(slug) => Some(self.category_tree(slug).await?.into_iter().map(|c| c.id).collect()),
      None => None,
    };
    let query = ProductQuery {
      category_ids,
      min_price: filter.min_price,
      max_price: filter.max_price,
      in_stock: filter.in_stock,
      search: filter.search.clone(),
      active_only: true,
    };
    let products = self.store.list_products(&query).await?;
    let mut details = Vec::with_capacity(products.len());
    for product in products {
      details.push(self.detail(product).await?);
    }
    Ok(details)
  }

  pub async fn list_reviews(&self, slug: &str) -> ShopResult<Vec<ProductReview>> {
    let product = self.active_product(slug).await?;
    self.store.list_reviews(product.id).await
  }

  /// One review per user and product. Reviews start unapproved.
  #[instrument(skip(self, user, input), fields(user_id = %user.id, rating = input.rating))]
  pub async fn create_review(&self, user: &User, slug: &str, input: ReviewInput) -> ShopResult<ProductReview> {
    if !(MIN_RATING..=MAX_RATING).contains(&input.rating) {
      return Err(ShopError::Validation(format!(
        "Rating must be between {} and {}",
        MIN_RATING, MAX_RATING
      )));
    }
    let comment = input.comment.trim();
    if comment.is_empty() {
      return Err(ShopError::Validation("Review comment is required".to_string()));
    }
    let product = self.active_product(slug).await?;
    let review = ProductReview {
      id: Uuid::new_v4(),
      product_id: product.id,
      user_id: user.id,
      rating: input.rating,
      comment: comment.to_string(),
      is_verified_purchase: self.store.has_purchased(user.id, product.id).await?,
      is_approved: false,
      created_at: Utc::now(),
    };
    self.store.insert_review(&review).await?;
    info!(review_id = %review.id, product_id = %product.id, verified = review.is_verified_purchase, "Review created.");
    Ok(review)
  }

  #[instrument(skip(self, input))]
  pub async fn add_product_image(&self, product_id: Uuid, input: ImageInput) -> ShopResult<ProductImage> {
    let image_url = input.image_url.trim();
    if image_url.is_empty() {
      return Err(ShopError::Validation("image_url is required".to_string()));
    }
    let image = ProductImage {
      id: Uuid::new_v4(),
      product_id,
      image_url: image_url.to_string(),
      alt_text: input.alt_text.filter(|a| !a.trim().is_empty()),
      is_primary: input.is_primary,
      is_feature: input.is_feature,
      created_at: Utc::now(),
    };
    self.store.insert_product_image(&image).await?;
    debug!(image_id = %image.id, primary = image.is_primary, "Product image added.");
    Ok(image)
  }

  /// Applies a stock movement and records inventory analytics.
  #[instrument(skip(self, input), fields(movement = %input.movement_type, quantity = input.quantity))]
  pub async fn record_stock_movement(&self, product_id: Uuid, input: StockMovementInput) -> ShopResult<Inventory> {
    if input.quantity < 0 || (input.quantity == 0 && input.movement_type != MovementType::Adjustment) {
      return Err(ShopError::Validation("Quantity must be positive".to_string()));
    }
    let movement = StockMovement {
      id: Uuid::new_v4(),
      product_id,
      movement_type: input.movement_type,
      quantity: input.quantity,
      reference: input.reference,
      notes: input.notes,
      created_at: Utc::now(),
    };
    let (before, inventory) = self.store.apply_stock_movement(&movement).await?;
    let restocked = if movement.movement_type == MovementType::In {
      movement.quantity
    } else {
      0
    };
    self
      .analytics
      .stock_changed(product_id, before, inventory.quantity, restocked, inventory.is_low())
      .await;
    info!(before, after = inventory.quantity, "Stock movement applied.");
    Ok(inventory)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn category(name: &str, parent: Option<Uuid>) -> Category {
    Category {
      id: Uuid::new_v4(),
      name: name.to_string(),
      slug: slugify(name),
      parent_id: parent,
      description: None,
      is_active: true,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn descendants_include_self_and_grandchildren() {
    let herbs = category("Herbs", None);
    let fresh = category("Fresh", Some(herbs.id));
    let basil = category("Basil", Some(fresh.id));
    let spices = category("Spices", None);
    let all = vec![herbs.clone(), fresh.clone(), basil.clone(), spices.clone()];
    let ids = descendant_ids(&all, herbs.id);
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&basil.id));
    assert!(!ids.contains(&spices.id));
  }
}
