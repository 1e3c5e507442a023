// core/src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
  pub id: Uuid,
  pub name: String,
  pub slug: String,
  pub parent_id: Option<Uuid>,
  pub description: Option<String>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
  pub product_id: Uuid,
  pub quantity: i32,
  pub low_stock_threshold: i32,
  pub updated_at: DateTime<Utc>,
}

impl Inventory {
  pub fn new(product_id: Uuid, quantity: i32) -> Self {
    Self {
      product_id,
      quantity,
      low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
      updated_at: Utc::now(),
    }
  }

  pub fn is_low(&self) -> bool {
    self.quantity <= self.low_stock_threshold
  }
}

string_enum! {
  pub enum MovementType {
    In => "IN",
    Out => "OUT",
    Adjustment => "ADJ",
  }
}

impl MovementType {
  /// Quantity after applying a movement of `amount` to `current`, or `None`
  /// when the result would be negative.
  pub fn apply(&self, current: i32, amount: i32) -> Option<i32> {
    let next = match self {
      MovementType::In => current.checked_add(amount)?,
      MovementType::Out => current.checked_sub(amount)?,
      MovementType::Adjustment => amount,
    };
    (next >= 0).then_some(next)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
  pub id: Uuid,
  pub product_id: Uuid,
  pub movement_type: MovementType,
  pub quantity: i32,
  pub reference: Option<String>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
  pub id: Uuid,
  pub product_id: Uuid,
  pub image_url: String,
  pub alt_text: Option<String>,
  /// At most one image per product is primary.
  pub is_primary: bool,
  pub is_feature: bool,
  pub created_at: DateTime<Utc>,
}

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReview {
  pub id: Uuid,
  pub product_id: Uuid,
  pub user_id: Uuid,
  pub rating: i32,
  pub comment: String,
  /// The author has a paid order containing the product.
  pub is_verified_purchase: bool,
  pub is_approved: bool,
  pub created_at: DateTime<Utc>,
}

/// Rating aggregate shown on product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
  pub average_rating: Option<Decimal>,
  pub review_count: i64,
}

impl ReviewSummary {
  pub fn from_ratings(ratings: impl IntoIterator<Item = i32>) -> Self {
    let (sum, count) = ratings
      .into_iter()
      .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));
    let average_rating = (count > 0).then(|| (Decimal::from(sum) / Decimal::from(count)).round_dp(2));
    Self {
      average_rating,
      review_count: count,
    }
  }
}

/// Query parameters accepted by the product listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
  pub category: Option<String>,
  pub min_price: Option<Decimal>,
  pub max_price: Option<Decimal>,
  pub in_stock: Option<bool>,
  pub search: Option<String>,
}

/// Lowercase, dash separated slug. Non alphanumeric runs collapse into one dash.
pub fn slugify(text: &str) -> String {
  let mut slug = String::with_capacity(text.len());
  let mut pending_dash = false;
  for ch in text.chars() {
    if ch.is_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.extend(ch.to_lowercase());
    } else {
      pending_dash = true;
    }
  }
  slug
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slugify_collapses_separators() {
    assert_eq!(slugify("Fresh  Herbs & Spices"), "fresh-herbs-spices");
    assert_eq!(slugify("  Mint--Leaves "), "mint-leaves");
    assert_eq!(slugify("!!!"), "");
  }

  #[test]
  fn review_summary_averages_to_two_places() {
    let empty = ReviewSummary::from_ratings(Vec::new());
    assert_eq!(empty.average_rating, None);
    assert_eq!(empty.review_count, 0);

    let summary = ReviewSummary::from_ratings([5, 4, 4]);
    assert_eq!(summary.review_count, 3);
    assert_eq!(summary.average_rating, Some(Decimal::new(433, 2)));
  }

  #[test]
  fn movements_never_go_negative() {
    assert_eq!(MovementType::In.apply(5, 3), Some(8));
    assert_eq!(MovementType::Out.apply(5, 3), Some(2));
    assert_eq!(MovementType::Out.apply(2, 3), None);
    assert_eq!(MovementType::Adjustment.apply(99, 4), Some(4));
    assert_eq!(MovementType::Adjustment.apply(4, -1), None);
  }
}
