// core/src/models/analytics.rs

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ShopError, ShopResult};

use super::round_money;

/// Inclusive day range for metric queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> ShopResult<Self> {
    if start > end {
      return Err(ShopError::Validation("start_date must be before end_date".to_string()));
    }
    Ok(Self { start, end })
  }

  /// The `days` days ending on `today`, inclusive.
  pub fn last_days(today: NaiveDate, days: i64) -> Self {
    Self {
      start: today - Duration::days(days.max(1) - 1),
      end: today,
    }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  pub fn days(&self) -> i64 {
    (self.end - self.start).num_days() + 1
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesMetric {
  pub date: NaiveDate,
  pub total_sales: Decimal,
  pub order_count: i64,
  pub average_order_value: Decimal,
  pub refund_amount: Decimal,
  pub refund_count: i64,
}

impl SalesMetric {
  pub fn empty(date: NaiveDate) -> Self {
    Self {
      date,
      total_sales: Decimal::ZERO,
      order_count: 0,
      average_order_value: Decimal::ZERO,
      refund_amount: Decimal::ZERO,
      refund_count: 0,
    }
  }

  /// Fills the derived average from the stored counters.
  pub fn derive(mut self) -> Self {
    self.average_order_value = if self.order_count > 0 {
      round_money(self.total_sales / Decimal::from(self.order_count))
    } else {
      Decimal::ZERO
    };
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetric {
  pub date: NaiveDate,
  pub product_id: Uuid,
  pub opening_stock: i32,
  pub closing_stock: i32,
  pub units_sold: i32,
  pub units_refunded: i32,
  pub restock_amount: i32,
  pub low_stock_alerts: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMetric {
  pub date: NaiveDate,
  pub new_customers: i32,
  pub returning_customers: i32,
  pub orders_placed: i32,
}

impl CustomerMetric {
  pub fn empty(date: NaiveDate) -> Self {
    Self {
      date,
      new_customers: 0,
      returning_customers: 0,
      orders_placed: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformance {
  pub date: NaiveDate,
  pub product_id: Uuid,
  pub views: i32,
  pub add_to_cart_count: i32,
  pub purchase_count: i32,
  pub revenue: Decimal,
  pub conversion_rate: Decimal,
}

impl ProductPerformance {
  /// Purchases per view, as a percentage with two decimals.
  pub fn derive(mut self) -> Self {
    self.conversion_rate = if self.views > 0 {
      round_money(Decimal::from(self.purchase_count) * Decimal::ONE_HUNDRED / Decimal::from(self.views))
    } else {
      Decimal::ZERO
    };
    self
  }
}

/// One atomic increment against a per-day counter row. Stores apply these as
/// upserts that add to existing values.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricDelta {
  Sales {
    date: NaiveDate,
    total_sales: Decimal,
    order_count: i64,
    refund_amount: Decimal,
    refund_count: i64,
  },
  Inventory {
    date: NaiveDate,
    product_id: Uuid,
    units_sold: i32,
    units_refunded: i32,
    restock_amount: i32,
    low_stock_alerts: i32,
    /// Stock level before the event; becomes `opening_stock` when the row is created.
    stock_before: Option<i32>,
    /// Stock level after the event; overwrites `closing_stock`.
    stock_after: Option<i32>,
  },
  Customers {
    date: NaiveDate,
    new_customers: i32,
    returning_customers: i32,
    orders_placed: i32,
  },
  Product {
    date: NaiveDate,
    product_id: Uuid,
    views: i32,
    add_to_cart_count: i32,
    purchase_count: i32,
    revenue: Decimal,
  },
}

impl MetricDelta {
  pub fn date(&self) -> NaiveDate {
    match self {
      MetricDelta::Sales { date, .. }
      | MetricDelta::Inventory { date, .. }
      | MetricDelta::Customers { date, .. }
      | MetricDelta::Product { date, .. } => *date,
    }
  }

  pub fn product_view(date: NaiveDate, product_id: Uuid) -> Self {
    MetricDelta::Product {
      date,
      product_id,
      views: 1,
      add_to_cart_count: 0,
      purchase_count: 0,
      revenue: Decimal::ZERO,
    }
  }

  pub fn add_to_cart(date: NaiveDate, product_id: Uuid) -> Self {
    MetricDelta::Product {
      date,
      product_id,
      views: 0,
      add_to_cart_count: 1,
      purchase_count: 0,
      revenue: Decimal::ZERO,
    }
  }

  pub fn new_customer(date: NaiveDate) -> Self {
    MetricDelta::Customers {
      date,
      new_customers: 1,
      returning_customers: 0,
      orders_placed: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
  }

  #[test]
  fn date_range_rejects_reversed_bounds() {
    assert!(DateRange::new(day(3), day(2)).is_err());
    let range = DateRange::new(day(2), day(2)).unwrap();
    assert_eq!(range.days(), 1);
  }

  #[test]
  fn last_days_is_inclusive() {
    let range = DateRange::last_days(day(30), 30);
    assert_eq!(range.start, day(1));
    assert!(range.contains(day(30)));
    assert!(!range.contains(day(31)));
  }

  #[test]
  fn derived_values() {
    let sales = SalesMetric {
      total_sales: dec!(100),
      order_count: 3,
      ..SalesMetric::empty(day(1))
    }
    .derive();
    assert_eq!(sales.average_order_value, dec!(33.33));

    let perf = ProductPerformance {
      date: day(1),
      product_id: Uuid::new_v4(),
      views: 8,
      add_to_cart_count: 2,
      purchase_count: 1,
      revenue: dec!(5),
      conversion_rate: Decimal::ZERO,
    }
    .derive();
    assert_eq!(perf.conversion_rate, dec!(12.50));
  }
}
