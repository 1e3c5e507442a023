// core/src/services/analytics.rs

//! Per-day counters and the reports built from them.
//!
//! Events are translated into `MetricDelta`s and handed to the store, which
//! applies them as additive upserts. Recording never fails the business
//! operation that emitted the event; a failed write is logged.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::ShopResult;
use crate::models::{
  round_money, CustomerMetric, DateRange, InventoryMetric, MetricDelta, Order, OrderItem, ProductPerformance,
  SalesMetric,
};
use crate::store::DynStore;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
  pub product_id: Uuid,
  pub revenue: Decimal,
  pub purchase_count: i32,
  pub views: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
  pub range: DateRange,
  pub total_sales: Decimal,
  pub total_orders: i64,
  pub average_order_value: Decimal,
  pub total_refunds: Decimal,
  pub new_customers: i32,
  pub returning_customers: i32,
  /// Returning customers as a percentage of all ordering customers.
  pub customer_retention_rate: Decimal,
  /// Units sold per unit of average stock held.
  pub inventory_turnover: Decimal,
  pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
  pub range: DateRange,
  pub sales: Vec<SalesMetric>,
  pub inventory: Vec<InventoryMetric>,
  pub customers: Vec<CustomerMetric>,
  pub products: Vec<ProductPerformance>,
  pub summary: AnalyticsSummary,
}

#[derive(Clone)]
pub struct AnalyticsService {
  store: DynStore,
}

impl AnalyticsService {
  pub fn new(store: DynStore) -> Self {
    Self { store }
  }

  fn today() -> NaiveDate {
    Utc::now().date_naive()
  }

  async fn record(&self, deltas: Vec<MetricDelta>) {
    if deltas.is_empty() {
      return;
    }
    if let Err(e) = self.store.record_metrics(&deltas).await {
      warn!(error = %e, count = deltas.len(), "Failed to record analytics increments.");
    }
  }

  pub async fn product_viewed(&self, product_id: Uuid) {
    self.record(vec![MetricDelta::product_view(Self::today(), product_id)]).await;
  }

  pub async fn added_to_cart(&self, product_id: Uuid) {
    self.record(vec![MetricDelta::add_to_cart(Self::today(), product_id)]).await;
  }

  pub async fn customer_registered(&self) {
    self.record(vec![MetricDelta::new_customer(Self::today())]).await;
  }

  /// A new order was placed; `returning` when the customer ordered before.
  pub async fn order_placed(&self, returning: bool) {
    self
      .record(vec![MetricDelta::Customers {
        date: Self::today(),
        new_customers: 0,
        returning_customers: i32::from(returning),
        orders_placed: 1,
      }])
      .await;
  }

  /// Stock changed through a movement. `restocked` is the amount added by an
  /// IN movement; `low` is whether the new level is at or below threshold.
  pub async fn stock_changed(&self, product_id: Uuid, before: i32, after: i32, restocked: i32, low: bool) {
    self
      .record(vec![MetricDelta::Inventory {
        date: Self::today(),
        product_id,
        units_sold: 0,
        units_refunded: 0,
        restock_amount: restocked,
        low_stock_alerts: i32::from(low),
        stock_before: Some(before),
        stock_after: Some(after),
      }])
      .await;
  }

  /// Sales, units sold and product revenue for an order entering `completed`.
  #[instrument(skip(self, order, items), fields(order_id = %order.id))]
  pub async fn order_completed(&self, order: &Order, items: &[OrderItem]) {
    let date = Self::today();
    let mut deltas = vec![MetricDelta::Sales {
      date,
      total_sales: order.total,
      order_count: 1,
      refund_amount: Decimal::ZERO,
      refund_count: 0,
    }];
    for item in items {
      deltas.push(MetricDelta::Inventory {
        date,
        product_id: item.product_id,
        units_sold: item.quantity,
        units_refunded: 0,
        restock_amount: 0,
        low_stock_alerts: 0,
        stock_before: None,
        stock_after: None,
      });
      deltas.push(MetricDelta::Product {
        date,
        product_id: item.product_id,
        views: 0,
        add_to_cart_count: 0,
        purchase_count: item.quantity,
        revenue: item.subtotal,
      });
    }
    self.record(deltas).await;
  }

  #[instrument(skip(self, order, items), fields(order_id = %order.id))]
  pub async fn order_refunded(&self, order: &Order, items: &[OrderItem]) {
    let date = Self::today();
    let mut deltas = vec![MetricDelta::Sales {
      date,
      total_sales: Decimal::ZERO,
      order_count: 0,
      refund_amount: order.total,
      refund_count: 1,
    }];
    for item in items {
      deltas.push(MetricDelta::Inventory {
        date,
        product_id: item.product_id,
        units_sold: 0,
        units_refunded: item.quantity,
        restock_amount: 0,
        low_stock_alerts: 0,
        stock_before: None,
        stock_after: None,
      });
    }
    self.record(deltas).await;
  }

  pub fn default_range() -> DateRange {
    DateRange::last_days(Self::today(), DEFAULT_WINDOW_DAYS)
  }

  pub async fn sales(&self, range: DateRange) -> ShopResult<Vec<SalesMetric>> {
    self.store.sales_metrics(range).await
  }

  pub async fn inventory(&self, range: DateRange) -> ShopResult<Vec<InventoryMetric>> {
    self.store.inventory_metrics(range).await
  }

  pub async fn customers(&self, range: DateRange) -> ShopResult<Vec<CustomerMetric>> {
    self.store.customer_metrics(range).await
  }

  pub async fn products(&self, range: DateRange) -> ShopResult<Vec<ProductPerformance>> {
    self.store.product_performance(range).await
  }

  #[instrument(skip(self))]
  pub async fn summary(&self, range: DateRange) -> ShopResult<AnalyticsSummary> {
    let sales = self.sales(range).await?;
    let inventory = self.inventory(range).await?;
    let customers = self.customers(range).await?;
    let products = self.products(range).await?;
    Ok(summarize(range, &sales, &inventory, &customers, &products))
  }

  #[instrument(skip(self))]
  pub async fn report(&self, range: DateRange) -> ShopResult<AnalyticsReport> {
    let sales = self.sales(range).await?;
    let inventory = self.inventory(range).await?;
    let customers = self.customers(range).await?;
    let products = self.products(range).await?;
    let summary = summarize(range, &sales, &inventory, &customers, &products);
    Ok(AnalyticsReport {
      range,
      sales,
      inventory,
      customers,
      products,
      summary,
    })
  }
}

fn percentage(part: Decimal, whole: Decimal) -> Decimal {
  if whole.is_zero() {
    Decimal::ZERO
  } else {
    round_money(part * Decimal::ONE_HUNDRED / whole)
  }
}

fn summarize(
  range: DateRange,
  sales: &[SalesMetric],
  inventory: &[InventoryMetric],
  customers: &[CustomerMetric],
  products: &[ProductPerformance],
) -> AnalyticsSummary {
  let total_sales: Decimal = sales.iter().map(|s| s.total_sales).sum();
  let total_orders: i64 = sales.iter().map(|s| s.order_count).sum();
  let total_refunds: Decimal = sales.iter().map(|s| s.refund_amount).sum();
  let average_order_value = if total_orders > 0 {
    round_money(total_sales / Decimal::from(total_orders))
  } else {
    Decimal::ZERO
  };

  let new_customers: i32 = customers.iter().map(|c| c.new_customers).sum();
  let returning_customers: i32 = customers.iter().map(|c| c.returning_customers).sum();
  let orders_placed: i32 = customers.iter().map(|c| c.orders_placed).sum();
  let customer_retention_rate = percentage(Decimal::from(returning_customers), Decimal::from(orders_placed));

  let units_sold: i64 = inventory.iter().map(|m| i64::from(m.units_sold)).sum();
  let stock_points: i64 = inventory
    .iter()
    .map(|m| i64::from(m.opening_stock) + i64::from(m.closing_stock))
    .sum();
  let inventory_turnover = if stock_points > 0 && !inventory.is_empty() {
    // Average of opening and closing levels across all product-days.
    let average_stock = Decimal::from(stock_points) / Decimal::from(2 * inventory.len() as i64);
    if average_stock.is_zero() {
      Decimal::ZERO
    } else {
      round_money(Decimal::from(units_sold) / average_stock)
    }
  } else {
    Decimal::ZERO
  };

  let mut per_product: HashMap<Uuid, TopProduct> = HashMap::new();
  for row in products {
    let entry = per_product.entry(row.product_id).or_insert(TopProduct {
      product_id: row.product_id,
      revenue: Decimal::ZERO,
      purchase_count: 0,
      views: 0,
    });
    entry.revenue += row.revenue;
    entry.purchase_count += row.purchase_count;
    entry.views += row.views;
  }
  let mut top_products: Vec<TopProduct> = per_product.into_values().collect();
  top_products.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.product_id.cmp(&b.product_id)));
  top_products.truncate(TOP_PRODUCTS);

  AnalyticsSummary {
    range,
    total_sales,
    total_orders,
    average_order_value,
    total_refunds,
    new_customers,
    returning_customers,
    customer_retention_rate,
    inventory_turnover,
    top_products,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
  }

  #[test]
  fn summary_totals_and_ranking() {
    let range = DateRange::new(day(1), day(2)).unwrap();
    let sales = vec![
      SalesMetric {
        total_sales: dec!(300),
        order_count: 2,
        ..SalesMetric::empty(day(1))
      },
      SalesMetric {
        total_sales: dec!(100),
        order_count: 1,
        refund_amount: dec!(50),
        refund_count: 1,
        ..SalesMetric::empty(day(2))
      },
    ];
    let customers = vec![CustomerMetric {
      date: day(1),
      new_customers: 3,
      returning_customers: 1,
      orders_placed: 4,
    }];
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let products = vec![
      ProductPerformance {
        date: day(1),
        product_id: a,
        views: 10,
        add_to_cart_count: 2,
        purchase_count: 1,
        revenue: dec!(40),
        conversion_rate: Decimal::ZERO,
      },
      ProductPerformance {
        date: day(2),
        product_id: b,
        views: 3,
        add_to_cart_count: 1,
        purchase_count: 2,
        revenue: dec!(90),
        conversion_rate: Decimal::ZERO,
      },
      ProductPerformance {
        date: day(2),
        product_id: a,
        views: 1,
        add_to_cart_count: 0,
        purchase_count: 1,
        revenue: dec!(40),
        conversion_rate: Decimal::ZERO,
      },
    ];
    let inventory = vec![InventoryMetric {
      date: day(1),
      product_id: a,
      opening_stock: 10,
      closing_stock: 6,
      units_sold: 4,
      units_refunded: 0,
      restock_amount: 0,
      low_stock_alerts: 1,
    }];

    let summary = summarize(range, &sales, &inventory, &customers, &products);
    assert_eq!(summary.total_sales, dec!(400));
    assert_eq!(summary.total_orders, 3);
    assert_eq!(summary.average_order_value, dec!(133.33));
    assert_eq!(summary.total_refunds, dec!(50));
    assert_eq!(summary.customer_retention_rate, dec!(25.00));
    assert_eq!(summary.inventory_turnover, dec!(0.50));
    assert_eq!(summary.top_products[0].product_id, b);
    assert_eq!(summary.top_products[1].revenue, dec!(80));
  }

  #[test]
  fn empty_window_is_all_zero() {
    let range = DateRange::new(day(1), day(1)).unwrap();
    let summary = summarize(range, &[], &[], &[], &[]);
    assert_eq!(summary.total_sales, Decimal::ZERO);
    assert_eq!(summary.average_order_value, Decimal::ZERO);
    assert!(summary.top_products.is_empty());
  }
}
