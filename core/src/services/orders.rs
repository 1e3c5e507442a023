// core/src/services/orders.rs

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::analytics::AnalyticsService;
use super::ensure_staff;
use crate::error::{ShopError, ShopResult};
use crate::models::{Order, OrderItem, OrderNote, OrderPaymentStatus, OrderStatus, OrderStatusHistory, User};
use crate::store::DynStore;

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
  pub status_history: Vec<OrderStatusHistory>,
  pub notes: Vec<OrderNote>,
}

#[derive(Clone)]
pub struct OrdersService {
  store: DynStore,
  analytics: AnalyticsService,
}

impl OrdersService {
  pub fn new(store: DynStore, analytics: AnalyticsService) -> Self {
    Self { store, analytics }
  }

  async fn load(&self, id: Uuid) -> ShopResult<Order> {
    self
      .store
      .get_order(id)
      .await?
      .ok_or_else(|| ShopError::not_found("Order", id))
  }

  /// Loads an order visible to `user`: their own, or any order for staff.
  async fn visible(&self, user: &User, id: Uuid) -> ShopResult<Order> {
    let order = self.load(id).await?;
    if order.user_id != user.id && !user.is_staff {
      return Err(ShopError::not_found("Order", id));
    }
    Ok(order)
  }

  pub async fn list_orders(&self, user: &User) -> ShopResult<Vec<Order>> {
    self.store.list_orders(Some(user.id)).await
  }

  pub async fn list_all_orders(&self, user: &User) -> ShopResult<Vec<Order>> {
    ensure_staff(user)?;
    self.store.list_orders(None).await
  }

  /// Order with items, history and notes. Private notes are staff-only.
  pub async fn get_order(&self, user: &User, id: Uuid) -> ShopResult<OrderDetail> {
    let order = self.visible(user, id).await?;
    let items = self.store.order_items(id).await?;
    let status_history = self.store.order_history(id).await?;
    let notes = self
      .store
      .order_notes(id)
      .await?
      .into_iter()
      .filter(|n| n.is_public || user.is_staff)
      .collect();
    Ok(OrderDetail {
      order,
      items,
      status_history,
      notes,
    })
  }

  #[instrument(skip(self, user, note), fields(user_id = %user.id))]
  pub async fn add_note(&self, user: &User, id: Uuid, note: &str, is_public: bool) -> ShopResult<OrderNote> {
    let order = self.visible(user, id).await?;
    if note.trim().is_empty() {
      return Err(ShopError::Validation("Note cannot be empty".to_string()));
    }
    let note = OrderNote {
      id: Uuid::new_v4(),
      order_id: order.id,
      note: note.trim().to_string(),
      // Customers cannot write notes hidden from themselves.
      is_public: is_public || !user.is_staff,
      created_by: Some(user.id),
      created_at: Utc::now(),
    };
    self.store.insert_order_note(&note).await?;
    Ok(note)
  }

  /// Validated status change with history. Emits sales analytics when the
  /// order enters `completed` or `refunded`.
  async fn transition(
    &self,
    order: Order,
    next: OrderStatus,
    notes: Option<String>,
    actor: Option<Uuid>,
  ) -> ShopResult<Order> {
    if !order.status.can_transition_to(next) {
      return Err(ShopError::InvalidState(format!(
        "Cannot change order status from {} to {}",
        order.status, next
      )));
    }
    let expected = order.status;
    let mut updated = order;
    updated.apply_status(next, Utc::now());
    let history = OrderStatusHistory::new(updated.id, next, notes, actor);
    if !self.store.update_order_status(&updated, expected, &history).await? {
      warn!(order_id = %updated.id, "Order status changed concurrently.");
      return Err(ShopError::Conflict("Order was modified by another request".to_string()));
    }
    info!(order_id = %updated.id, from = %expected, to = %next, "Order status updated.");

    match next {
      OrderStatus::Completed => {
        let items = self.store.order_items(updated.id).await?;
        self.analytics.order_completed(&updated, &items).await;
      }
      OrderStatus::Refunded => {
        let items = self.store.order_items(updated.id).await?;
        self.analytics.order_refunded(&updated, &items).await;
      }
      _ => {}
    }
    Ok(updated)
  }

  #[instrument(skip(self, user, notes), fields(user_id = %user.id))]
  pub async fn update_status(
    &self,
    user: &User,
    id: Uuid,
    status: OrderStatus,
    notes: Option<String>,
  ) -> ShopResult<Order> {
    ensure_staff(user)?;
    let order = self.load(id).await?;
    self.transition(order, status, notes, Some(user.id)).await
  }

  #[instrument(skip(self, user), fields(user_id = %user.id))]
  pub async fn update_tracking(&self, user: &User, id: Uuid, tracking_number: &str) -> ShopResult<Order> {
    ensure_staff(user)?;
    if tracking_number.trim().is_empty() {
      return Err(ShopError::Validation("tracking_number is required".to_string()));
    }
    self
      .store
      .set_order_tracking(id, tracking_number.trim())
      .await?
      .ok_or_else(|| ShopError::not_found("Order", id))
  }

  /// Customer or staff cancellation, allowed while pending or processing.
  #[instrument(skip(self, user, reason), fields(user_id = %user.id))]
  pub async fn cancel(&self, user: &User, id: Uuid, reason: Option<String>) -> ShopResult<Order> {
    let order = self.visible(user, id).await?;
    if !order.status.is_cancellable() {
      return Err(ShopError::InvalidState(format!(
        "Order cannot be cancelled while {}",
        order.status
      )));
    }
    let reason = reason.filter(|r| !r.trim().is_empty());
    let cancelled = self
      .transition(order, OrderStatus::Cancelled, reason.clone(), Some(user.id))
      .await?;
    if let Some(reason) = reason {
      let note = OrderNote {
        id: Uuid::new_v4(),
        order_id: cancelled.id,
        note: format!("Cancellation reason: {}", reason.trim()),
        is_public: true,
        created_by: Some(user.id),
        created_at: Utc::now(),
      };
      self.store.insert_order_note(&note).await?;
    }
    Ok(cancelled)
  }

  /// Records a successful payment against an existing order. Pending orders
  /// move to `paid`; orders already further along only get their payment
  /// status updated. Idempotent.
  #[instrument(skip(self))]
  pub async fn mark_paid(&self, id: Uuid) -> ShopResult<Order> {
    let order = self.load(id).await?;
    if order.payment_status == OrderPaymentStatus::Paid {
      return Ok(order);
    }
    if order.status == OrderStatus::Pending {
      return self
        .transition(order, OrderStatus::Paid, Some("Payment received".to_string()), None)
        .await;
    }
    if order.status.is_terminal() {
      return Err(ShopError::InvalidState(format!(
        "Order is {} and cannot accept payment",
        order.status
      )));
    }

    let expected = order.status;
    let mut updated = order;
    let now = Utc::now();
    updated.payment_status = OrderPaymentStatus::Paid;
    updated.paid_at.get_or_insert(now);
    updated.updated_at = now;
    let history = OrderStatusHistory::new(updated.id, expected, Some("Payment received".to_string()), None);
    if !self.store.update_order_status(&updated, expected, &history).await? {
      return Err(ShopError::Conflict("Order was modified by another request".to_string()));
    }
    Ok(updated)
  }
}
