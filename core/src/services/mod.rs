// core/src/services/mod.rs

//! Business operations over a [`Store`](crate::store::Store).
//!
//! Each service is a cheap `Clone` handle; [`ShopServices`] wires them
//! together so that the server and the admin CLI share one construction path.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ShopError, ShopResult};
use crate::models::{CheckoutStatus, PaymentStatus, User};
use crate::providers::ProviderRegistry;
use crate::store::{DynStore, PaymentQuery};

pub mod accounts;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod orders;
pub mod payments;

pub use accounts::AccountsService;
pub use analytics::AnalyticsService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use notifications::{LogSender, MessageSender, Notifier};
pub use orders::OrdersService;
pub use payments::PaymentsService;

pub(crate) fn ensure_staff(user: &User) -> ShopResult<()> {
  if user.is_staff {
    Ok(())
  } else {
    Err(ShopError::Forbidden("Staff access required".to_string()))
  }
}

pub(crate) async fn session_payment_open(store: &DynStore, session_id: Uuid) -> ShopResult<bool> {
  let open = store
    .list_payments(&PaymentQuery {
      checkout_session_id: Some(session_id),
      statuses: vec![PaymentStatus::Pending, PaymentStatus::Processing],
      ..PaymentQuery::default()
    })
    .await?;
  Ok(!open.is_empty())
}

/// Refuses changes to what the user is buying while a mobile-money payment
/// for one of their confirmed checkout sessions is still open.
pub(crate) async fn ensure_no_payment_in_progress(store: &DynStore, user_id: Uuid) -> ShopResult<()> {
  for session in store.list_checkout_sessions(user_id).await? {
    if session.status == CheckoutStatus::PaymentPending && session_payment_open(store, session.id).await? {
      return Err(ShopError::InvalidState(
        "A payment is in progress for your checkout; wait for it to finish".to_string(),
      ));
    }
  }
  Ok(())
}

#[derive(Debug, Clone)]
pub struct ShopSettings {
  pub checkout_session_ttl_minutes: i64,
  pub auth_token_ttl_hours: i64,
  pub payment_max_retries: i32,
}

impl Default for ShopSettings {
  fn default() -> Self {
    Self {
      checkout_session_ttl_minutes: crate::models::checkout::DEFAULT_SESSION_TTL_MINUTES,
      auth_token_ttl_hours: 168,
      payment_max_retries: payments::DEFAULT_MAX_RETRIES,
    }
  }
}

#[derive(Clone)]
pub struct ShopServices {
  pub store: DynStore,
  pub accounts: AccountsService,
  pub analytics: AnalyticsService,
  pub cart: CartService,
  pub catalog: CatalogService,
  pub checkout: CheckoutService,
  pub orders: OrdersService,
  pub payments: PaymentsService,
  pub notifier: Notifier,
}

impl ShopServices {
  pub fn new(
    store: DynStore,
    registry: ProviderRegistry,
    sender: Arc<dyn MessageSender>,
    settings: &ShopSettings,
  ) -> Self {
    let notifier = Notifier::new(sender);
    let analytics = AnalyticsService::new(store.clone());
    let accounts = AccountsService::new(
      store.clone(),
      analytics.clone(),
      notifier.clone(),
      settings.auth_token_ttl_hours,
    );
    let catalog = CatalogService::new(store.clone(), analytics.clone());
    let cart = CartService::new(store.clone(), analytics.clone());
    let checkout = CheckoutService::new(
      store.clone(),
      analytics.clone(),
      notifier.clone(),
      settings.checkout_session_ttl_minutes,
    );
    let orders = OrdersService::new(store.clone(), analytics.clone());
    let payments = PaymentsService::new(
      store.clone(),
      registry,
      checkout.clone(),
      orders.clone(),
      notifier.clone(),
      settings.payment_max_retries,
    );
    Self {
      store,
      accounts,
      analytics,
      cart,
      catalog,
      checkout,
      orders,
      payments,
      notifier,
    }
  }
}
