// server/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

use urbanherb::error::ShopResult;
use urbanherb::models::{
  DeliveryZone, MobilePayment, MobilePaymentProvider, PaymentMethod, PaymentMethodProvider, ProviderCode, User,
};
use urbanherb::providers::{CollectionRequest, PaymentProvider, ProviderReply, SandboxProvider, WebhookEvent};
use urbanherb::services::accounts::Registration;
use urbanherb::services::catalog::{NewCategory, ProductDetail, ProductInput};
use urbanherb::services::checkout::{NewDeliveryZone, NewPaymentMethod};
use urbanherb::{MemoryStore, ProviderRegistry, Store};

use urbanherb_server::config::AppConfig;
use urbanherb_server::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_api";
pub const CUSTOMER_PASSWORD: &str = "correct-horse";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Sandbox behaviour for collections, but webhooks must carry a valid HMAC.
pub struct SignedSandbox {
  inner: SandboxProvider,
  code: ProviderCode,
}

impl SignedSandbox {
  pub fn new(code: ProviderCode) -> Self {
    Self {
      inner: SandboxProvider::new(code),
      code,
    }
  }
}

#[async_trait]
impl PaymentProvider for SignedSandbox {
  fn code(&self) -> ProviderCode {
    self.code
  }

  async fn initiate(&self, config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply> {
    self.inner.initiate(config, request).await
  }

  async fn check_status(&self, config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply> {
    self.inner.check_status(config, payment).await
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent> {
    self.inner.parse_webhook(body)
  }
}

/// Everything a request-level test needs: app state over an in-memory store
/// plus a staff member, a customer and a stocked product.
pub struct TestContext {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub staff: User,
  pub customer: User,
  pub customer_token: String,
  pub staff_token: String,
  pub product: ProductDetail,
  pub zone: DeliveryZone,
  pub mtn_method: PaymentMethod,
}

pub async fn build_context() -> TestContext {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let registry = ProviderRegistry::sandbox().with_provider(Arc::new(SignedSandbox::new(ProviderCode::Mtn)));
  let state = AppState::with_store(store.clone(), registry, Arc::new(AppConfig::default()));
  let services = &state.services;

  store
    .upsert_provider(&MobilePaymentProvider {
      id: Uuid::new_v4(),
      name: "MTN Mobile Money".to_string(),
      code: ProviderCode::Mtn,
      is_active: true,
      api_base_url: "https://sandbox.invalid".to_string(),
      api_key: "key".to_string(),
      api_secret: "secret".to_string(),
      webhook_secret: WEBHOOK_SECRET.to_string(),
      created_at: Utc::now(),
    })
    .await
    .unwrap();

  let staff = services
    .accounts
    .create_staff("staff@urbanherb.test", "staff-password")
    .await
    .unwrap();
  let staff_token = services
    .accounts
    .login("staff@urbanherb.test", "staff-password")
    .await
    .unwrap()
    .token
    .token;

  let customer = services
    .accounts
    .register(Registration {
      email: "grace@example.com".to_string(),
      password: CUSTOMER_PASSWORD.to_string(),
      first_name: "Grace".to_string(),
      last_name: "Achieng".to_string(),
      phone: Some("0772000111".to_string()),
    })
    .await
    .unwrap();
  let customer_token = services
    .accounts
    .login("grace@example.com", CUSTOMER_PASSWORD)
    .await
    .unwrap()
    .token
    .token;

  let category = services
    .catalog
    .create_category(NewCategory {
      name: "Dried Herbs".to_string(),
      slug: None,
      parent_id: None,
      description: None,
    })
    .await
    .unwrap();
  let product = services
    .catalog
    .create_product(ProductInput {
      category_id: category.id,
      name: "Moringa Powder".to_string(),
      slug: None,
      description: None,
      price: dec!(8000),
      is_active: true,
      initial_stock: 20,
    })
    .await
    .unwrap();
  let zone = services
    .checkout
    .create_delivery_zone(
      &staff,
      NewDeliveryZone {
        name: "Entebbe".to_string(),
        description: None,
        delivery_fee: dec!(7000),
        estimated_days: 2,
      },
    )
    .await
    .unwrap();
  let mtn_method = services
    .checkout
    .create_payment_method(
      &staff,
      NewPaymentMethod {
        name: "MTN Mobile Money".to_string(),
        description: None,
        provider: PaymentMethodProvider::MtnMomo,
        requires_verification: false,
        min_amount: None,
        max_amount: None,
      },
    )
    .await
    .unwrap();

  TestContext {
    state,
    store,
    staff,
    customer,
    customer_token,
    staff_token,
    product,
    zone,
    mtn_method,
  }
}

pub fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}
