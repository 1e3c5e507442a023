// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;
use uuid::Uuid;

use urbanherb::error::{ShopError, ShopResult};
use urbanherb::models::{
  CheckoutSession, DeliveryType, DeliveryZone, MobilePayment, MobilePaymentProvider, PaymentMethod,
  PaymentMethodProvider, PickupLocation, ProviderCode, User,
};
use urbanherb::providers::{signature, CollectionRequest, PaymentProvider, ProviderReply, SandboxProvider, WebhookEvent};
use urbanherb::services::accounts::Registration;
use urbanherb::services::catalog::{NewCategory, ProductInput, ProductDetail};
use urbanherb::services::checkout::{NewCheckoutSession, NewDeliveryZone, NewPaymentMethod, NewPickupLocation};
use urbanherb::services::notifications::{Channel, MessageSender, SentMessage};
use urbanherb::{MemoryStore, ProviderRegistry, ShopServices, ShopSettings, Store};

pub const WEBHOOK_SECRET: &str = "whsec_test";

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

// --- Message sender that keeps everything it was asked to send ---

#[derive(Default)]
pub struct RecordingSender {
  pub sent: Mutex<Vec<SentMessage>>,
  /// When set, every send fails without recording anything.
  pub fail: AtomicBool,
}

impl RecordingSender {
  pub fn count(&self, channel: Channel) -> usize {
    self.sent.lock().iter().filter(|m| m.channel == channel).count()
  }

  pub fn subjects(&self) -> Vec<String> {
    self.sent.lock().iter().filter_map(|m| m.subject.clone()).collect()
  }
}

#[async_trait]
impl MessageSender for RecordingSender {
  async fn send_email(&self, to: &str, subject: &str, body: &str) -> ShopResult<SentMessage> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(ShopError::Internal("mail relay unavailable".to_string()));
    }
    let message = SentMessage {
      channel: Channel::Email,
      to: to.to_string(),
      subject: Some(subject.to_string()),
      body: body.to_string(),
      message_id: format!("email_{}", Uuid::new_v4()),
    };
    self.sent.lock().push(message.clone());
    Ok(message)
  }

  async fn send_sms(&self, to: &str, body: &str) -> ShopResult<SentMessage> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(ShopError::Internal("sms gateway unavailable".to_string()));
    }
    let message = SentMessage {
      channel: Channel::Sms,
      to: to.to_string(),
      subject: None,
      body: body.to_string(),
      message_id: format!("sms_{}", Uuid::new_v4()),
    };
    self.sent.lock().push(message.clone());
    Ok(message)
  }
}

// --- Provider double with scripted answers ---

/// Answers `initiate` and `check_status` with configurable raw statuses and
/// verifies webhooks with the real HMAC check.
pub struct ScriptedProvider {
  code: ProviderCode,
  pub initiate_status: Mutex<String>,
  pub poll_status: Mutex<String>,
  pub fail_initiate: AtomicBool,
  pub initiate_calls: AtomicUsize,
}

impl ScriptedProvider {
  pub fn new(code: ProviderCode) -> Self {
    Self {
      code,
      initiate_status: Mutex::new("PENDING".to_string()),
      poll_status: Mutex::new("PENDING".to_string()),
      fail_initiate: AtomicBool::new(false),
      initiate_calls: AtomicUsize::new(0),
    }
  }

  pub fn answer_initiate(&self, raw: &str) {
    *self.initiate_status.lock() = raw.to_string();
  }

  pub fn answer_poll(&self, raw: &str) {
    *self.poll_status.lock() = raw.to_string();
  }

  pub fn calls(&self) -> usize {
    self.initiate_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
  fn code(&self) -> ProviderCode {
    self.code
  }

  async fn initiate(&self, _config: &MobilePaymentProvider, request: &CollectionRequest) -> ShopResult<ProviderReply> {
    self.initiate_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_initiate.load(Ordering::SeqCst) {
      return Err(ShopError::provider(
        self.code.as_str(),
        anyhow::anyhow!("provider unavailable"),
      ));
    }
    let raw = self.initiate_status.lock().clone();
    Ok(ProviderReply::new(
      raw.clone(),
      Some(format!("TX-{}", request.reference)),
      json!({ "status": raw, "reference": request.reference }),
    ))
  }

  async fn check_status(&self, _config: &MobilePaymentProvider, payment: &MobilePayment) -> ShopResult<ProviderReply> {
    let raw = self.poll_status.lock().clone();
    Ok(ProviderReply::new(
      raw.clone(),
      payment.provider_tx_id.clone(),
      json!({ "status": raw }),
    ))
  }

  fn parse_webhook(&self, body: &[u8]) -> ShopResult<WebhookEvent> {
    SandboxProvider::new(self.code).parse_webhook(body)
  }
}

// --- A seeded shop ---

pub struct TestShop {
  pub services: ShopServices,
  pub store: Arc<MemoryStore>,
  pub sender: Arc<RecordingSender>,
  pub mtn: Arc<ScriptedProvider>,
  pub staff: User,
  pub customer: User,
  pub product: ProductDetail,
  pub zone: DeliveryZone,
  pub pickup: PickupLocation,
  pub mtn_method: PaymentMethod,
  pub cash_method: PaymentMethod,
}

pub async fn register(services: &ShopServices, email: &str) -> User {
  services
    .accounts
    .register(Registration {
      email: email.to_string(),
      password: "correct-horse".to_string(),
      first_name: "Amina".to_string(),
      last_name: "Nakato".to_string(),
      phone: Some("0772123456".to_string()),
    })
    .await
    .expect("registration succeeds")
}

pub async fn seed_shop() -> TestShop {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let sender = Arc::new(RecordingSender::default());
  let mtn = Arc::new(ScriptedProvider::new(ProviderCode::Mtn));
  let registry = ProviderRegistry::sandbox().with_provider(mtn.clone());
  let services = ShopServices::new(store.clone(), registry, sender.clone(), &ShopSettings::default());

  for code in ProviderCode::ALL {
    store
      .upsert_provider(&MobilePaymentProvider {
        id: Uuid::new_v4(),
        name: format!("{} Mobile Money", code),
        code: *code,
        is_active: true,
        api_base_url: "https://sandbox.invalid".to_string(),
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        created_at: Utc::now(),
      })
      .await
      .unwrap();
  }

  let staff = services
    .accounts
    .create_staff("staff@urbanherb.test", "staff-password")
    .await
    .unwrap();
  let customer = register(&services, "amina@example.com").await;

  let category = services
    .catalog
    .create_category(NewCategory {
      name: "Fresh Herbs".to_string(),
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
      name: "Lemongrass Bundle".to_string(),
      slug: None,
      description: Some("Freshly cut".to_string()),
      price: dec!(10000),
      is_active: true,
      initial_stock: 50,
    })
    .await
    .unwrap();

  let zone = services
    .checkout
    .create_delivery_zone(
      &staff,
      NewDeliveryZone {
        name: "Kampala Central".to_string(),
        description: None,
        delivery_fee: dec!(5000),
        estimated_days: 1,
      },
    )
    .await
    .unwrap();
  let pickup = services
    .checkout
    .create_pickup_location(
      &staff,
      NewPickupLocation {
        name: "Ntinda Shop".to_string(),
        address: "Plot 4, Ntinda Road".to_string(),
        contact_phone: None,
        operating_hours: Some("08:00-18:00".to_string()),
      },
    )
    .await
    .unwrap();
  let mtn_method = payment_method(&services, &staff, "MTN Mobile Money", PaymentMethodProvider::MtnMomo).await;
  let cash_method = payment_method(&services, &staff, "Cash on pickup", PaymentMethodProvider::Cash).await;

  TestShop {
    services,
    store,
    sender,
    mtn,
    staff,
    customer,
    product,
    zone,
    pickup,
    mtn_method,
    cash_method,
  }
}

async fn payment_method(services: &ShopServices, staff: &User, name: &str, provider: PaymentMethodProvider) -> PaymentMethod {
  services
    .checkout
    .create_payment_method(
      staff,
      NewPaymentMethod {
        name: name.to_string(),
        description: None,
        provider,
        requires_verification: false,
        min_amount: None,
        max_amount: None,
      },
    )
    .await
    .unwrap()
}

impl TestShop {
  pub async fn fill_cart(&self, user: &User, quantity: i32) {
    self
      .services
      .cart
      .add_item(user, self.product.product.id, quantity)
      .await
      .unwrap();
  }

  pub fn delivery_request(&self, payment_method_id: Uuid) -> NewCheckoutSession {
    NewCheckoutSession {
      delivery_type: DeliveryType::Delivery,
      delivery_zone_id: Some(self.zone.id),
      pickup_location_id: None,
      delivery_address: Some("Plot 12, Kampala Road".to_string()),
      address_id: None,
      delivery_instructions: None,
      payment_method_id,
    }
  }

  /// Two units delivered: 20,000 + 5,000 delivery.
  pub async fn confirmed_session(&self, user: &User) -> CheckoutSession {
    self.fill_cart(user, 2).await;
    let session = self
      .services
      .checkout
      .create_session(user, self.delivery_request(self.mtn_method.id))
      .await
      .unwrap();
    self.services.checkout.confirm(user, session.id).await.unwrap().session
  }

  /// Moves the session deadline into the past.
  pub async fn backdate(&self, session_id: Uuid) {
    let mut session = self.store.get_checkout_session(session_id).await.unwrap().unwrap();
    session.expires_at = Utc::now() - chrono::Duration::minutes(1);
    self.store.update_checkout_session(&session).await.unwrap();
  }

  pub async fn stock(&self) -> i32 {
    self
      .store
      .get_inventory(self.product.product.id)
      .await
      .unwrap()
      .map(|i| i.quantity)
      .unwrap_or_default()
  }
}

pub fn webhook_body(tx_ref: &str, status: &str, amount: Option<Decimal>) -> Vec<u8> {
  let mut payload = json!({
    "transaction_id": tx_ref,
    "status": status,
    "provider_reference": format!("MTN-{}", tx_ref),
  });
  if let Some(amount) = amount {
    payload["amount"] = json!(amount.to_string());
  }
  serde_json::to_vec(&payload).unwrap()
}

pub fn sign(body: &[u8]) -> String {
  signature::sign(WEBHOOK_SECRET, body).unwrap()
}
