// core/src/services/accounts.rs

//! Registration, login, bearer tokens, the address book and per-user
//! preferences (theme, notification levels, default addresses, wishlist and
//! saved items).

use argon2::{
  password_hash::{rand_core::OsRng, rand_core::RngCore, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::analytics::AnalyticsService;
use super::notifications::Notifier;
use crate::error::{ShopError, ShopResult};
use crate::models::{
  Address, AddressType, AuthToken, NotificationLevel, Product, ProductList, Theme, User, UserPreference,
};
use crate::store::DynStore;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes a plain-text password with Argon2 and a random salt.
#[instrument(name = "accounts::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> ShopResult<String> {
  if password.is_empty() {
    return Err(ShopError::Validation("Password cannot be empty.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      ShopError::Internal(format!("Password hashing failed: {}", e))
    })
}

/// Checks `provided` against a stored Argon2 hash. A mismatch is `Ok(false)`;
/// a malformed stored hash is an internal error.
#[instrument(name = "accounts::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided: &str) -> ShopResult<bool> {
  if stored_hash.is_empty() || provided.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Failed to parse stored password hash.");
    ShopError::Internal(format!("Invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => Ok(false),
    Err(e) => Err(ShopError::Internal(format!("Password verification failed: {}", e))),
  }
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn normalize_email(email: &str) -> ShopResult<String> {
  let email = email.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
    None => false,
  };
  if !valid || email.contains(char::is_whitespace) {
    return Err(ShopError::Validation("Enter a valid email address.".to_string()));
  }
  Ok(email)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub email: String,
  pub password: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
  pub address_type: AddressType,
  #[serde(default)]
  pub is_default: bool,
  pub full_name: String,
  pub street_address1: String,
  pub street_address2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: Option<String>,
  #[serde(default = "default_country")]
  pub country: String,
  pub phone: Option<String>,
}

fn default_country() -> String {
  "Uganda".to_string()
}

impl AddressInput {
  fn validate(&self) -> ShopResult<()> {
    for (field, value) in [
      ("full_name", &self.full_name),
      ("street_address1", &self.street_address1),
      ("city", &self.city),
      ("country", &self.country),
    ] {
      if value.trim().is_empty() {
        return Err(ShopError::Validation(format!("{} is required", field)));
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
  pub old_password: String,
  pub new_password: String,
  pub confirm_new_password: String,
}

fn check_new_password(password: &str) -> ShopResult<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ShopError::Validation(format!(
      "Password must be at least {} characters.",
      MIN_PASSWORD_LEN
    )));
  }
  Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceInput {
  pub theme: Option<Theme>,
  pub email_notifications: Option<NotificationLevel>,
  pub push_notifications: Option<NotificationLevel>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
  D: Deserializer<'de>,
{
  Option::<Uuid>::deserialize(deserializer).map(Some)
}

/// Fields left out are kept; `null` clears the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultAddresses {
  #[serde(default, deserialize_with = "present")]
  pub default_shipping_address: Option<Option<Uuid>>,
  #[serde(default, deserialize_with = "present")]
  pub default_billing_address: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceView {
  pub id: Uuid,
  pub theme: Theme,
  pub email_notifications: NotificationLevel,
  pub push_notifications: NotificationLevel,
  pub default_shipping_address: Option<Address>,
  pub default_billing_address: Option<Address>,
  pub wishlist_items: Vec<Product>,
  pub saved_items: Vec<Product>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
  pub user: User,
  pub token: AuthToken,
}

#[derive(Clone)]
pub struct AccountsService {
  store: DynStore,
  analytics: AnalyticsService,
  notifier: Notifier,
  token_ttl: Duration,
}

impl AccountsService {
  pub fn new(store: DynStore, analytics: AnalyticsService, notifier: Notifier, token_ttl_hours: i64) -> Self {
    Self {
      store,
      analytics,
      notifier,
      token_ttl: Duration::hours(token_ttl_hours),
    }
  }

  #[instrument(skip(self, input), fields(email = %input.email))]
  pub async fn register(&self, input: Registration) -> ShopResult<User> {
    let email = normalize_email(&input.email)?;
    check_new_password(&input.password)?;
    if self.store.find_user_by_email(&email).await?.is_some() {
      return Err(ShopError::Conflict(format!("A user with email {} already exists", email)));
    }

    let user = User {
      id: Uuid::new_v4(),
      email,
      password_hash: hash_password(&input.password)?,
      first_name: input.first_name.trim().to_string(),
      last_name: input.last_name.trim().to_string(),
      phone: input.phone.filter(|p| !p.trim().is_empty()),
      is_staff: false,
      is_active: true,
      created_at: Utc::now(),
    };
    self.store.insert_user(&user).await?;
    info!(user_id = %user.id, "User registered.");

    self.analytics.customer_registered().await;
    self.notifier.welcome(&user).await;
    Ok(user)
  }

  #[instrument(skip(self, password))]
  pub async fn login(&self, email: &str, password: &str) -> ShopResult<LoginResult> {
    let email = email.trim().to_lowercase();
    let invalid = || ShopError::Auth("Invalid email or password".to_string());
    let user = self.store.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !user.is_active {
      warn!(user_id = %user.id, "Login attempt for inactive user.");
      return Err(invalid());
    }
    if !verify_password(&user.password_hash, password)? {
      debug!(user_id = %user.id, "Password mismatch.");
      return Err(invalid());
    }

    let now = Utc::now();
    let token = AuthToken {
      token: generate_token(),
      user_id: user.id,
      created_at: now,
      expires_at: now + self.token_ttl,
    };
    self.store.insert_token(&token).await?;
    info!(user_id = %user.id, "User logged in.");
    Ok(LoginResult { user, token })
  }

  /// Resolves a bearer token to its active user.
  pub async fn authenticate(&self, token: &str) -> ShopResult<User> {
    let auth = self
      .store
      .get_token(token)
      .await?
      .ok_or_else(|| ShopError::Auth("Invalid token".to_string()))?;
    if auth.is_expired_at(Utc::now()) {
      self.store.delete_token(token).await?;
      return Err(ShopError::Auth("Token has expired".to_string()));
    }
    let user = self
      .store
      .get_user(auth.user_id)
      .await?
      .ok_or_else(|| ShopError::Auth("Invalid token".to_string()))?;
    if !user.is_active {
      return Err(ShopError::Auth("User account is disabled".to_string()));
    }
    Ok(user)
  }

  pub async fn logout(&self, token: &str) -> ShopResult<()> {
    self.store.delete_token(token).await?;
    Ok(())
  }

  /// Creates a staff account, or promotes the existing user with that email.
  #[instrument(skip(self, password))]
  pub async fn create_staff(&self, email: &str, password: &str) -> ShopResult<User> {
    let email = normalize_email(email)?;
    let user = match self.store.find_user_by_email(&email).await? {
      Some(existing) => existing,
      None => {
        self
          .register(Registration {
            email: email.clone(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
          })
          .await?
      }
    };
    self.store.set_user_staff(user.id, true).await?;
    Ok(User { is_staff: true, ..user })
  }

  /// Replaces the password after checking the current one. Other sessions
  /// keep their tokens.
  #[instrument(skip(self, user, input), fields(user_id = %user.id))]
  pub async fn change_password(&self, user: &User, input: PasswordChange) -> ShopResult<()> {
    if input.new_password != input.confirm_new_password {
      return Err(ShopError::Validation("New passwords do not match.".to_string()));
    }
    check_new_password(&input.new_password)?;
    if !verify_password(&user.password_hash, &input.old_password)? {
      warn!(user_id = %user.id, "Password change with a wrong current password.");
      return Err(ShopError::Validation("Invalid old password".to_string()));
    }
    let hash = hash_password(&input.new_password)?;
    if !self.store.set_user_password(user.id, &hash).await? {
      return Err(ShopError::not_found("User", user.id));
    }
    info!(user_id = %user.id, "Password changed.");
    Ok(())
  }

  pub async fn list_addresses(&self, user: &User) -> ShopResult<Vec<Address>> {
    self.store.list_addresses(user.id).await
  }

  #[instrument(skip(self, user, input), fields(user_id = %user.id))]
  pub async fn create_address(&self, user: &User, input: AddressInput) -> ShopResult<Address> {
    input.validate()?;
    let now = Utc::now();
    let address = Address {
      id: Uuid::new_v4(),
      user_id: user.id,
      address_type: input.address_type,
      is_default: input.is_default,
      full_name: input.full_name,
      street_address1: input.street_address1,
      street_address2: input.street_address2,
      city: input.city,
      state: input.state,
      postal_code: input.postal_code,
      country: input.country,
      phone: input.phone,
      created_at: now,
      updated_at: now,
    };
    self.store.save_address(&address).await?;
    Ok(address)
  }

  async fn owned_address(&self, user: &User, id: Uuid) -> ShopResult<Address> {
    match self.store.get_address(id).await? {
      Some(address) if address.user_id == user.id => Ok(address),
      _ => Err(ShopError::not_found("Address", id)),
    }
  }

  #[instrument(skip(self, user, input), fields(user_id = %user.id))]
  pub async fn update_address(&self, user: &User, id: Uuid, input: AddressInput) -> ShopResult<Address> {
    input.validate()?;
    let existing = self.owned_address(user, id).await?;
    let address = Address {
      address_type: input.address_type,
      is_default: input.is_default,
      full_name: input.full_name,
      street_address1: input.street_address1,
      street_address2: input.street_address2,
      city: input.city,
      state: input.state,
      postal_code: input.postal_code,
      country: input.country,
      phone: input.phone,
      updated_at: Utc::now(),
      ..existing
    };
    self.store.save_address(&address).await?;
    Ok(address)
  }

  pub async fn delete_address(&self, user: &User, id: Uuid) -> ShopResult<()> {
    self.owned_address(user, id).await?;
    self.store.delete_address(id).await?;
    Ok(())
  }

  // --- preferences ---

  async fn listed_products(&self, user: &User, list: ProductList) -> ShopResult<Vec<Product>> {
    let mut products = Vec::new();
    for id in self.store.product_list(user.id, list).await? {
      if let Some(product) = self.store.get_product(id).await? {
        products.push(product);
      }
    }
    Ok(products)
  }

  async fn preference_view(&self, user: &User, prefs: UserPreference) -> ShopResult<PreferenceView> {
    let address = |id: Option<Uuid>| async move {
      match id {
        Some(id) => self.store.get_address(id).await,
        None => Ok(None),
      }
    };
    Ok(PreferenceView {
      id: prefs.id,
      theme: prefs.theme,
      email_notifications: prefs.email_notifications,
      push_notifications: prefs.push_notifications,
      default_shipping_address: address(prefs.default_shipping_address_id).await?,
      default_billing_address: address(prefs.default_billing_address_id).await?,
      wishlist_items: self.listed_products(user, ProductList::Wishlist).await?,
      saved_items: self.listed_products(user, ProductList::Saved).await?,
    })
  }

  /// The user's preferences, created with defaults on first access.
  pub async fn preferences(&self, user: &User) -> ShopResult<PreferenceView> {
    let prefs = self.store.get_or_create_preferences(user.id).await?;
    self.preference_view(user, prefs).await
  }

  #[instrument(skip(self, user, input), fields(user_id = %user.id))]
  pub async fn update_preferences(&self, user: &User, input: PreferenceInput) -> ShopResult<PreferenceView> {
    let mut prefs = self.store.get_or_create_preferences(user.id).await?;
    if let Some(theme) = input.theme {
      prefs.theme = theme;
    }
    if let Some(level) = input.email_notifications {
      prefs.email_notifications = level;
    }
    if let Some(level) = input.push_notifications {
      prefs.push_notifications = level;
    }
    prefs.updated_at = Utc::now();
    self.store.update_preferences(&prefs).await?;
    self.preference_view(user, prefs).await
  }

  #[instrument(skip(self, user, input), fields(user_id = %user.id))]
  pub async fn update_default_addresses(&self, user: &User, input: DefaultAddresses) -> ShopResult<PreferenceView> {
    let mut prefs = self.store.get_or_create_preferences(user.id).await?;
    if let Some(choice) = input.default_shipping_address {
      prefs.default_shipping_address_id = match choice {
        Some(id) => Some(self.owned_address(user, id).await?.id),
        None => None,
      };
    }
    if let Some(choice) = input.default_billing_address {
      prefs.default_billing_address_id = match choice {
        Some(id) => Some(self.owned_address(user, id).await?.id),
        None => None,
      };
    }
    prefs.updated_at = Utc::now();
    self.store.update_preferences(&prefs).await?;
    self.preference_view(user, prefs).await
  }

  async fn change_list(&self, user: &User, list: ProductList, product_id: Uuid, present: bool) -> ShopResult<PreferenceView> {
    if present && self.store.get_product(product_id).await?.is_none() {
      return Err(ShopError::not_found("Product", product_id));
    }
    let prefs = self.store.get_or_create_preferences(user.id).await?;
    let changed = self
      .store
      .set_product_list_entry(user.id, list, product_id, present)
      .await?;
    debug!(list = %list, product_id = %product_id, present, changed, "Product list updated.");
    self.preference_view(user, prefs).await
  }

  pub async fn add_to_wishlist(&self, user: &User, product_id: Uuid) -> ShopResult<PreferenceView> {
    self.change_list(user, ProductList::Wishlist, product_id, true).await
  }

  pub async fn remove_from_wishlist(&self, user: &User, product_id: Uuid) -> ShopResult<PreferenceView> {
    self.change_list(user, ProductList::Wishlist, product_id, false).await
  }

  pub async fn add_to_saved(&self, user: &User, product_id: Uuid) -> ShopResult<PreferenceView> {
    self.change_list(user, ProductList::Saved, product_id, true).await
  }

  pub async fn remove_from_saved(&self, user: &User, product_id: Uuid) -> ShopResult<PreferenceView> {
    self.change_list(user, ProductList::Saved, product_id, false).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_and_verify() {
    let hash = hash_password("correct horse").unwrap();
    assert!(verify_password(&hash, "correct horse").unwrap());
    assert!(!verify_password(&hash, "wrong horse").unwrap());
    assert!(!verify_password(&hash, "").unwrap());
    assert!(verify_password("not-a-hash", "x").is_err());
  }

  #[test]
  fn tokens_are_long_and_unique() {
    let a = generate_token();
    assert_eq!(a.len(), 64);
    assert_ne!(a, generate_token());
  }

  #[test]
  fn default_address_fields_distinguish_null_from_missing() {
    let id = Uuid::new_v4();
    let input: DefaultAddresses =
      serde_json::from_value(serde_json::json!({ "default_shipping_address": id, "default_billing_address": null }))
        .unwrap();
    assert_eq!(input.default_shipping_address, Some(Some(id)));
    assert_eq!(input.default_billing_address, Some(None));

    let empty: DefaultAddresses = serde_json::from_value(serde_json::json!({})).unwrap();
    assert_eq!(empty.default_shipping_address, None);
    assert_eq!(empty.default_billing_address, None);
  }

  #[test]
  fn email_normalization() {
    assert_eq!(normalize_email("  Jane@Example.COM ").unwrap(), "jane@example.com");
    assert!(normalize_email("jane").is_err());
    assert!(normalize_email("@example.com").is_err());
    assert!(normalize_email("jane@example").is_err());
  }
}
