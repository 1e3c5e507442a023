// core/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  #[serde(skip_serializing)] // Never send the password hash to a client
  pub password_hash: String,
  pub first_name: String,
  pub last_name: String,
  pub phone: Option<String>,
  pub is_staff: bool,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn full_name(&self) -> String {
    let name = format!("{} {}", self.first_name, self.last_name);
    let trimmed = name.trim();
    if trimmed.is_empty() {
      self.email.clone()
    } else {
      trimmed.to_string()
    }
  }
}

/// Opaque bearer token issued on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
  pub token: String,
  pub user_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl AuthToken {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}

string_enum! {
  pub enum AddressType {
    Shipping => "SHIPPING",
    Billing => "BILLING",
    Both => "BOTH",
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
  pub id: Uuid,
  pub user_id: Uuid,
  pub address_type: AddressType,
  pub is_default: bool,
  pub full_name: String,
  pub street_address1: String,
  pub street_address2: Option<String>,
  pub city: String,
  pub state: Option<String>,
  pub postal_code: Option<String>,
  pub country: String,
  pub phone: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Address {
  /// Single-line rendering used as a checkout delivery address.
  pub fn one_line(&self) -> String {
    let mut parts = vec![self.street_address1.clone()];
    if let Some(line2) = self.street_address2.as_ref().filter(|s| !s.trim().is_empty()) {
      parts.push(line2.clone());
    }
    parts.push(self.city.clone());
    if let Some(state) = self.state.as_ref().filter(|s| !s.trim().is_empty()) {
      parts.push(state.clone());
    }
    parts.push(self.country.clone());
    parts.join(", ")
  }
}

string_enum! {
  pub enum Theme {
    Light => "LIGHT",
    Dark => "DARK",
    System => "SYSTEM",
  }
}

string_enum! {
  pub enum NotificationLevel {
    All => "all",
    Important => "important",
    Off => "none",
  }
}

string_enum! {
  /// Per-user product lists kept alongside the preferences.
  pub enum ProductList {
    Wishlist => "WISHLIST",
    Saved => "SAVED",
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
  pub id: Uuid,
  pub user_id: Uuid,
  pub theme: Theme,
  pub email_notifications: NotificationLevel,
  pub push_notifications: NotificationLevel,
  pub default_shipping_address_id: Option<Uuid>,
  pub default_billing_address_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl UserPreference {
  pub fn defaults_for(user_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      user_id,
      theme: Theme::System,
      email_notifications: NotificationLevel::All,
      push_notifications: NotificationLevel::All,
      default_shipping_address_id: None,
      default_billing_address_id: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Drops references to an address that no longer exists.
  pub fn forget_address(&mut self, address_id: Uuid) -> bool {
    let mut changed = false;
    for slot in [&mut self.default_shipping_address_id, &mut self.default_billing_address_id] {
      if *slot == Some(address_id) {
        *slot = None;
        changed = true;
      }
    }
    changed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notification_levels_use_lowercase_names() {
    assert_eq!(NotificationLevel::Off.as_str(), "none");
    assert_eq!("important".parse::<NotificationLevel>().unwrap(), NotificationLevel::Important);
    assert!("NONE".parse::<NotificationLevel>().is_err());
  }

  #[test]
  fn forgetting_an_address_clears_both_defaults() {
    let address = Uuid::new_v4();
    let mut prefs = UserPreference::defaults_for(Uuid::new_v4(), Utc::now());
    prefs.default_shipping_address_id = Some(address);
    prefs.default_billing_address_id = Some(address);
    assert!(prefs.forget_address(address));
    assert_eq!(prefs.default_shipping_address_id, None);
    assert_eq!(prefs.default_billing_address_id, None);
    assert!(!prefs.forget_address(address));
  }
}
