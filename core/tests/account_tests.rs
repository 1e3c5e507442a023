// tests/account_tests.rs
mod common;
use common::*;
use serial_test::serial;

use urbanherb::models::{AddressType, NotificationLevel, Theme, User};
use urbanherb::services::accounts::{AddressInput, DefaultAddresses, PasswordChange, PreferenceInput, Registration};
use uuid::Uuid;
use urbanherb::{ShopError, Store};

fn address(address_type: AddressType, is_default: bool, street: &str) -> AddressInput {
  AddressInput {
    address_type,
    is_default,
    full_name: "Amina Nakato".to_string(),
    street_address1: street.to_string(),
    street_address2: None,
    city: "Kampala".to_string(),
    state: None,
    postal_code: None,
    country: "Uganda".to_string(),
    phone: Some("0772123456".to_string()),
  }
}

#[tokio::test]
#[serial]
async fn test_register_login_authenticate_logout() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;

  let login = accounts.login("  AMINA@example.com ", "correct-horse").await.unwrap();
  assert_eq!(login.user.id, shop.customer.id);
  assert_eq!(login.token.token.len(), 64);
  assert!(login.token.expires_at > login.token.created_at);

  let user = accounts.authenticate(&login.token.token).await.unwrap();
  assert_eq!(user.email, "amina@example.com");

  accounts.logout(&login.token.token).await.unwrap();
  assert!(matches!(accounts.authenticate(&login.token.token).await, Err(ShopError::Auth(_))));
}

#[tokio::test]
#[serial]
async fn test_bad_credentials_and_duplicates() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;

  assert!(matches!(accounts.login("amina@example.com", "wrong-pass").await, Err(ShopError::Auth(_))));
  assert!(matches!(accounts.login("nobody@example.com", "whatever1").await, Err(ShopError::Auth(_))));

  let duplicate = accounts
    .register(Registration {
      email: "Amina@Example.com".to_string(),
      password: "another-password".to_string(),
      first_name: String::new(),
      last_name: String::new(),
      phone: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(duplicate, ShopError::Conflict(_)));

  let short = accounts
    .register(Registration {
      email: "new@example.com".to_string(),
      password: "short".to_string(),
      first_name: String::new(),
      last_name: String::new(),
      phone: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(short, ShopError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn test_expired_token_is_rejected_and_removed() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let login = accounts.login("amina@example.com", "correct-horse").await.unwrap();

  let mut token = login.token.clone();
  token.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
  shop.store.delete_token(&token.token).await.unwrap();
  shop.store.insert_token(&token).await.unwrap();

  assert!(matches!(accounts.authenticate(&token.token).await, Err(ShopError::Auth(_))));
  assert!(shop.store.get_token(&token.token).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_password_is_hashed_and_never_serialized() {
  let shop = seed_shop().await;
  let stored: User = shop.store.get_user(shop.customer.id).await.unwrap().unwrap();
  assert!(stored.password_hash.starts_with("$argon2"));
  let json = serde_json::to_value(&stored).unwrap();
  assert!(json.get("password_hash").is_none());
}

#[tokio::test]
#[serial]
async fn test_single_default_address_per_type() {
  let shop = seed_shop().await;
  let user = &shop.customer;
  let accounts = &shop.services.accounts;

  let home = accounts
    .create_address(user, address(AddressType::Shipping, true, "Plot 1"))
    .await
    .unwrap();
  let office = accounts
    .create_address(user, address(AddressType::Shipping, true, "Plot 2"))
    .await
    .unwrap();
  let billing = accounts
    .create_address(user, address(AddressType::Billing, true, "Plot 3"))
    .await
    .unwrap();

  let all = accounts.list_addresses(user).await.unwrap();
  let shipping_defaults: Vec<_> = all
    .iter()
    .filter(|a| a.address_type == AddressType::Shipping && a.is_default)
    .collect();
  assert_eq!(shipping_defaults.len(), 1);
  assert_eq!(shipping_defaults[0].id, office.id);
  assert!(all.iter().any(|a| a.id == billing.id && a.is_default));

  accounts
    .update_address(user, home.id, address(AddressType::Shipping, true, "Plot 1A"))
    .await
    .unwrap();
  let all = accounts.list_addresses(user).await.unwrap();
  let defaults: Vec<_> = all
    .iter()
    .filter(|a| a.address_type == AddressType::Shipping && a.is_default)
    .map(|a| a.id)
    .collect();
  assert_eq!(defaults, vec![home.id]);
}

#[tokio::test]
#[serial]
async fn test_addresses_belong_to_their_owner() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let mine = accounts
    .create_address(&shop.customer, address(AddressType::Both, false, "Plot 9"))
    .await
    .unwrap();
  let stranger = register(&shop.services, "stranger@example.com").await;

  assert!(matches!(
    accounts.delete_address(&stranger, mine.id).await,
    Err(ShopError::NotFound(_))
  ));
  accounts.delete_address(&shop.customer, mine.id).await.unwrap();
  assert!(accounts.list_addresses(&shop.customer).await.unwrap().is_empty());

  let mut blank = address(AddressType::Shipping, false, " ");
  blank.city = "Kampala".to_string();
  assert!(matches!(
    accounts.create_address(&shop.customer, blank).await,
    Err(ShopError::Validation(_))
  ));
}

fn password_change(old: &str, new: &str, confirm: &str) -> PasswordChange {
  PasswordChange {
    old_password: old.to_string(),
    new_password: new.to_string(),
    confirm_new_password: confirm.to_string(),
  }
}

#[tokio::test]
#[serial]
async fn test_change_password() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let user = &shop.customer;

  let mismatch = accounts
    .change_password(user, password_change("correct-horse", "battery-staple", "battery-stapler"))
    .await
    .unwrap_err();
  assert!(matches!(mismatch, ShopError::Validation(ref m) if m.contains("do not match")));

  let wrong_old = accounts
    .change_password(user, password_change("wrong-horse", "battery-staple", "battery-staple"))
    .await
    .unwrap_err();
  assert!(matches!(wrong_old, ShopError::Validation(ref m) if m.contains("Invalid old password")));

  assert!(matches!(
    accounts.change_password(user, password_change("correct-horse", "short", "short")).await,
    Err(ShopError::Validation(_))
  ));
  // Nothing changed yet.
  accounts.login("amina@example.com", "correct-horse").await.unwrap();

  accounts
    .change_password(user, password_change("correct-horse", "battery-staple", "battery-staple"))
    .await
    .unwrap();
  assert!(matches!(
    accounts.login("amina@example.com", "correct-horse").await,
    Err(ShopError::Auth(_))
  ));
  let login = accounts.login("amina@example.com", "battery-staple").await.unwrap();
  assert_eq!(login.user.id, user.id);
}

#[tokio::test]
#[serial]
async fn test_preferences_are_created_with_defaults_and_updated_in_part() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let user = &shop.customer;

  let prefs = accounts.preferences(user).await.unwrap();
  assert_eq!(prefs.theme, Theme::System);
  assert_eq!(prefs.email_notifications, NotificationLevel::All);
  assert!(prefs.wishlist_items.is_empty());
  assert!(prefs.default_shipping_address.is_none());

  let updated = accounts
    .update_preferences(
      user,
      PreferenceInput {
        theme: Some(Theme::Dark),
        push_notifications: Some(NotificationLevel::Off),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(updated.id, prefs.id);
  assert_eq!(updated.theme, Theme::Dark);
  assert_eq!(updated.email_notifications, NotificationLevel::All);
  assert_eq!(updated.push_notifications, NotificationLevel::Off);

  let again = accounts.preferences(user).await.unwrap();
  assert_eq!(again.theme, Theme::Dark);
  assert_eq!(again.push_notifications, NotificationLevel::Off);
}

#[tokio::test]
#[serial]
async fn test_wishlist_and_saved_items() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let user = &shop.customer;
  let product_id = shop.product.product.id;

  let prefs = accounts.add_to_wishlist(user, product_id).await.unwrap();
  assert_eq!(prefs.wishlist_items.len(), 1);
  assert_eq!(prefs.wishlist_items[0].id, product_id);
  assert!(prefs.saved_items.is_empty());

  // Adding twice keeps a single entry.
  let prefs = accounts.add_to_wishlist(user, product_id).await.unwrap();
  assert_eq!(prefs.wishlist_items.len(), 1);

  let prefs = accounts.add_to_saved(user, product_id).await.unwrap();
  assert_eq!(prefs.saved_items.len(), 1);
  assert_eq!(prefs.wishlist_items.len(), 1);

  let prefs = accounts.remove_from_wishlist(user, product_id).await.unwrap();
  assert!(prefs.wishlist_items.is_empty());
  assert_eq!(prefs.saved_items.len(), 1);

  let prefs = accounts.remove_from_saved(user, product_id).await.unwrap();
  assert!(prefs.saved_items.is_empty());

  assert!(matches!(
    accounts.add_to_wishlist(user, Uuid::new_v4()).await,
    Err(ShopError::NotFound(_))
  ));
  // Removing an unknown product is a no-op.
  accounts.remove_from_saved(user, Uuid::new_v4()).await.unwrap();

  let other = register(&shop.services, "other@example.com").await;
  assert!(accounts.preferences(&other).await.unwrap().saved_items.is_empty());
}

#[tokio::test]
#[serial]
async fn test_default_addresses_in_preferences() {
  let shop = seed_shop().await;
  let accounts = &shop.services.accounts;
  let user = &shop.customer;
  let home = accounts
    .create_address(user, address(AddressType::Shipping, false, "Plot 1"))
    .await
    .unwrap();
  let office = accounts
    .create_address(user, address(AddressType::Billing, false, "Plot 2"))
    .await
    .unwrap();

  let prefs = accounts
    .update_default_addresses(
      user,
      DefaultAddresses {
        default_shipping_address: Some(Some(home.id)),
        default_billing_address: Some(Some(office.id)),
      },
    )
    .await
    .unwrap();
  assert_eq!(prefs.default_shipping_address.as_ref().map(|a| a.id), Some(home.id));
  assert_eq!(prefs.default_billing_address.as_ref().map(|a| a.id), Some(office.id));

  // A missing field keeps the current value; null clears it.
  let prefs = accounts
    .update_default_addresses(
      user,
      DefaultAddresses {
        default_shipping_address: None,
        default_billing_address: Some(None),
      },
    )
    .await
    .unwrap();
  assert_eq!(prefs.default_shipping_address.as_ref().map(|a| a.id), Some(home.id));
  assert!(prefs.default_billing_address.is_none());

  let stranger = register(&shop.services, "stranger@example.com").await;
  let theirs = accounts
    .create_address(&stranger, address(AddressType::Shipping, false, "Plot 7"))
    .await
    .unwrap();
  assert!(matches!(
    accounts
      .update_default_addresses(
        user,
        DefaultAddresses {
          default_shipping_address: Some(Some(theirs.id)),
          default_billing_address: None,
        },
      )
      .await,
    Err(ShopError::NotFound(_))
  ));

  accounts.delete_address(user, home.id).await.unwrap();
  let prefs = accounts.preferences(user).await.unwrap();
  assert!(prefs.default_shipping_address.is_none());
  let stored = shop.store.get_or_create_preferences(user.id).await.unwrap();
  assert!(stored.default_shipping_address_id.is_none());
}
