// core/src/models/mod.rs

//! Data structures for every persisted entity of the storefront.
//!
//! Models are plain structs; both store backends read and write them. Status
//! enums are stored as their uppercase/lowercase wire names, so every enum
//! here round-trips through `as_str()` / `FromStr`.

use rust_decimal::Decimal;

/// Declares a fieldless enum with a fixed textual representation used by
/// serde, SQL text columns and `Display`.
macro_rules! string_enum {
  (
    $(#[$meta:meta])*
    $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    $vis enum $name {
      $(#[serde(rename = $text)] $variant),+
    }

    impl $name {
      pub const ALL: &'static [$name] = &[$($name::$variant),+];

      pub fn as_str(&self) -> &'static str {
        match self {
          $($name::$variant => $text),+
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl std::str::FromStr for $name {
      type Err = crate::error::ShopError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($text => Ok($name::$variant),)+
          other => Err(crate::error::ShopError::Validation(format!(
            "Unknown {} '{}'",
            stringify!($name),
            other
          ))),
        }
      }
    }
  };
}

pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod payment;
pub mod user;

pub use analytics::{CustomerMetric, DateRange, InventoryMetric, MetricDelta, ProductPerformance, SalesMetric};
pub use cart::{Cart, CartItem, CartLine, CartView};
pub use catalog::{
  Category, Inventory, MovementType, Product, ProductFilter, ProductImage, ProductReview, ReviewSummary, StockMovement,
};
pub use checkout::{
  CheckoutLine, CheckoutSession, CheckoutStatus, DeliveryType, DeliveryZone, PaymentMethod, PaymentMethodProvider,
  PickupLocation,
};
pub use order::{Order, OrderItem, OrderNote, OrderPaymentStatus, OrderStatus, OrderStatusHistory};
pub use payment::{
  MobilePayment, MobilePaymentProvider, NotificationType, PaymentNotification, PaymentStatus, PaymentTarget,
  ProviderCode,
};
pub use user::{Address, AddressType, AuthToken, NotificationLevel, ProductList, Theme, User, UserPreference};

/// Currency every amount in the store is denominated in.
pub const CURRENCY: &str = "UGX";

/// Rounds a monetary amount to two decimal places (banker's rounding, as the
/// database NUMERIC(12,2) columns would).
pub fn round_money(amount: Decimal) -> Decimal {
  amount.round_dp(2)
}

/// Formats an amount the way customer-facing messages show it: `UGX 1,234.50`.
pub fn format_currency(amount: Decimal) -> String {
  let rounded = round_money(amount);
  let text = format!("{:.2}", rounded);
  let (sign, digits) = match text.strip_prefix('-') {
    Some(rest) => ("-", rest),
    None => ("", text.as_str()),
  };
  let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

  let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
  for (i, ch) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(ch);
  }
  format!("{} {}{}.{}", CURRENCY, sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn formats_with_thousand_separators() {
    assert_eq!(format_currency(dec!(1234567.5)), "UGX 1,234,567.50");
    assert_eq!(format_currency(dec!(100)), "UGX 100.00");
    assert_eq!(format_currency(dec!(0)), "UGX 0.00");
  }

  #[test]
  fn rounds_to_cents() {
    assert_eq!(round_money(dec!(10.005)), dec!(10.00));
    assert_eq!(round_money(dec!(10.015)), dec!(10.02));
  }
}
