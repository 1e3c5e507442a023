// core/src/lib.rs

//! UrbanHerb: the domain core of a small online herb and produce store.
//!
//! The crate covers:
//!  - Customer accounts, bearer tokens and saved addresses.
//!  - A category tree, products and stock movements.
//!  - Carts, time-limited checkout sessions and their conversion into orders.
//!  - Mobile-money collections (MTN, Airtel) with signed webhooks and retries.
//!  - Daily sales, inventory, customer and product metrics.
//!
//! Persistence sits behind the [`Store`] trait; [`MemoryStore`] ships here and
//! the server crate provides a PostgreSQL implementation.

pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::error::{ShopError, ShopResult};

pub use crate::store::{DynStore, MemoryStore, Store};

pub use crate::providers::{PaymentProvider, ProviderRegistry, ProviderSettings};

pub use crate::services::{ShopServices, ShopSettings};
