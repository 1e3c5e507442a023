// server/src/state.rs
use std::sync::Arc;
use tracing::{info, warn};

use urbanherb::services::LogSender;
use urbanherb::{DynStore, MemoryStore, ProviderRegistry, ShopServices};

use crate::config::AppConfig;
use crate::db::{self, PgStore};
use crate::errors::Result;

#[derive(Clone)]
pub struct AppState {
  pub services: Arc<ShopServices>,
  pub config: Arc<AppConfig>, // Share loaded config
}

impl AppState {
  /// Wires the services over Postgres when a database URL is configured, and
  /// over the in-memory store otherwise.
  pub async fn from_config(config: Arc<AppConfig>) -> Result<Self> {
    let store: DynStore = match &config.database_url {
      Some(url) => {
        let pool = db::connect(url).await?;
        if config.run_migrations {
          db::run_migrations(&pool).await?;
        }
        Arc::new(PgStore::new(pool))
      }
      None => {
        warn!("DATABASE_URL is not set; using the in-memory store. Data is lost on restart.");
        Arc::new(MemoryStore::new())
      }
    };
    let registry = ProviderRegistry::new(&config.provider_settings())?;
    Ok(Self::with_store(store, registry, config))
  }

  pub fn with_store(store: DynStore, registry: ProviderRegistry, config: Arc<AppConfig>) -> Self {
    let sender = Arc::new(LogSender::new(config.email_sender.clone(), config.sms_sender_id.clone()));
    let services = ShopServices::new(store, registry, sender, &config.shop_settings());
    info!(sandbox = config.payment_sandbox, "Shop services initialized.");
    Self {
      services: Arc::new(services),
      config,
    }
  }
}
