// server/src/config.rs

use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use urbanherb::{ProviderSettings, ShopSettings};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// When absent the server runs on the in-memory store.
  pub database_url: Option<String>,
  pub run_migrations: bool,

  pub checkout_session_ttl_minutes: i64,
  pub auth_token_ttl_hours: i64,

  pub payment_sandbox: bool,
  pub payment_max_retries: i32,
  pub provider_http_timeout_secs: u64,

  pub email_sender: String,
  pub sms_sender_id: String,
}

impl Default for AppConfig {
  fn default() -> Self {
    let shop = ShopSettings::default();
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      database_url: None,
      run_migrations: false,
      checkout_session_ttl_minutes: shop.checkout_session_ttl_minutes,
      auth_token_ttl_hours: shop.auth_token_ttl_hours,
      payment_sandbox: true,
      payment_max_retries: shop.payment_max_retries,
      provider_http_timeout_secs: 15,
      email_sender: "noreply@urbanherb.example".to_string(),
      sms_sender_id: "URBANHERB".to_string(),
    }
  }
}

fn parse<T>(name: &str, raw: String) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());
    let defaults = Self::default();

    let server_host = get_env("SERVER_HOST").unwrap_or(defaults.server_host);
    let server_port = match get_env("SERVER_PORT") {
      Some(raw) => parse("SERVER_PORT", raw)?,
      None => defaults.server_port,
    };
    let database_url = get_env("DATABASE_URL");
    let run_migrations = match get_env("RUN_MIGRATIONS") {
      Some(raw) => parse("RUN_MIGRATIONS", raw)?,
      None => defaults.run_migrations,
    };
    let checkout_session_ttl_minutes = match get_env("CHECKOUT_SESSION_TTL_MINUTES") {
      Some(raw) => parse("CHECKOUT_SESSION_TTL_MINUTES", raw)?,
      None => defaults.checkout_session_ttl_minutes,
    };
    let auth_token_ttl_hours = match get_env("AUTH_TOKEN_TTL_HOURS") {
      Some(raw) => parse("AUTH_TOKEN_TTL_HOURS", raw)?,
      None => defaults.auth_token_ttl_hours,
    };
    let payment_sandbox = match get_env("PAYMENT_SANDBOX") {
      Some(raw) => parse("PAYMENT_SANDBOX", raw)?,
      None => defaults.payment_sandbox,
    };
    let payment_max_retries = match get_env("PAYMENT_MAX_RETRIES") {
      Some(raw) => parse("PAYMENT_MAX_RETRIES", raw)?,
      None => defaults.payment_max_retries,
    };
    let provider_http_timeout_secs = match get_env("PROVIDER_HTTP_TIMEOUT_SECS") {
      Some(raw) => parse("PROVIDER_HTTP_TIMEOUT_SECS", raw)?,
      None => defaults.provider_http_timeout_secs,
    };
    let email_sender = get_env("EMAIL_SENDER").unwrap_or(defaults.email_sender);
    let sms_sender_id = get_env("SMS_SENDER_ID").unwrap_or(defaults.sms_sender_id);

    if checkout_session_ttl_minutes <= 0 {
      return Err(AppError::Config("CHECKOUT_SESSION_TTL_MINUTES must be positive".to_string()));
    }
    if payment_max_retries < 0 {
      return Err(AppError::Config("PAYMENT_MAX_RETRIES cannot be negative".to_string()));
    }

    tracing::info!(
      sandbox = payment_sandbox,
      persistent = database_url.is_some(),
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      database_url,
      run_migrations,
      checkout_session_ttl_minutes,
      auth_token_ttl_hours,
      payment_sandbox,
      payment_max_retries,
      provider_http_timeout_secs,
      email_sender,
      sms_sender_id,
    })
  }

  pub fn shop_settings(&self) -> ShopSettings {
    ShopSettings {
      checkout_session_ttl_minutes: self.checkout_session_ttl_minutes,
      auth_token_ttl_hours: self.auth_token_ttl_hours,
      payment_max_retries: self.payment_max_retries,
    }
  }

  pub fn provider_settings(&self) -> ProviderSettings {
    ProviderSettings {
      sandbox: self.payment_sandbox,
      http_timeout: Duration::from_secs(self.provider_http_timeout_secs),
    }
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
