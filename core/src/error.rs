// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Authentication failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  /// The entity exists but is not in a state that allows the operation.
  #[error("Invalid state: {0}")]
  InvalidState(String),

  #[error("Payment error: {0}")]
  Payment(String),

  #[error("Payment provider '{provider}' failed. Source: {source}")]
  Provider {
    provider: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Storage error: {0}")]
  Storage(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl ShopError {
  pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
    ShopError::NotFound(format!("{} {} not found", kind, id))
  }

  pub fn provider(code: impl Into<String>, source: impl Into<AnyhowError>) -> Self {
    ShopError::Provider {
      provider: code.into(),
      source: source.into(),
    }
  }

  /// The message without the variant prefix, suitable for API clients.
  pub fn message(&self) -> &str {
    match self {
      ShopError::Validation(m)
      | ShopError::Auth(m)
      | ShopError::Forbidden(m)
      | ShopError::NotFound(m)
      | ShopError::Conflict(m)
      | ShopError::InvalidState(m)
      | ShopError::Payment(m)
      | ShopError::Storage(m)
      | ShopError::Internal(m) => m,
      ShopError::Provider { provider, .. } => provider,
    }
  }
}

impl From<AnyhowError> for ShopError {
  fn from(err: AnyhowError) -> Self {
    ShopError::Internal(err.to_string())
  }
}

pub type ShopResult<T, E = ShopError> = std::result::Result<T, E>;
