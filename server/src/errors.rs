// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use urbanherb::ShopError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Shop(#[from] ShopError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Text placed in the `error` field of the response body. Storage and
  /// internal details stay in the logs.
  fn public_message(&self) -> String {
    match self {
      AppError::Shop(ShopError::Storage(_)) | AppError::Sqlx(_) | AppError::Migration(_) => {
        "Database operation failed".to_string()
      }
      AppError::Shop(ShopError::Internal(_)) | AppError::Internal(_) => "An internal error occurred".to_string(),
      AppError::Shop(ShopError::Provider { provider, .. }) => {
        format!("Payment provider {} is unavailable, please try again", provider)
      }
      AppError::Shop(e) => e.message().to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_error) => AppError::Sqlx(sqlx_error),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Shop(e) => match e {
        ShopError::Validation(_) | ShopError::InvalidState(_) | ShopError::Payment(_) => StatusCode::BAD_REQUEST,
        ShopError::Auth(_) => StatusCode::UNAUTHORIZED,
        ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
        ShopError::NotFound(_) => StatusCode::NOT_FOUND,
        ShopError::Conflict(_) => StatusCode::CONFLICT,
        ShopError::Provider { .. } => StatusCode::BAD_GATEWAY,
        ShopError::Storage(_) | ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migration(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with error");
    }
    HttpResponse::build(status).json(json!({ "error": self.public_message() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
