// server/src/web/extractors.rs

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use urbanherb::models::User;
use urbanherb::ShopError;

use crate::errors::AppError;
use crate::state::AppState;

/// Reads the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
  let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let token = token.trim();
  (!token.is_empty()).then(|| token.to_string())
}

/// The user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user: User,
  pub token: String,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let token = bearer_token(req);
    Box::pin(async move {
      let state = state.ok_or_else(|| AppError::Internal("Application state is not configured".to_string()))?;
      let token = token.ok_or_else(|| {
        warn!("Request without bearer token.");
        ShopError::Auth("Authentication credentials were not provided".to_string())
      })?;
      let user = state.services.accounts.authenticate(&token).await?;
      Ok(AuthenticatedUser { user, token })
    })
  }
}

/// An authenticated staff member; anyone else gets 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

impl FromRequest for StaffUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let authenticated = AuthenticatedUser::from_request(req, payload);
    Box::pin(async move {
      let AuthenticatedUser { user, .. } = authenticated.await?;
      if !user.is_staff {
        warn!(user_id = %user.id, "Non-staff user attempted a staff operation.");
        return Err(ShopError::Forbidden("Staff access required".to_string()).into());
      }
      Ok(StaffUser(user))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::bearer_token;
  use actix_web::test::TestRequest;

  #[test]
  fn bearer_token_requires_the_bearer_scheme() {
    let req = TestRequest::default()
      .insert_header(("Authorization", "Bearer abc123"))
      .to_http_request();
    assert_eq!(bearer_token(&req).as_deref(), Some("abc123"));

    let req = TestRequest::default()
      .insert_header(("Authorization", "bearer   spaced "))
      .to_http_request();
    assert_eq!(bearer_token(&req).as_deref(), Some("spaced"));

    let req = TestRequest::default()
      .insert_header(("Authorization", "Basic dXNlcjpwdw=="))
      .to_http_request();
    assert_eq!(bearer_token(&req), None);

    let req = TestRequest::default()
      .insert_header(("Authorization", "Bearer "))
      .to_http_request();
    assert_eq!(bearer_token(&req), None);

    assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
  }
}
