// core/src/providers/signature.rs

//! HMAC-SHA256 webhook signatures, hex encoded, as sent in `X-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ShopError, ShopResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";

fn mac_for(secret: &str) -> ShopResult<HmacSha256> {
  HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| ShopError::Internal(format!("Invalid HMAC key: {}", e)))
}

/// Lowercase hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> ShopResult<String> {
  let mut mac = mac_for(secret)?;
  mac.update(body);
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Malformed hex, an empty secret or
/// an empty signature never verify.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
  if secret.is_empty() {
    return false;
  }
  let Ok(expected) = hex::decode(signature.trim()) else {
    return false;
  };
  if expected.is_empty() {
    return false;
  }
  match mac_for(secret) {
    Ok(mut mac) => {
      mac.update(body);
      mac.verify_slice(&expected).is_ok()
    }
    Err(_) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "whsec_test";
  const BODY: &[u8] = br#"{"transaction_id":"MP-ABCDEF123456","status":"SUCCESSFUL"}"#;

  #[test]
  fn valid_signature_verifies() {
    let signature = sign(SECRET, BODY).unwrap();
    assert_eq!(signature.len(), 64);
    assert!(verify(SECRET, BODY, &signature));
    assert!(verify(SECRET, BODY, &signature.to_uppercase()));
  }

  #[test]
  fn modified_body_fails() {
    let signature = sign(SECRET, BODY).unwrap();
    assert!(!verify(SECRET, br#"{"transaction_id":"MP-ABCDEF123456","status":"FAILED"}"#, &signature));
  }

  #[test]
  fn wrong_secret_or_garbage_fails() {
    let signature = sign(SECRET, BODY).unwrap();
    assert!(!verify("other", BODY, &signature));
    assert!(!verify(SECRET, BODY, "not-hex"));
    assert!(!verify(SECRET, BODY, ""));
    assert!(!verify("", BODY, &signature));
  }
}
