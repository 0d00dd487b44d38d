//! Admin bearer-token gate. A single static token from config is compared
//! against the `Authorization` header with a constant-time byte comparison;
//! JWT/OAuth session management is out of scope here.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::AppState;

/// Extractor gating admin routes. Use as a handler parameter:
/// `AdminUser: AdminUser` — its presence proves the bearer token matched.
pub struct AdminUser;

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        if constant_time_eq(token.as_bytes(), state.config.admin_token.as_bytes()) {
            Ok(AdminUser)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// Constant-time comparison of two equal-length-checked byte sequences.
/// Unequal lengths short-circuit (length is not secret here) but the
/// per-byte comparison never branches on content.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn equal_sequences_match() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
    }

    #[test]
    fn differing_sequences_do_not_match() {
        assert!(!constant_time_eq(b"secret-token", b"wrong-token!"));
    }

    #[test]
    fn differing_lengths_do_not_match() {
        assert!(!constant_time_eq(b"short", b"much-longer-value"));
    }
}
