use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::helpers::time::{now_i64, now_utc};

/// Opaque bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    /// `exp` claim when the value is a JWT, unix seconds
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: i64,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let expires_at = jwt_expiration(&value);
        Self {
            value,
            issued_at: now_utc(),
            expires_at,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }

    /// Only known for JWTs; opaque tokens are never reported as expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now_i64())
    }
}

fn jwt_expiration(value: &str) -> Option<i64> {
    let mut parts = value.split('.');
    let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<JwtClaims>(&decoded)
        .ok()
        .map(|claims| claims.exp)
}
