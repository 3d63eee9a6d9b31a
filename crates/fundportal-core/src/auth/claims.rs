//! Best-effort decoding of access token claims.
//!
//! Tokens are opaque to this layer. When one happens to be a JWT the payload
//! is decoded *without* signature verification, for display and for an
//! early expiry check only. Nothing here is used for authorization.

use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::utils::de::opt_string_or_number;

/// Shown when the token carries no usable identity
const PLACEHOLDER_NAME: &str = "Portal user";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    /// Expiry as seconds since the epoch (JWT NumericDate, may be fractional)
    #[serde(default)]
    pub exp: Option<f64>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT-shaped token.
    /// Returns None for anything that is not `header.payload.signature`
    /// with a base64url JSON payload.
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        // Some issuers pad the segments; the URL-safe engine rejects padding
        let payload = payload.trim_end_matches('=');
        let bytes = general_purpose::URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.exp?;
        if !exp.is_finite() {
            return None;
        }
        DateTime::from_timestamp(exp.trunc() as i64, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| now >= exp).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Display identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub email: Option<String>,
    pub subject: Option<String>,
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn placeholder() -> Self {
        Self {
            email: None,
            subject: None,
            username: None,
        }
    }

    pub fn from_token(token: &str) -> Self {
        match TokenClaims::decode(token) {
            Some(claims) => Self {
                email: claims.email,
                subject: claims.sub.or(claims.user_id),
                username: claims.username,
            },
            None => Self::placeholder(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.email.is_none() && self.subject.is_none() && self.username.is_none()
    }

    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .or(self.subject.as_deref())
            .unwrap_or(PLACEHOLDER_NAME)
    }
}
