use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use zeroize::Zeroize;

use crate::error::{GalleryError, GalleryResult};

/// Bearer credential handed to every network-touching operation.
///
/// When the token is a JWT its `exp` claim is read (never verified) so an
/// expired session is detected before a request is sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into().trim().to_string();
        let expires_at = jwt_expiry(&token);
        Self { token, expires_at }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn ensure_valid_at(&self, now: DateTime<Utc>) -> GalleryResult<()> {
        if self.token.is_empty() {
            return Err(GalleryError::Unauthorized("missing credential".into()));
        }
        if self.is_expired_at(now) {
            return Err(GalleryError::Unauthorized("credential expired".into()));
        }
        Ok(())
    }

    pub fn ensure_valid(&self) -> GalleryResult<()> {
        self.ensure_valid_at(Utc::now())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}
