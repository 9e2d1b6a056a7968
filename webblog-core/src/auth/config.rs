//! Signing configuration injected into the token codec

use crate::{Result, WebblogError};
use std::fmt;

/// Minimum HMAC-SHA256 key length in bytes (256 bits)
pub const MIN_SECRET_LEN: usize = 32;

/// Immutable, validated signing configuration.
///
/// Loaded once at startup. Rotating the secret invalidates every outstanding
/// token; `key_id` is stamped into token headers so a rotation scheme can
/// tell key generations apart.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    ttl_ms: u64,
    key_id: Option<String>,
}

impl AuthConfig {
    /// Validate and build a configuration
    pub fn new(secret: impl Into<Vec<u8>>, ttl_ms: u64) -> Result<Self> {
        let secret = secret.into();

        if secret.is_empty() {
            return Err(WebblogError::Config("signing secret is required".to_string()));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(WebblogError::Config(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            )));
        }

        if ttl_ms == 0 {
            return Err(WebblogError::Config("token TTL must be positive".to_string()));
        }

        Ok(AuthConfig {
            secret,
            ttl_ms,
            key_id: None,
        })
    }

    /// Attach a key identifier written to and required in token headers
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        if key_id.trim().is_empty() {
            return Err(WebblogError::Config("key id must not be blank".to_string()));
        }
        self.key_id = Some(key_id);
        Ok(self)
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("ttl_ms", &self.ttl_ms)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
