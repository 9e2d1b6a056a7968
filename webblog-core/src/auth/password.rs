//! Credential hashing and verification with Argon2id.
//!
//! Stored credentials are PHC strings; verification re-derives the hash with
//! the parameters embedded in the stored string and compares in constant
//! time inside the `argon2` crate.

use crate::{Result, WebblogError};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};
use password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use tracing::warn;

/// Argon2id hasher used by the registration path
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher {
    /// m=19456 KiB, t=2, p=1
    pub fn new() -> Self {
        CredentialHasher {
            params: Params::default(),
        }
    }

    /// Create a hasher with custom cost parameters
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| WebblogError::Hashing(format!("invalid parameters: {}", e)))?;
        Ok(CredentialHasher { params })
    }

    /// Minimal-cost hasher so store and server tests stay fast
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fast() -> Self {
        Self::with_params(Params::MIN_M_COST, 1, 1).expect("minimum argon2 params are valid")
    }

    /// Hash `secret` into a PHC string with a fresh random salt
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| WebblogError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }
}

/// Check `supplied` against a stored PHC hash.
///
/// An unparseable stored hash never matches.
pub fn verify_password(supplied: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored credential hash is not a valid PHC string: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(supplied.as_bytes(), &parsed)
        .is_ok()
}

/// Hash with production parameters
pub fn hash_password(secret: &str) -> Result<String> {
    CredentialHasher::new().hash(secret)
}
