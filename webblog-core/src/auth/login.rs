//! Login use case: credentials in, session token out

use crate::auth::{verify_password, CredentialHasher, PrincipalResolver, TokenCodec, TOKEN_TYPE};
use crate::{Result, Timestamp, WebblogError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Submitted login form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Subject or alternate identifier
    pub login: String,
    pub password: String,
}

impl LoginRequest {
    pub const LOGIN_MIN_LEN: usize = 3;
    pub const LOGIN_MAX_LEN: usize = 100;
    pub const PASSWORD_MIN_LEN: usize = 6;

    /// Field-level shape checks, as `field: message` strings
    pub fn field_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let login_len = self.login.chars().count();
        if self.login.trim().is_empty() {
            errors.push("login: Login cannot be blank".to_string());
        } else if !(Self::LOGIN_MIN_LEN..=Self::LOGIN_MAX_LEN).contains(&login_len) {
            errors.push(format!(
                "login: Login must be between {} and {} characters",
                Self::LOGIN_MIN_LEN,
                Self::LOGIN_MAX_LEN
            ));
        }

        if self.password.trim().is_empty() {
            errors.push("password: Password cannot be blank".to_string());
        } else if self.password.chars().count() < Self::PASSWORD_MIN_LEN {
            errors.push(format!(
                "password: Password must be at least {} characters long",
                Self::PASSWORD_MIN_LEN
            ));
        }

        errors
    }
}

/// Successful login payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in milliseconds
    pub expires_in: u64,
    pub username: String,
    pub mail: Option<String>,
}

/// Verifies credentials and issues session tokens. Stores nothing.
pub struct LoginService {
    resolver: Arc<dyn PrincipalResolver>,
    codec: Arc<TokenCodec>,
    decoy_hash: String,
}

impl LoginService {
    /// Uses production hashing cost for the unknown-identifier decoy
    pub fn new(resolver: Arc<dyn PrincipalResolver>, codec: Arc<TokenCodec>) -> Result<Self> {
        Self::with_hasher(resolver, codec, &CredentialHasher::new())
    }

    /// Unknown identifiers are verified against a decoy hash from `hasher`
    /// so both failure paths cost one Argon2 verification.
    pub fn with_hasher(
        resolver: Arc<dyn PrincipalResolver>,
        codec: Arc<TokenCodec>,
        hasher: &CredentialHasher,
    ) -> Result<Self> {
        let decoy_hash = hasher.hash("webblog-decoy-credential")?;
        Ok(LoginService {
            resolver,
            codec,
            decoy_hash,
        })
    }

    /// Log in at the current wall-clock time
    pub fn authenticate(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.login(request, Timestamp::now())
    }

    /// Single pass: resolve, verify, issue.
    ///
    /// Every failure is reported as [`WebblogError::InvalidCredentials`].
    pub fn login(&self, request: &LoginRequest, now: Timestamp) -> Result<LoginResponse> {
        let principal = match self.resolver.resolve_by_login_identifier(&request.login) {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                let _ = verify_password(&request.password, &self.decoy_hash);
                warn!("Authentication failed for user: {:?}", request.login);
                return Err(WebblogError::InvalidCredentials);
            }
            Err(e) => {
                error!("Authentication error for user: {:?}: {}", request.login, e);
                return Err(WebblogError::InvalidCredentials);
            }
        };

        if !verify_password(&request.password, &principal.credential_hash) {
            warn!("Authentication failed for user: {:?}", request.login);
            return Err(WebblogError::InvalidCredentials);
        }

        let token = self.codec.issue(&principal.subject, now).map_err(|e| {
            error!("Token issuance failed for '{}': {}", principal.subject, e);
            WebblogError::InvalidCredentials
        })?;

        info!("User '{}' authenticated successfully", principal.subject);

        Ok(LoginResponse {
            access_token: token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.codec.ttl_ms(),
            username: principal.subject.as_str().to_string(),
            mail: principal.mail().map(|m| m.as_str().to_string()),
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}
