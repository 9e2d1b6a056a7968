//! Session token codec
//!
//! Issues and validates HMAC-SHA256 signed JWTs carrying a subject and a
//! millisecond-precision validity window. The registered `iat`/`exp` claims
//! are second-granular, so the window travels in `iat_ms`/`exp_ms` and the
//! expiry check is done here rather than by the JWT library.

use crate::auth::AuthConfig;
use crate::{Result, SubjectId, Timestamp, WebblogError};
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Scheme marker returned to clients alongside the token
pub const TOKEN_TYPE: &str = "Bearer";

/// Encoded length of an unpadded base64url HMAC-SHA256 tag
const SIGNATURE_B64_LEN: usize = 43;

/// Validity window carried in the token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ValidityWindow {
    #[serde(rename = "iat_ms")]
    issued_at: u64,
    #[serde(rename = "exp_ms")]
    expires_at: u64,
}

/// Decoded, signature-checked token contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub subject: SubjectId,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SessionClaims {
    /// Strict: a token is dead at exactly `expires_at`
    pub fn is_live_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Creates and checks session tokens with the process-wide signing key
pub struct TokenCodec {
    key: HS256Key,
    key_id: Option<String>,
    ttl_ms: u64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut key = HS256Key::from_bytes(config.secret());
        if let Some(key_id) = config.key_id() {
            key = key.with_key_id(key_id);
        }

        TokenCodec {
            key,
            key_id: config.key_id().map(str::to_string),
            ttl_ms: config.ttl_ms(),
        }
    }

    /// Configured token lifetime in milliseconds
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Sign a token for `subject` valid over `[now, now + ttl)`
    pub fn issue(&self, subject: &SubjectId, now: Timestamp) -> Result<String> {
        let window = ValidityWindow {
            issued_at: now.as_millis(),
            expires_at: now.plus_millis(self.ttl_ms).as_millis(),
        };

        // The registered times are second-granular and checked against the
        // library's clock, so they are cleared. A zero lifetime keeps the
        // library's own `now + valid_for` from overflowing on long TTLs.
        let mut claims = Claims::with_custom_claims(window, Duration::from_secs(0));
        claims.issued_at = None;
        claims.expires_at = None;
        claims.invalid_before = None;
        let claims = claims.with_subject(subject.as_str());

        self.key
            .authenticate(claims)
            .map_err(|e| WebblogError::Internal(format!("token signing failed: {}", e)))
    }

    /// True only for an intact token from this key that is live right now
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Timestamp::now())
    }

    /// True only for an intact token from this key with `now < expires_at`.
    ///
    /// Every failure (malformed, bad signature, wrong key id, expired)
    /// collapses into `false`.
    pub fn validate_at(&self, token: &str, now: Timestamp) -> bool {
        match self.decode(token, now) {
            Ok(_) => true,
            Err(e) => {
                debug!("Token rejected: {}", e);
                false
            }
        }
    }

    /// Extract the subject of a signature-intact token.
    ///
    /// Does not check expiry: an expired token still yields its subject.
    /// Callers must gate on [`TokenCodec::validate`] first.
    pub fn subject_of(&self, token: &str) -> Option<SubjectId> {
        match self.verify_signature(token) {
            Ok(claims) => Some(claims.subject),
            Err(e) => {
                debug!("Cannot extract subject from token: {}", e);
                None
            }
        }
    }

    /// Verify signature and expiry, reporting why a token was refused
    pub fn decode(&self, token: &str, now: Timestamp) -> Result<SessionClaims> {
        let claims = self.verify_signature(token)?;
        if !claims.is_live_at(now) {
            return Err(WebblogError::TokenExpired);
        }
        Ok(claims)
    }

    fn verify_signature(&self, token: &str) -> Result<SessionClaims> {
        if token.trim().is_empty() {
            return Err(WebblogError::TokenInvalid("empty token".to_string()));
        }

        if !has_canonical_signature(token) {
            return Err(WebblogError::TokenInvalid("malformed token".to_string()));
        }

        let options = VerificationOptions {
            required_key_id: self.key_id.clone(),
            ..Default::default()
        };

        let verified = self
            .key
            .verify_token::<ValidityWindow>(token, Some(options))
            .map_err(|e| WebblogError::TokenInvalid(e.to_string()))?;

        let subject = verified
            .subject
            .as_deref()
            .ok_or_else(|| WebblogError::TokenInvalid("missing subject".to_string()))
            .and_then(|s| {
                SubjectId::new(s).map_err(|e| WebblogError::TokenInvalid(e.to_string()))
            })?;

        Ok(SessionClaims {
            subject,
            issued_at: Timestamp::from_millis(verified.custom.issued_at),
            expires_at: Timestamp::from_millis(verified.custom.expires_at),
        })
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key_id", &self.key_id)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

/// Three segments, and a signature segment whose unused trailing bits are
/// zero so that no two encodings map to the same tag.
fn has_canonical_signature(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return false;
    };

    if header.is_empty() || payload.is_empty() || signature.len() != SIGNATURE_B64_LEN {
        return false;
    }

    // 43 chars carry 258 bits for a 256-bit tag: the last symbol's two low
    // bits must be clear.
    signature
        .bytes()
        .last()
        .and_then(base64url_value)
        .is_some_and(|v| v & 0b11 == 0)
}

fn base64url_value(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret-that-is-long-enough";

    fn codec(ttl_ms: u64) -> TokenCodec {
        TokenCodec::new(&AuthConfig::new(SECRET, ttl_ms).unwrap())
    }

    fn alice() -> SubjectId {
        SubjectId::new("alice").unwrap()
    }

    #[test]
    fn test_century_ttl_issues_and_validates() {
        let ttl_ms: u64 = 100 * 365 * 24 * 60 * 60 * 1000;
        let codec = codec(ttl_ms);
        let now = Timestamp::now();

        let token = codec.issue(&alice(), now).unwrap();
        let claims = codec.decode(&token, now).unwrap();

        assert_eq!(claims.expires_at, now.plus_millis(ttl_ms));
        assert!(codec.validate_at(&token, now.plus_millis(ttl_ms - 1)));
        assert!(!codec.validate_at(&token, now.plus_millis(ttl_ms)));
    }

    #[test]
    fn test_saturated_expiry_still_issues() {
        let codec = codec(u64::MAX);
        let now = Timestamp::from_millis(1_000);

        let token = codec.issue(&alice(), now).unwrap();
        let claims = codec.decode(&token, now).unwrap();
        assert_eq!(claims.expires_at, Timestamp::from_millis(u64::MAX));
    }

    #[test]
    fn test_issue_then_subject_roundtrip() {
        let codec = codec(60_000);
        let now = Timestamp::now();
        let token = codec.issue(&alice(), now).unwrap();

        assert!(codec.validate_at(&token, now));
        assert_eq!(codec.subject_of(&token), Some(alice()));

        let claims = codec.decode(&token, now).unwrap();
        assert_eq!(claims.issued_at, now);
        assert_eq!(claims.expires_at, now.plus_millis(60_000));
    }

    #[test]
    fn test_expiry_is_strict() {
        let codec = codec(1000);
        let t0 = Timestamp::from_millis(0);
        let token = codec.issue(&alice(), t0).unwrap();

        assert!(codec.validate_at(&token, t0));
        assert!(codec.validate_at(&token, Timestamp::from_millis(999)));
        assert!(!codec.validate_at(&token, Timestamp::from_millis(1000)));
        assert!(!codec.validate_at(&token, Timestamp::from_millis(5000)));

        assert!(matches!(
            codec.decode(&token, Timestamp::from_millis(1000)),
            Err(WebblogError::TokenExpired)
        ));
    }

    #[test]
    fn test_subject_of_ignores_expiry() {
        let codec = codec(1000);
        let token = codec.issue(&alice(), Timestamp::from_millis(0)).unwrap();

        assert!(!codec.validate(&token));
        assert_eq!(codec.subject_of(&token), Some(alice()));
    }

    #[test]
    fn test_rejects_garbage() {
        let codec = codec(60_000);
        let now = Timestamp::now();

        for token in ["", "   ", "abc", "a.b", "a.b.c", "a.b.c.d", "not.a.token"] {
            assert!(!codec.validate_at(token, now), "accepted {:?}", token);
            assert_eq!(codec.subject_of(token), None);
        }
    }

    #[test]
    fn test_rejects_other_key() {
        let ours = codec(60_000);
        let theirs = TokenCodec::new(
            &AuthConfig::new("a-completely-different-secret-value!!", 60_000).unwrap(),
        );
        let now = Timestamp::now();
        let token = theirs.issue(&alice(), now).unwrap();

        assert!(!ours.validate_at(&token, now));
        assert_eq!(ours.subject_of(&token), None);
        assert!(matches!(ours.decode(&token, now), Err(WebblogError::TokenInvalid(_))));
    }

    #[test]
    fn test_rejects_unsigned_token() {
        let codec = codec(60_000);
        let now = Timestamp::now();
        let token = codec.issue(&alice(), now).unwrap();
        let payload = token.split('.').nth(1).unwrap();

        // {"alg":"none","typ":"JWT"}
        let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.", payload);
        assert!(!codec.validate_at(&unsigned, now));
    }

    #[test]
    fn test_key_id_must_match() {
        let now = Timestamp::now();
        let config = AuthConfig::new(SECRET, 60_000).unwrap();
        let plain = TokenCodec::new(&config);
        let keyed = TokenCodec::new(&config.clone().with_key_id("2026-01").unwrap());

        let keyed_token = keyed.issue(&alice(), now).unwrap();
        assert!(keyed.validate_at(&keyed_token, now));

        let plain_token = plain.issue(&alice(), now).unwrap();
        assert!(!keyed.validate_at(&plain_token, now));
    }

    #[test]
    fn test_non_canonical_signature_rejected() {
        let codec = codec(60_000);
        let now = Timestamp::now();
        let token = codec.issue(&alice(), now).unwrap();

        let mut bytes = token.into_bytes();
        let last = bytes.len() - 1;
        let value = base64url_value(bytes[last]).unwrap();
        // Flip one of the two padding bits
        let flipped = value | 0b01;
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
        bytes[last] = ALPHABET[flipped as usize];
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(!codec.validate_at(&tampered, now));
    }
}
