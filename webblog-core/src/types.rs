//! Core data types for webblog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique, immutable subject identifier (the username)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub const MAX_LEN: usize = 50;

    /// Create a new subject ID with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.is_empty() {
            return Err(crate::WebblogError::InvalidIdentifier("empty subject".to_string()));
        }

        if name.chars().count() > Self::MAX_LEN {
            return Err(crate::WebblogError::InvalidIdentifier(format!(
                "subject longer than {} characters",
                Self::MAX_LEN
            )));
        }

        if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(crate::WebblogError::InvalidIdentifier(format!(
                "invalid characters in '{}'",
                name.escape_debug()
            )));
        }

        Ok(SubjectId(name.to_string()))
    }

    /// Get the subject as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alternate login identifier, such as an email address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoginIdentifier(String);

impl LoginIdentifier {
    pub const MAX_LEN: usize = 100;

    /// Create a new login identifier with validation.
    ///
    /// No normalization is applied: lookups are case-sensitive.
    pub fn new(identifier: &str) -> crate::Result<Self> {
        if identifier.is_empty() {
            return Err(crate::WebblogError::InvalidIdentifier("empty identifier".to_string()));
        }

        if identifier.chars().count() > Self::MAX_LEN {
            return Err(crate::WebblogError::InvalidIdentifier(format!(
                "identifier longer than {} characters",
                Self::MAX_LEN
            )));
        }

        if identifier.chars().any(|c| c.is_control()) {
            return Err(crate::WebblogError::InvalidIdentifier(
                "control characters not allowed".to_string(),
            ));
        }

        Ok(LoginIdentifier(identifier.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Saturating addition of a millisecond offset
    pub fn plus_millis(&self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// An authenticated identity record.
///
/// Created by the registration path in the store; read-only to the
/// authentication engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: SubjectId,
    pub alternate_identifiers: Vec<LoginIdentifier>,
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Create a principal stamped with the current time
    pub fn new(
        subject: SubjectId,
        alternate_identifiers: Vec<LoginIdentifier>,
        credential_hash: String,
    ) -> Self {
        Principal {
            subject,
            alternate_identifiers,
            credential_hash,
            created_at: Utc::now(),
        }
    }

    /// The first alternate identifier, reported to clients as `mail`
    pub fn mail(&self) -> Option<&LoginIdentifier> {
        self.alternate_identifiers.first()
    }

    /// Whether `identifier` equals the subject or any alternate identifier
    pub fn matches_login(&self, identifier: &str) -> bool {
        self.subject.as_str() == identifier
            || self.alternate_identifiers.iter().any(|alt| alt.as_str() == identifier)
    }

    /// Every identifier this principal can log in with, subject first
    pub fn login_identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.subject.as_str())
            .chain(self.alternate_identifiers.iter().map(|alt| alt.as_str()))
    }
}
