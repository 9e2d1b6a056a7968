//! Error types for webblog

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebblogError {
    /// Unknown login identifier or wrong secret. Both render the same message.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Identifier already in use: {0}")]
    DuplicateIdentifier(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebblogError {
    /// Token rejections never leave the codec or the gate as faults.
    pub fn is_token_rejection(&self) -> bool {
        matches!(self, WebblogError::TokenInvalid(_) | WebblogError::TokenExpired)
    }
}
