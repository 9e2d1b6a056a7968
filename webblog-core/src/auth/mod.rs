//! Stateless request authentication for webblog
//!
//! This module implements the authentication engine with:
//! - HMAC-signed, time-bounded session tokens
//! - Argon2id credential verification
//! - A pluggable principal resolver
//! - The login use case tying them together

pub mod config;
pub mod login;
pub mod password;
pub mod resolver;
pub mod token;

pub use config::*;
pub use login::*;
pub use password::*;
pub use resolver::*;
pub use token::*;
