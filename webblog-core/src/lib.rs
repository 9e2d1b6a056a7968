//! Core data models and authentication engine for webblog

pub mod auth;
pub mod error;
pub mod types;

pub use error::*;
pub use types::*;

/// Result type alias for webblog operations
pub type Result<T> = std::result::Result<T, WebblogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id_creation() {
        let subject = SubjectId::new("alice").unwrap();
        assert_eq!(subject.as_str(), "alice");
    }

    #[test]
    fn test_subject_id_validation() {
        assert!(SubjectId::new("bob").is_ok());
        assert!(SubjectId::new("bob_the-2nd").is_ok());

        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("has space").is_err());
        assert!(SubjectId::new("line\nbreak").is_err());
        assert!(SubjectId::new(&"x".repeat(SubjectId::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_principal_public_fields() {
        let principal = Principal::new(
            SubjectId::new("bob").unwrap(),
            vec![LoginIdentifier::new("bob@example.com").unwrap()],
            "$argon2id$stub".to_string(),
        );

        assert!(principal.matches_login("bob"));
        assert!(principal.matches_login("bob@example.com"));
        assert!(!principal.matches_login("Bob"));
        assert_eq!(principal.mail().map(|m| m.as_str()), Some("bob@example.com"));
    }
}
