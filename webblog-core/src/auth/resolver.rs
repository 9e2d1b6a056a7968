//! Principal lookup capability consumed by login and the request gate

use crate::{Principal, Result, WebblogError};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves a login identifier to a principal.
///
/// `identifier` may be the subject or any alternate identifier; matching is
/// case-sensitive. Implementations must not hold a process-wide lock across
/// the lookup.
pub trait PrincipalResolver: Send + Sync {
    /// `Ok(None)` means not found; `Err` means the backing store failed
    fn resolve_by_login_identifier(&self, identifier: &str) -> Result<Option<Principal>>;
}

impl<T: PrincipalResolver + ?Sized> PrincipalResolver for Arc<T> {
    fn resolve_by_login_identifier(&self, identifier: &str) -> Result<Option<Principal>> {
        (**self).resolve_by_login_identifier(identifier)
    }
}

/// Reject `candidate` if any of its identifiers is already taken, in either
/// field, by some principal. `taken` answers for a single identifier.
pub fn ensure_identifiers_available(
    candidate: &Principal,
    mut taken: impl FnMut(&str) -> Result<bool>,
) -> Result<()> {
    let mut seen = Vec::new();
    for identifier in candidate.login_identifiers() {
        if seen.contains(&identifier) || taken(identifier)? {
            return Err(WebblogError::DuplicateIdentifier(identifier.to_string()));
        }
        seen.push(identifier);
    }
    Ok(())
}

/// Immutable-after-build resolver held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryResolver {
    by_subject: HashMap<String, Principal>,
    alternate_index: HashMap<String, String>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, enforcing combined identifier uniqueness
    pub fn from_principals(principals: impl IntoIterator<Item = Principal>) -> Result<Self> {
        let mut resolver = Self::new();
        for principal in principals {
            resolver.insert(principal)?;
        }
        Ok(resolver)
    }

    pub fn insert(&mut self, principal: Principal) -> Result<()> {
        ensure_identifiers_available(&principal, |identifier| {
            Ok(self.resolve_by_login_identifier(identifier)?.is_some())
        })?;

        for alternate in &principal.alternate_identifiers {
            self.alternate_index
                .insert(alternate.as_str().to_string(), principal.subject.as_str().to_string());
        }
        self.by_subject
            .insert(principal.subject.as_str().to_string(), principal);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_subject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subject.is_empty()
    }
}

impl PrincipalResolver for InMemoryResolver {
    fn resolve_by_login_identifier(&self, identifier: &str) -> Result<Option<Principal>> {
        // Subject wins over alternate identifiers
        if let Some(principal) = self.by_subject.get(identifier) {
            return Ok(Some(principal.clone()));
        }

        Ok(self
            .alternate_index
            .get(identifier)
            .and_then(|subject| self.by_subject.get(subject))
            .cloned())
    }
}
