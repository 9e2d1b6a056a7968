//! Per-request authentication gate
//!
//! Runs before routing. It only ever *attempts* authentication: every
//! failure leaves the request anonymous, and enforcement is left to the
//! routes that require a principal.

use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::Request;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};
use webblog_core::auth::{PrincipalResolver, TokenCodec};
use webblog_core::{Principal, SubjectId, Timestamp};

/// Scheme prefix expected in the `Authorization` header (case-sensitive)
pub const BEARER_PREFIX: &str = "Bearer ";

/// Resolved principal attached to a request's extensions.
///
/// Set at most once per request by [`AuthGate`]; handlers only read it.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(Arc<Principal>);

impl AuthenticatedPrincipal {
    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

/// The principal attached to `req`, or `None` when anonymous
pub fn current_principal<B>(req: &Request<B>) -> Option<&Principal> {
    req.extensions()
        .get::<AuthenticatedPrincipal>()
        .map(AuthenticatedPrincipal::principal)
}

/// Why a request continued without a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    /// No `Authorization` header, wrong scheme, or empty token
    NoCredentials,
    /// Malformed, unsigned, wrongly signed, or expired token
    InvalidToken,
    /// Token validated but its subject could not be read
    UnreadableSubject,
    /// Subject no longer resolves to a principal
    UnknownPrincipal,
    /// Resolver error or panic
    Fault,
}

/// Result of running the gate on one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// A principal was already attached; nothing was done
    AlreadyAuthenticated,
    Authenticated(SubjectId),
    Anonymous(AnonymousReason),
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?;
    if token.trim().is_empty() {
        return None;
    }
    Some(token)
}

pub struct AuthGate {
    codec: Arc<TokenCodec>,
    resolver: Arc<dyn PrincipalResolver>,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>, resolver: Arc<dyn PrincipalResolver>) -> Self {
        AuthGate { codec, resolver }
    }

    /// Authenticate `req` against the current time.
    ///
    /// The resolver lookup runs on the blocking pool, so a slow credential
    /// store never stalls the executor threads serving other requests.
    pub async fn apply<B>(&self, req: &mut Request<B>) -> GateOutcome {
        if is_authenticated(req) {
            return GateOutcome::AlreadyAuthenticated;
        }

        let now = Timestamp::now();
        let checked = catch_unwind(AssertUnwindSafe(|| self.credentials(req.headers(), now)));
        let subject = match checked {
            Ok(Ok(subject)) => subject,
            Ok(Err(reason)) => return GateOutcome::Anonymous(reason),
            Err(_) => return fault("token checks panicked"),
        };

        let resolver = self.resolver.clone();
        let task = tokio::task::spawn_blocking(move || lookup(resolver.as_ref(), &subject));

        match task.await {
            Ok(Ok(principal)) => attach(req, principal),
            Ok(Err(reason)) => GateOutcome::Anonymous(reason),
            Err(e) => fault(&format!("lookup task failed: {}", e)),
        }
    }

    /// Synchronous form of [`AuthGate::apply`] at a fixed time. The lookup
    /// runs on the calling thread.
    ///
    /// Attaches a principal if `req` carries a live token for a known
    /// subject. Never fails and never rejects.
    pub fn apply_at<B>(&self, req: &mut Request<B>, now: Timestamp) -> GateOutcome {
        if is_authenticated(req) {
            return GateOutcome::AlreadyAuthenticated;
        }

        let attempt = catch_unwind(AssertUnwindSafe(|| {
            let subject = self.credentials(req.headers(), now)?;
            lookup(self.resolver.as_ref(), &subject)
        }));

        match attempt {
            Ok(Ok(principal)) => attach(req, principal),
            Ok(Err(reason)) => GateOutcome::Anonymous(reason),
            Err(_) => fault("gate panicked"),
        }
    }

    /// Token checks only; cheap enough to run inline
    fn credentials(
        &self,
        headers: &HeaderMap,
        now: Timestamp,
    ) -> std::result::Result<SubjectId, AnonymousReason> {
        let token = bearer_token(headers).ok_or(AnonymousReason::NoCredentials)?;

        // validate must precede subject_of: the latter ignores expiry
        if !self.codec.validate_at(token, now) {
            return Err(AnonymousReason::InvalidToken);
        }

        self.codec
            .subject_of(token)
            .ok_or(AnonymousReason::UnreadableSubject)
    }
}

fn is_authenticated<B>(req: &Request<B>) -> bool {
    req.extensions().get::<AuthenticatedPrincipal>().is_some()
}

fn lookup(
    resolver: &dyn PrincipalResolver,
    subject: &SubjectId,
) -> std::result::Result<Principal, AnonymousReason> {
    match resolver.resolve_by_login_identifier(subject.as_str()) {
        Ok(Some(principal)) => Ok(principal),
        Ok(None) => {
            warn!("User '{}' not found in database", subject);
            Err(AnonymousReason::UnknownPrincipal)
        }
        Err(e) => {
            error!("Cannot set user authentication: {}", e);
            Err(AnonymousReason::Fault)
        }
    }
}

fn attach<B>(req: &mut Request<B>, principal: Principal) -> GateOutcome {
    let subject = principal.subject.clone();
    req.extensions_mut()
        .insert(AuthenticatedPrincipal(Arc::new(principal)));
    debug!("User '{}' authenticated successfully", subject);
    GateOutcome::Authenticated(subject)
}

fn fault(detail: &str) -> GateOutcome {
    error!("Cannot set user authentication: {}", detail);
    GateOutcome::Anonymous(AnonymousReason::Fault)
}
