//! Caller authentication for the publish endpoint.
//!
//! Two independent mechanisms, either sufficient:
//! - a signed session token in `Authorization: Bearer <token>` (see [`token`])
//! - a static shared secret in a deployment-specific header
//!
//! Each is a [`Strategy`] yielding a [`Verdict`]; the [`Authenticator`] tries
//! them in order and accepts on the first `Accept`. Every failure surfaces to
//! the caller as the same 401, while logs distinguish a missing server-side
//! secret from a bad credential.

mod login;
pub mod token;

use contentpub_shared::{AuthSettings, PublishError, Result};
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

pub use login::{login, login_at};
pub use token::{
    IssuedToken, SessionClaims, TokenRejection, issue_session_token, verify_session_token,
};

/// Byte equality that does not short-circuit on the first differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Credentials presented with a request, extracted from its headers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Token from `Authorization: Bearer ...`.
    pub bearer: Option<String>,
    /// Value of the shared-secret header.
    pub shared_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.is_some())
            .field("shared_secret", &self.shared_secret.is_some())
            .finish()
    }
}

impl Credentials {
    /// Collect credentials from `(name, value)` header pairs.
    ///
    /// Header names compare case-insensitively; `shared_secret_header` names
    /// the header carrying the static secret.
    pub fn from_headers<'a>(
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
        shared_secret_header: &str,
    ) -> Self {
        let mut creds = Credentials::default();
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("authorization") {
                creds.bearer = extract_bearer(value);
            } else if name.eq_ignore_ascii_case(shared_secret_header) && !value.is_empty() {
                creds.shared_secret = Some(value.to_string());
            }
        }
        creds
    }
}

/// Pull the token out of `Bearer <token>`; the scheme is case-insensitive.
pub fn extract_bearer(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A verification mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SessionToken,
    SharedSecret,
}

/// Outcome of one strategy against one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// A credential was presented and is wrong.
    Reject(&'static str),
    /// This strategy cannot judge the request (not configured, or no credential).
    NotApplicable(&'static str),
}

/// Tries each [`Strategy`] in order against the configured secrets.
#[derive(Debug, Clone)]
pub struct Authenticator {
    settings: AuthSettings,
    strategies: Vec<Strategy>,
}

impl Authenticator {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            strategies: vec![Strategy::SessionToken, Strategy::SharedSecret],
        }
    }

    /// Header name the static secret is read from.
    pub fn shared_secret_header(&self) -> &str {
        &self.settings.shared_secret_header
    }

    /// True when at least one mechanism has its server-side secret.
    pub fn is_configured(&self) -> bool {
        self.settings.session_secret.is_some() || self.settings.shared_secret.is_some()
    }

    /// Evaluate a single strategy at time `now` (unix seconds).
    pub fn evaluate(&self, strategy: Strategy, creds: &Credentials, now: i64) -> Verdict {
        match strategy {
            Strategy::SessionToken => {
                let Some(secret) = self.settings.session_secret.as_deref() else {
                    return Verdict::NotApplicable("session secret not configured");
                };
                let Some(token) = creds.bearer.as_deref() else {
                    return Verdict::NotApplicable("no bearer token");
                };
                match verify_session_token(token, secret, now) {
                    Ok(claims) => {
                        debug!(sub = %claims.sub, "session token accepted");
                        Verdict::Accept
                    }
                    Err(rejection) => Verdict::Reject(rejection.as_str()),
                }
            }
            Strategy::SharedSecret => {
                let Some(secret) = self.settings.shared_secret.as_deref() else {
                    return Verdict::NotApplicable("shared secret not configured");
                };
                let Some(presented) = creds.shared_secret.as_deref() else {
                    return Verdict::NotApplicable("no shared secret header");
                };
                if constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
                    Verdict::Accept
                } else {
                    Verdict::Reject("shared secret mismatch")
                }
            }
        }
    }

    /// Accept the request at time `now` or fail with [`PublishError::Unauthorized`].
    #[instrument(skip_all)]
    pub fn authorize_at(&self, creds: &Credentials, now: i64) -> Result<()> {
        if !self.is_configured() {
            warn!("rejecting request: neither session secret nor shared secret is configured");
            return Err(PublishError::unauthorized());
        }

        let mut reasons = Vec::with_capacity(self.strategies.len());
        for &strategy in &self.strategies {
            match self.evaluate(strategy, creds, now) {
                Verdict::Accept => {
                    debug!(?strategy, "request authorized");
                    return Ok(());
                }
                Verdict::Reject(reason) | Verdict::NotApplicable(reason) => {
                    reasons.push(reason);
                }
            }
        }

        warn!(reasons = ?reasons, "rejecting request: no credential accepted");
        Err(PublishError::unauthorized())
    }

    /// [`Authenticator::authorize_at`] using the current wall-clock time.
    pub fn authorize(&self, creds: &Credentials) -> Result<()> {
        self.authorize_at(creds, chrono::Utc::now().timestamp())
    }
}
