//! Username/password login that issues session tokens.
//!
//! Unlike request authentication, issuance reports missing server-side
//! configuration as a configuration error (500) rather than folding it into 401.

use contentpub_shared::{LoginSettings, PublishError, Result};
use tracing::{info, warn};

use crate::constant_time_eq;
use crate::token::{IssuedToken, issue_session_token};

/// Verify login credentials and mint a session token valid from `now`.
pub fn login_at(
    settings: &LoginSettings,
    username: &str,
    password: &str,
    now: i64,
) -> Result<IssuedToken> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(PublishError::bad_request(
            "Username and password are required.",
        ));
    }

    let (Some(expected_user), Some(expected_password)) =
        (settings.username.as_deref(), settings.password.as_deref())
    else {
        warn!("login attempted but no login credentials are configured");
        return Err(PublishError::configuration("Login is not configured."));
    };

    // Evaluate both comparisons so timing does not reveal which one failed.
    let user_ok = constant_time_eq(username.as_bytes(), expected_user.as_bytes());
    let password_ok = constant_time_eq(password.as_bytes(), expected_password.as_bytes());
    if !(user_ok & password_ok) {
        warn!("login rejected: invalid username or password");
        return Err(PublishError::Unauthorized {
            message: "Invalid username or password.".into(),
        });
    }

    let Some(secret) = settings.session_secret.as_deref() else {
        warn!("login succeeded but no session secret is configured");
        return Err(PublishError::configuration("Session secret not configured."));
    };

    let issued = issue_session_token(secret, username, now, settings.effective_ttl_secs());
    info!(sub = username, expires_at = issued.expires_at, "issued session token");
    Ok(issued)
}

/// [`login_at`] using the current wall-clock time.
pub fn login(settings: &LoginSettings, username: &str, password: &str) -> Result<IssuedToken> {
    login_at(settings, username, password, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::verify_session_token;

    const NOW: i64 = 1_760_000_000;

    fn settings() -> LoginSettings {
        LoginSettings {
            username: Some("editor".into()),
            password: Some("correct horse".into()),
            session_secret: Some("s3cret".into()),
            ttl_secs: 3600,
        }
    }

    #[test]
    fn valid_login_issues_verifiable_token() {
        let issued = login_at(&settings(), "  editor ", "correct horse", NOW).unwrap();
        assert_eq!(issued.expires_at, NOW + 3600);
        let claims = verify_session_token(&issued.token, "s3cret", NOW).unwrap();
        assert_eq!(claims.sub, "editor");
    }

    #[test]
    fn missing_fields_are_bad_requests() {
        let err = login_at(&settings(), "   ", "pw", NOW).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = login_at(&settings(), "editor", "", NOW).unwrap_err();
        assert_eq!(err.to_string(), "Username and password are required.");
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let err = login_at(&settings(), "editor", "wrong", NOW).unwrap_err();
        assert!(matches!(err, PublishError::Unauthorized { .. }));
        assert_eq!(err.to_string(), "Invalid username or password.");
    }

    #[test]
    fn unconfigured_login_is_configuration_error() {
        let mut s = settings();
        s.password = None;
        let err = login_at(&s, "editor", "correct horse", NOW).unwrap_err();
        assert_eq!(err.to_string(), "Login is not configured.");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn missing_session_secret_is_configuration_error() {
        let mut s = settings();
        s.session_secret = None;
        let err = login_at(&s, "editor", "correct horse", NOW).unwrap_err();
        assert!(matches!(err, PublishError::Configuration { .. }));
    }

    #[test]
    fn short_ttl_is_raised_to_minimum() {
        let mut s = settings();
        s.ttl_secs = 1;
        let issued = login_at(&s, "editor", "correct horse", NOW).unwrap();
        assert_eq!(issued.expires_at, NOW + 60);
    }
}
