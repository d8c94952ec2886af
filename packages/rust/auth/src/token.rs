//! Signed session tokens: `<payload_segment>.<signature>`.
//!
//! The payload segment is URL-safe, unpadded base64 of compact JSON
//! `{"sub","iat","exp"}`. The signature is the lowercase hex HMAC-SHA256 of
//! the payload segment string, keyed by the session secret.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// URL-safe alphabet; emits no padding, accepts either form on decode.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    /// Expiry as unix seconds. A missing value reads as 0, i.e. expired.
    #[serde(default)]
    pub exp: i64,
}

/// A freshly minted token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Why a session token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not of the form `<payload>.<signature>`.
    Malformed,
    /// Signature does not match the payload under the configured secret.
    BadSignature,
    /// Payload is not base64 JSON claims.
    BadPayload,
    /// `exp` is at or before the current time.
    Expired,
}

impl TokenRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed token",
            TokenRejection::BadSignature => "signature mismatch",
            TokenRejection::BadPayload => "unreadable payload",
            TokenRejection::Expired => "token expired",
        }
    }
}

/// Mint a token for `sub`, valid for `ttl_secs` from `now`.
pub fn issue_session_token(secret: &str, sub: &str, now: i64, ttl_secs: u64) -> IssuedToken {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    let expires_at = now.saturating_add(ttl);
    let claims = SessionClaims {
        sub: sub.to_string(),
        iat: now,
        exp: expires_at,
    };
    // Serializing three plain fields cannot fail.
    let payload = serde_json::to_vec(&claims).unwrap_or_default();
    let segment = SEGMENT_ENGINE.encode(payload);
    let signature = sign(secret, &segment);

    IssuedToken {
        token: format!("{segment}.{signature}"),
        expires_at,
    }
}

/// Check signature and expiry of `token` at time `now`.
///
/// No replay tracking: a token is good for any number of uses until it expires.
pub fn verify_session_token(
    token: &str,
    secret: &str,
    now: i64,
) -> Result<SessionClaims, TokenRejection> {
    let (segment, signature) = token.split_once('.').ok_or(TokenRejection::Malformed)?;

    let expected = sign(secret, segment);
    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        return Err(TokenRejection::BadSignature);
    }

    let payload = SEGMENT_ENGINE
        .decode(segment)
        .map_err(|_| TokenRejection::BadPayload)?;
    let claims: SessionClaims =
        serde_json::from_slice(&payload).map_err(|_| TokenRejection::BadPayload)?;

    if claims.exp <= now {
        return Err(TokenRejection::Expired);
    }
    Ok(claims)
}

/// Lowercase hex HMAC-SHA256 of `message`.
fn sign(secret: &str, message: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
