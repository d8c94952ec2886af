//! HTTP surface for contentpub.
//!
//! Routes:
//! - `POST /publish` (also `POST /`): authorize and run a publish request
//! - `POST /login`: exchange username/password for a session token
//! - `OPTIONS` on each of the above: CORS preflight
//!
//! Every response, errors included, is JSON and carries the CORS headers.

mod error;

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use contentpub_auth::{Credentials, login};
use contentpub_core::Publisher;
use contentpub_shared::{LoginSettings, PublishError, Result};

pub use error::ApiError;

/// Shared state behind every handler.
pub struct ApiState {
    pub publisher: Publisher,
    pub login: LoginSettings,
}

/// Successful publish response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub ok: bool,
    pub manifest_updated: bool,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
}

/// Build the HTTP router.
///
/// `allowed_origin` is echoed verbatim in `Access-Control-Allow-Origin`; a
/// value that is not a valid header is a configuration error.
pub fn build_router(state: Arc<ApiState>, allowed_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin).map_err(|_| {
        PublishError::configuration(format!("Invalid allowed origin: {allowed_origin:?}"))
    })?;
    let secret_header = state.publisher.authenticator().shared_secret_header();
    let allow_headers = HeaderValue::from_str(&format!(
        "authorization, content-type, {secret_header}"
    ))
    .map_err(|_| {
        PublishError::configuration(format!("Invalid shared secret header: {secret_header:?}"))
    })?;

    let router = Router::new()
        .route("/", post(publish_handler).options(preflight))
        .route("/publish", post(publish_handler).options(preflight))
        .route("/login", post(login_handler).options(preflight))
        .fallback(not_found)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(ACCESS_CONTROL_ALLOW_ORIGIN, origin))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            allow_headers,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(TraceLayer::new_for_http());
    Ok(router)
}

#[instrument(skip_all)]
async fn publish_handler(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<PublishResponse>, ApiError> {
    let creds = credentials(&headers, state.publisher.authenticator().shared_secret_header());
    let outcome = state.publisher.handle(&creds, &body).await?;
    Ok(Json(PublishResponse {
        ok: true,
        manifest_updated: outcome.manifest_updated,
    }))
}

#[instrument(skip_all)]
async fn login_handler(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> std::result::Result<Json<LoginResponse>, ApiError> {
    let payload: Value = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| PublishError::bad_request(format!("Body must be valid JSON: {e}")))?
    };
    let field = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or_default();

    let issued = login(&state.login, field("username"), field("password"))?;
    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found"})),
    )
}

/// Header values that are not visible ASCII are ignored.
fn credentials(headers: &HeaderMap, shared_secret_header: &str) -> Credentials {
    Credentials::from_headers(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        shared_secret_header,
    )
}
