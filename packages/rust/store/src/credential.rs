//! Write-credential resolution for the content store.
//!
//! The token is resolved on every publish: either read directly from the
//! environment at startup, or fetched by name from a secret manager at call
//! time so rotations take effect without a restart.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use contentpub_shared::{GitHubSettings, PublishError, Result};

/// A named-secret lookup service.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// The secret's string value, or `None` if it has no string payload.
    async fn secret_string(&self, name: &str) -> Result<Option<String>>;
}

/// AWS Secrets Manager, configured from the standard AWS environment.
pub struct AwsSecretsManager {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManager {
    /// Load region and credentials from the environment/instance profile.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_secretsmanager::Client::new(&config),
        }
    }
}

#[async_trait]
impl SecretSource for AwsSecretsManager {
    async fn secret_string(&self, name: &str) -> Result<Option<String>> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                PublishError::configuration(format!(
                    "failed to read secret '{name}': {}",
                    aws_sdk_secretsmanager::error::DisplayErrorContext(&e)
                ))
            })?;
        Ok(output.secret_string().map(str::to_string))
    }
}

/// Extract a token from a secret's string payload.
///
/// JSON objects yield their `token` or `access_token` field (falling back to
/// `fallback`); anything else is taken as the raw token.
pub fn token_from_secret_string(secret: &str, fallback: Option<&str>) -> Option<String> {
    match serde_json::from_str::<Value>(secret) {
        Ok(Value::Object(map)) => ["token", "access_token"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|t| !t.is_empty())
            .or(fallback)
            .map(str::to_string),
        _ => {
            let raw = secret.trim();
            if raw.is_empty() {
                fallback.map(str::to_string)
            } else {
                Some(raw.to_string())
            }
        }
    }
}

/// Produces the store write token on demand.
#[derive(Clone, Default)]
pub struct TokenResolver {
    direct: Option<String>,
    secret_name: Option<String>,
    source: Option<Arc<dyn SecretSource>>,
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field("direct", &self.direct.as_ref().map(|_| "<set>"))
            .field("secret_name", &self.secret_name)
            .field("source", &self.source.is_some())
            .finish()
    }
}

impl TokenResolver {
    /// Resolve only from a directly configured token.
    pub fn direct(token: Option<String>) -> Self {
        Self {
            direct: token,
            ..Default::default()
        }
    }

    /// Prefer the named secret from `source`, falling back to `direct`.
    pub fn with_secret(
        direct: Option<String>,
        secret_name: impl Into<String>,
        source: Arc<dyn SecretSource>,
    ) -> Self {
        Self {
            direct,
            secret_name: Some(secret_name.into()),
            source: Some(source),
        }
    }

    /// Build from settings; AWS is only contacted when a secret name is configured.
    pub async fn from_settings(settings: &GitHubSettings) -> Self {
        match &settings.token_secret_name {
            Some(name) => {
                let source: Arc<dyn SecretSource> = Arc::new(AwsSecretsManager::from_env().await);
                Self::with_secret(settings.token.clone(), name.clone(), source)
            }
            None => Self::direct(settings.token.clone()),
        }
    }

    /// Current token, or [`PublishError::Configuration`] if none is usable.
    #[instrument(skip(self), fields(secret_name = ?self.secret_name))]
    pub async fn resolve(&self) -> Result<String> {
        let mut token = self.direct.clone();

        if let Some(name) = &self.secret_name {
            let source = self.source.as_ref().ok_or_else(|| {
                PublishError::configuration("no secret source available for GitHub token")
            })?;
            let secret = source.secret_string(name).await?.unwrap_or_default();
            if secret.is_empty() {
                warn!("GitHub token secret is empty");
                return Err(PublishError::configuration("GitHub token secret is empty"));
            }
            token = token_from_secret_string(&secret, token.as_deref());
            debug!("resolved GitHub token from secret manager");
        }

        token.filter(|t| !t.is_empty()).ok_or_else(|| {
            warn!("no GitHub token configured");
            PublishError::configuration("GitHub token not configured")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSecret(Option<&'static str>);

    #[async_trait]
    impl SecretSource for FixedSecret {
        async fn secret_string(&self, _name: &str) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    fn resolver(secret: Option<&'static str>, direct: Option<&str>) -> TokenResolver {
        TokenResolver::with_secret(
            direct.map(String::from),
            "github/publish-token",
            Arc::new(FixedSecret(secret)),
        )
    }

    #[test]
    fn secret_string_shapes() {
        assert_eq!(
            token_from_secret_string(r#"{"token":"ghp_1"}"#, None),
            Some("ghp_1".into())
        );
        assert_eq!(
            token_from_secret_string(r#"{"access_token":"ghp_2"}"#, None),
            Some("ghp_2".into())
        );
        assert_eq!(
            token_from_secret_string(r#"{"other":"x"}"#, Some("direct")),
            Some("direct".into())
        );
        assert_eq!(token_from_secret_string("ghp_raw\n", None), Some("ghp_raw".into()));
    }

    #[tokio::test]
    async fn direct_token_resolves() {
        let token = TokenResolver::direct(Some("ghp_direct".into()))
            .resolve()
            .await
            .unwrap();
        assert_eq!(token, "ghp_direct");
    }

    #[tokio::test]
    async fn secret_takes_precedence_over_direct() {
        let token = resolver(Some(r#"{"token":"ghp_secret"}"#), Some("ghp_direct"))
            .resolve()
            .await
            .unwrap();
        assert_eq!(token, "ghp_secret");
    }

    #[tokio::test]
    async fn empty_secret_is_configuration_error() {
        let err = resolver(None, Some("ghp_direct")).resolve().await.unwrap_err();
        assert_eq!(err.to_string(), "GitHub token secret is empty");
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn missing_token_is_configuration_error() {
        let err = TokenResolver::direct(None).resolve().await.unwrap_err();
        assert!(matches!(err, PublishError::Configuration { .. }));
        assert_eq!(err.to_string(), "GitHub token not configured");
    }
}
