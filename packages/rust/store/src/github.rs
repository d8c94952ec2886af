//! GitHub repository contents API backend.
//!
//! `GET  /repos/{owner}/{repo}/contents/{path}?ref={branch}` → `{content, sha}` or 404
//! `PUT  /repos/{owner}/{repo}/contents/{path}` with `{message, content, branch, sha?}`
//!
//! Payloads travel base64-encoded; every call is bounded by the configured
//! timeout and never retried here.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use contentpub_shared::{GitHubSettings, PublishError, Result};

use crate::credential::TokenResolver;
use crate::{ContentStore, StoreConnector, StoredFile};

/// User-Agent string for store requests.
const USER_AGENT: &str = concat!("contentpub/", env!("CARGO_PKG_VERSION"));

/// REST API version pinned in every request.
const API_VERSION: &str = "2022-11-28";

/// Body of a successful contents GET.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

/// Body of a contents PUT.
#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// GitHubStore
// ---------------------------------------------------------------------------

/// Content store backed by one branch of one GitHub repository.
pub struct GitHubStore {
    client: Client,
    contents_base: Url,
    branch: String,
    token: String,
}

impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("contents_base", &self.contents_base.as_str())
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GitHubStore {
    /// Create a store client authenticating with `token`.
    pub fn new(settings: &GitHubSettings, token: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PublishError::internal(format!("failed to build HTTP client: {e}")))?;

        let mut contents_base = settings.api_base.clone();
        contents_base
            .path_segments_mut()
            .map_err(|_| {
                PublishError::configuration(format!(
                    "github.api_base cannot carry a path: {}",
                    settings.api_base
                ))
            })?
            .pop_if_empty()
            .extend(["repos", settings.owner.as_str(), settings.repo.as_str(), "contents"]);

        Ok(Self {
            client,
            contents_base,
            branch: settings.branch.clone(),
            token,
        })
    }

    /// Contents URL for `path`, each segment percent-encoded so that `%`, `?`
    /// and `#` in a filename stay part of the file name.
    fn file_url(&self, path: &str) -> Url {
        let mut url = self.contents_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.file_url(path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl ContentStore for GitHubStore {
    #[instrument(skip(self), fields(branch = %self.branch))]
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>> {
        let response = self
            .request(reqwest::Method::GET, path)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("file not found");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(path, e))?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "unexpected status reading file");
            return Err(PublishError::upstream(
                Some(status.as_u16()),
                format!("Failed to load {path}: HTTP {status}: {body}"),
            ));
        }

        let parsed: ContentsResponse = serde_json::from_str(&body).map_err(|e| {
            PublishError::upstream(
                Some(status.as_u16()),
                format!("Unexpected contents response for {path}: {e}"),
            )
        })?;

        let encoded = parsed.content.ok_or_else(|| {
            PublishError::upstream(
                Some(status.as_u16()),
                format!("{path} has no inline content (directory or oversized file)"),
            )
        })?;

        // The API wraps base64 content at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let content = STANDARD.decode(compact).map_err(|e| {
            PublishError::upstream(
                Some(status.as_u16()),
                format!("{path} content is not valid base64: {e}"),
            )
        })?;

        debug!(bytes = content.len(), sha = ?parsed.sha, "file loaded");
        Ok(Some(StoredFile {
            path: path.to_string(),
            content,
            version: parsed.sha,
        }))
    }

    #[instrument(
        skip(self, content, message),
        fields(branch = %self.branch, bytes = content.len())
    )]
    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        base_version: Option<&str>,
    ) -> Result<()> {
        let body = PutContentsBody {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha: base_version,
        };

        let response = self
            .request(reqwest::Method::PUT, path)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "file committed");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            warn!("write rejected: version token is stale");
            return Err(PublishError::conflict(format!(
                "{path} was changed by another writer: {body}"
            )));
        }

        warn!(status = status.as_u16(), "write failed");
        Err(PublishError::upstream(
            Some(status.as_u16()),
            format!("Failed to write {path}: HTTP {status}: {body}"),
        ))
    }
}

fn transport_error(path: &str, err: reqwest::Error) -> PublishError {
    let kind = if err.is_timeout() { "timed out" } else { "failed" };
    PublishError::upstream(None, format!("GitHub API request for {path} {kind}: {err}"))
}

// ---------------------------------------------------------------------------
// GitHubConnector
// ---------------------------------------------------------------------------

/// Resolves the write token at call time and binds a [`GitHubStore`] to it.
pub struct GitHubConnector {
    settings: GitHubSettings,
    resolver: TokenResolver,
}

impl GitHubConnector {
    pub fn new(settings: GitHubSettings, resolver: TokenResolver) -> Self {
        Self { settings, resolver }
    }
}

#[async_trait]
impl StoreConnector for GitHubConnector {
    async fn connect(&self) -> Result<Arc<dyn ContentStore>> {
        let token = self.resolver.resolve().await?;
        Ok(Arc::new(GitHubStore::new(&self.settings, token)?))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::WriteOptions;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FILE_PATH: &str = "/repos/acme/site/contents/public/content/news/a.json";

    fn settings(server: &MockServer) -> GitHubSettings {
        GitHubSettings {
            api_base: url::Url::parse(&server.uri()).unwrap(),
            owner: "acme".into(),
            repo: "site".into(),
            branch: "main".into(),
            timeout: Duration::from_secs(5),
            token: None,
            token_secret_name: None,
        }
    }

    fn store(server: &MockServer) -> GitHubStore {
        GitHubStore::new(&settings(server), "gh-token".into()).unwrap()
    }

    async fn mount_existing(server: &MockServer, content: &str, sha: &str) {
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": STANDARD.encode(content),
                "sha": sha,
            })))
            .mount(server)
            .await;
    }

    async fn mount_missing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    async fn put_bodies(server: &MockServer) -> Vec<serde_json::Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn get_file_decodes_wrapped_content() {
        let server = MockServer::start().await;
        let wrapped = {
            let encoded = STANDARD.encode(r#"{"items":[]}"#);
            let (head, tail) = encoded.split_at(8);
            format!("{head}\n{tail}\n")
        };
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .and(query_param("ref", "main"))
            .and(header("authorization", "Bearer gh-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": wrapped, "sha": "abc123"})),
            )
            .mount(&server)
            .await;

        let file = store(&server)
            .get_file("public/content/news/a.json")
            .await
            .unwrap()
            .expect("file exists");
        assert_eq!(file.content, br#"{"items":[]}"#);
        assert_eq!(file.version.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn get_file_not_found_is_none() {
        let server = MockServer::start().await;
        mount_missing(&server).await;
        let file = store(&server).get_file("public/content/news/a.json").await.unwrap();
        assert!(file.is_none());
    }

    #[tokio::test]
    async fn get_file_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = store(&server)
            .get_file("public/content/news/a.json")
            .await
            .unwrap_err();
        match err {
            PublishError::Upstream { status, message } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("boom"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_new_file_omits_sha() {
        let server = MockServer::start().await;
        mount_missing(&server).await;
        Mock::given(method("PUT"))
            .and(path(FILE_PATH))
            .and(body_partial_json(serde_json::json!({
                "message": "Add News entry a",
                "branch": "main",
                "content": STANDARD.encode("{}\n"),
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .put_file(
                "public/content/news/a.json",
                b"{}\n",
                "Add News entry a",
                &WriteOptions::new(false),
            )
            .await
            .unwrap();

        let bodies = put_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].get("sha").is_none());
    }

    #[tokio::test]
    async fn put_existing_without_force_conflicts_before_writing() {
        let server = MockServer::start().await;
        mount_existing(&server, "{}", "old-sha").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = store(&server)
            .put_file(
                "public/content/news/a.json",
                b"{}",
                "msg",
                &WriteOptions::new(false),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Conflict { .. }));
    }

    #[tokio::test]
    async fn forced_put_carries_discovered_sha() {
        let server = MockServer::start().await;
        mount_existing(&server, "{}", "old-sha").await;
        Mock::given(method("PUT"))
            .and(path(FILE_PATH))
            .and(body_partial_json(serde_json::json!({"sha": "old-sha"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .put_file(
                "public/content/news/a.json",
                b"{\"title\":\"new\"}",
                "msg",
                &WriteOptions::new(true),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_sha_rejection_maps_to_conflict() {
        let server = MockServer::start().await;
        mount_existing(&server, "{}", "old-sha").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("sha does not match"))
            .mount(&server)
            .await;

        let err = store(&server)
            .put_file("public/content/news/a.json", b"{}", "msg", &WriteOptions::new(true))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn failed_write_is_upstream_with_status_and_body() {
        let server = MockServer::start().await;
        mount_missing(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(422).set_body_string("Invalid request"))
            .mount(&server)
            .await;

        let err = store(&server)
            .put_file("public/content/news/a.json", b"{}", "msg", &WriteOptions::new(false))
            .await
            .unwrap_err();
        match err {
            PublishError::Upstream { status, message } => {
                assert_eq!(status, Some(422));
                assert!(message.contains("Invalid request"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out_as_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut settings = settings(&server);
        settings.timeout = Duration::from_millis(200);
        let store = GitHubStore::new(&settings, "gh-token".into()).unwrap();

        let err = store.get_file("public/content/news/a.json").await.unwrap_err();
        match err {
            PublishError::Upstream { status, message } => {
                assert_eq!(status, None);
                assert!(message.contains("timed out"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn encoded_dot_segments_stay_inside_contents_path() {
        let server = MockServer::start().await;
        let store = store(&server);

        let url = store.file_url("public/content/news/%2e%2e/%2e%2e/%2e%2e/.github/x.json");
        assert_eq!(
            url.path(),
            "/repos/acme/site/contents/public/content/news/%252e%252e/%252e%252e/%252e%252e/.github/x.json"
        );

        let url = store.file_url("public/content/news/a?b#c.jpg");
        assert_eq!(url.path(), "/repos/acme/site/contents/public/content/news/a%3Fb%23c.jpg");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[tokio::test]
    async fn requests_for_odd_filenames_hit_the_encoded_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/site/contents/public/content/news/%252e%252e/x.json"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let found = store(&server)
            .get_file("public/content/news/%2e%2e/x.json")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
