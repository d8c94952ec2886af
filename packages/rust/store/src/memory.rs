//! In-process store with the same version-token discipline as a remote one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use contentpub_shared::{PublishError, Result};

use crate::{ContentStore, StoreConnector, StoredFile};

/// A commit accepted by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    commits: Vec<CommitRecord>,
    failing_paths: Vec<String>,
}

/// Map-backed [`ContentStore`]. Versions are the SHA-256 of the content.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without recording a commit.
    pub async fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .await
            .files
            .insert(path.to_string(), content.into());
    }

    /// Current content of `path`.
    pub async fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.files.get(path).cloned()
    }

    /// Paths currently stored, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.inner.lock().await.files.keys().cloned().collect()
    }

    /// Every accepted write, in order.
    pub async fn commits(&self) -> Vec<CommitRecord> {
        self.inner.lock().await.commits.clone()
    }

    /// Make subsequent writes to `path` fail as an upstream outage.
    pub async fn fail_writes_to(&self, path: &str) {
        self.inner.lock().await.failing_paths.push(path.to_string());
    }
}

fn version_of(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>> {
        let inner = self.inner.lock().await;
        Ok(inner.files.get(path).map(|content| StoredFile {
            path: path.to_string(),
            content: content.clone(),
            version: Some(version_of(content)),
        }))
    }

    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        base_version: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.failing_paths.iter().any(|p| p == path) {
            return Err(PublishError::upstream(
                Some(503),
                format!("Failed to write {path}: store unavailable"),
            ));
        }

        let current = inner.files.get(path).map(|c| version_of(c));
        if current.as_deref() != base_version {
            return Err(PublishError::conflict(format!(
                "{path} was changed by another writer"
            )));
        }

        inner.files.insert(path.to_string(), content.to_vec());
        inner.commits.push(CommitRecord {
            path: path.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self) -> Result<Arc<dyn ContentStore>> {
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expected, WriteOptions};

    #[tokio::test]
    async fn write_then_read_back() {
        let store = MemoryStore::new();
        store
            .put_file("a.json", b"{}\n", "add a", &WriteOptions::new(false))
            .await
            .unwrap();

        let file = store.get_file("a.json").await.unwrap().unwrap();
        assert_eq!(file.content, b"{}\n");
        assert_eq!(file.version, Some(version_of(b"{}\n")));
        assert_eq!(
            store.commits().await,
            vec![CommitRecord {
                path: "a.json".into(),
                message: "add a".into()
            }]
        );
    }

    #[tokio::test]
    async fn stale_base_version_is_rejected() {
        let store = MemoryStore::new();
        store.insert("a.json", "v1").await;

        let err = store
            .write_file("a.json", b"v2", "msg", Some("not-the-sha"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Conflict { .. }));

        let err = store.write_file("a.json", b"v2", "msg", None).await.unwrap_err();
        assert!(matches!(err, PublishError::Conflict { .. }));
        assert_eq!(store.file("a.json").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn concurrent_change_after_read_is_detected() {
        let store = MemoryStore::new();
        store.insert("index.json", "first").await;

        let read = store.get_file("index.json").await.unwrap();
        store.insert("index.json", "someone else").await;

        let opts = WriteOptions::new(true).expecting(Expected::from_read(read.as_ref()));
        let err = store
            .put_file("index.json", b"mine", "msg", &opts)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(store.file("index.json").await.unwrap(), b"someone else");
    }

    #[tokio::test]
    async fn failing_path_reports_upstream_error() {
        let store = MemoryStore::new();
        store.fail_writes_to("x.json").await;
        let err = store
            .put_file("x.json", b"{}", "msg", &WriteOptions::new(false))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert!(store.commits().await.is_empty());
    }
}
