//! Versioned remote file store used to commit content.
//!
//! The [`ContentStore`] trait is deliberately small: read a file with its
//! version token, and write a file on top of a known version. Everything the
//! publish flow needs (refusing to clobber, optimistic concurrency) is built
//! on those two primitives in [`ContentStore::put_file`], so any backend with
//! per-key version tokens (a Git host's blob SHA, an object store's ETag) can
//! be dropped in.
//!
//! Backends:
//! - [`GitHubStore`]: the GitHub repository contents API
//! - [`MemoryStore`]: an in-process map, for tests and dry runs

mod credential;
mod github;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use contentpub_shared::{PublishError, Result};
use tracing::debug;

pub use credential::{AwsSecretsManager, SecretSource, TokenResolver, token_from_secret_string};
pub use github::{GitHubConnector, GitHubStore};
pub use memory::{CommitRecord, MemoryStore};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A file as currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub content: Vec<u8>,
    /// Opaque token identifying this exact version; required to overwrite.
    pub version: Option<String>,
}

/// What the writer believes the current version of the target to be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Expected {
    /// No belief; only the exists/force rule applies.
    #[default]
    Unchecked,
    /// The file must not exist yet.
    Absent,
    /// The file must still be at this version.
    Version(String),
}

impl Expected {
    /// The expectation matching a prior read of the target.
    pub fn from_read(file: Option<&StoredFile>) -> Self {
        match file.and_then(|f| f.version.clone()) {
            Some(version) => Expected::Version(version),
            None if file.is_some() => Expected::Unchecked,
            None => Expected::Absent,
        }
    }
}

/// Options for [`ContentStore::put_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Allow replacing a file that already exists.
    pub force: bool,
    pub expected: Expected,
}

impl WriteOptions {
    pub fn new(force: bool) -> Self {
        Self {
            force,
            expected: Expected::Unchecked,
        }
    }

    pub fn expecting(mut self, expected: Expected) -> Self {
        self.expected = expected;
        self
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read/write access to a remote versioned file store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch `path`, or `None` if it does not exist.
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>>;

    /// Write `content` to `path` on top of `base_version`.
    ///
    /// `base_version` is `None` when creating a new file. A backend must fail
    /// rather than overwrite when `base_version` is stale.
    async fn write_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        base_version: Option<&str>,
    ) -> Result<()>;

    /// Safe write: always reads `path` first to discover its version.
    ///
    /// - exists and `force` is false → [`PublishError::Conflict`]
    /// - `expected` disagrees with what is stored → [`PublishError::Conflict`]
    /// - otherwise writes, carrying the discovered version token
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        opts: &WriteOptions,
    ) -> Result<()> {
        let current = self.get_file(path).await?;
        check_preconditions(path, current.as_ref(), opts)?;

        let base_version = current.as_ref().and_then(|f| f.version.as_deref());
        debug!(path, exists = current.is_some(), force = opts.force, "writing file");
        self.write_file(path, content, message, base_version).await
    }
}

/// Produces a store client bound to a freshly resolved write credential.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ContentStore>>;
}

fn check_preconditions(
    path: &str,
    current: Option<&StoredFile>,
    opts: &WriteOptions,
) -> Result<()> {
    if current.is_some() && !opts.force {
        return Err(PublishError::conflict(format!(
            "{path} already exists. Enable overwrite to replace it."
        )));
    }

    let current_version = current.and_then(|f| f.version.as_deref());
    let stale = match &opts.expected {
        Expected::Unchecked => false,
        Expected::Absent => current.is_some(),
        Expected::Version(v) => current_version != Some(v.as_str()),
    };
    if stale {
        return Err(PublishError::conflict(format!(
            "{path} was changed by another writer; retry the request"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(version: &str) -> StoredFile {
        StoredFile {
            path: "news/a.json".into(),
            content: b"{}".to_vec(),
            version: Some(version.into()),
        }
    }

    #[test]
    fn existing_file_needs_force() {
        let err = check_preconditions("news/a.json", Some(&stored("v1")), &WriteOptions::new(false))
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(err.to_string().contains("already exists"));
        let forced = WriteOptions::new(true);
        assert!(check_preconditions("news/a.json", Some(&stored("v1")), &forced).is_ok());
    }

    #[test]
    fn missing_file_is_written_unconditionally() {
        assert!(check_preconditions("news/a.json", None, &WriteOptions::new(false)).is_ok());
    }

    #[test]
    fn stale_version_expectation_conflicts() {
        let opts = WriteOptions::new(true).expecting(Expected::Version("v1".into()));
        assert!(check_preconditions("index.json", Some(&stored("v1")), &opts).is_ok());
        assert!(check_preconditions("index.json", Some(&stored("v2")), &opts).is_err());
        assert!(check_preconditions("index.json", None, &opts).is_err());
    }

    #[test]
    fn expected_absent_conflicts_when_file_appeared() {
        let opts = WriteOptions::new(true).expecting(Expected::Absent);
        assert!(check_preconditions("index.json", None, &opts).is_ok());
        assert!(check_preconditions("index.json", Some(&stored("v1")), &opts).is_err());
    }

    #[test]
    fn expectation_from_read() {
        assert_eq!(Expected::from_read(None), Expected::Absent);
        assert_eq!(
            Expected::from_read(Some(&stored("abc"))),
            Expected::Version("abc".into())
        );
    }
}
