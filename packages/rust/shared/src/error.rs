//! Error types for contentpub.
//!
//! Library crates use [`PublishError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics, and the HTTP
//! layer maps each variant onto a status code with [`PublishError::status_code`].

use std::path::PathBuf;

/// Top-level error type for every publish operation.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Malformed or invalid input, including path traversal attempts.
    #[error("{message}")]
    BadRequest { message: String },

    /// Missing, invalid, or expired caller credential.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Target already exists (not forced) or its version moved underneath us.
    #[error("{message}")]
    Conflict { message: String },

    /// A required server-side secret or setting is missing.
    #[error("{message}")]
    Configuration { message: String },

    /// The remote content store was unreachable or answered unexpectedly.
    #[error("{message}")]
    Upstream {
        /// HTTP status returned by the store, if a response was received.
        status: Option<u16>,
        message: String,
    },

    /// Anything else (corrupt manifest, serialization failure, ...).
    #[error("{message}")]
    Internal { message: String },

    /// Filesystem I/O error (config file, local draft files).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
        }
    }

    /// The generic 401 shown to callers of protected endpoints.
    pub fn unauthorized() -> Self {
        Self::Unauthorized {
            message: "Unauthorized".into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict {
            message: msg.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Upstream failure carrying the store's status and body for diagnostics.
    pub fn upstream(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Conflict { .. } => 409,
            Self::Configuration { .. } => 500,
            Self::Upstream { .. } => 502,
            Self::Internal { .. } | Self::Io { .. } => 500,
        }
    }

    /// True for failures the caller did not cause and cannot fix by changing the request.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Internal { .. } | Self::Io { .. })
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON serialization failed: {err}"))
    }
}
