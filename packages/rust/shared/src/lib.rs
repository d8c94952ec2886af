//! Shared types, error model, and configuration for contentpub.
//!
//! This crate is the foundation depended on by all other contentpub crates.
//! It provides:
//! - [`PublishError`]: the unified error type and its HTTP status mapping
//! - Domain types ([`Section`], [`SectionConfig`], [`PublishRequest`], [`ImageUpload`])
//! - Configuration ([`AppConfig`], runtime settings, config loading)
//! - Deterministic JSON rendering ([`render_json`])

pub mod config;
pub mod error;
pub mod json;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuthConfig, AuthSettings, ContentConfig, GitHubConfig, GitHubSettings,
    LoginSettings, MIN_SESSION_TTL_SECS, ServerConfig, config_dir, config_file_path, env_secret,
    init_config, init_config_at, load_config, load_config_from,
};
pub use error::{PublishError, Result};
pub use json::render_json;
pub use types::{
    Draft, EntryFamily, ImageUpload, PublishOutcome, PublishRequest, Section, SectionConfig,
};
