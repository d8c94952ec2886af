//! Core domain types for contentpub.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PublishError;

/// A JSON object as supplied by the caller, key order preserved.
pub type Draft = Map<String, Value>;

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One of the fixed site sections content can be published into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    News,
    Events,
    Projects,
}

/// Shape of the manifest entries a section keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFamily {
    /// `{base, image?}` entries (news, projects).
    List,
    /// `{id, title, date?, ...}` entries (events).
    Event,
}

impl Section {
    /// Every supported section.
    pub const ALL: [Section; 3] = [Section::News, Section::Events, Section::Projects];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::News => "news",
            Section::Events => "events",
            Section::Projects => "projects",
        }
    }

    /// Static configuration for this section.
    pub fn config(self) -> SectionConfig {
        match self {
            Section::News => SectionConfig {
                section: self,
                content_dir: "news",
                manifest_label: "News",
            },
            Section::Events => SectionConfig {
                section: self,
                content_dir: "events",
                manifest_label: "Events",
            },
            Section::Projects => SectionConfig {
                section: self,
                content_dir: "projects",
                manifest_label: "Projects",
            },
        }
    }

    pub fn family(self) -> EntryFamily {
        match self {
            Section::News | Section::Projects => EntryFamily::List,
            Section::Events => EntryFamily::Event,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| PublishError::bad_request("Invalid 'section' field"))
    }
}

// ---------------------------------------------------------------------------
// SectionConfig
// ---------------------------------------------------------------------------

/// Where a section lives in the repository and how commits describe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionConfig {
    pub section: Section,
    /// Directory under the content root holding this section's files.
    pub content_dir: &'static str,
    /// Human label used in default commit messages.
    pub manifest_label: &'static str,
}

impl SectionConfig {
    /// `Add <label> entry <slug>`.
    pub fn default_commit_message(&self, slug: &str) -> String {
        format!("Add {} entry {slug}", self.manifest_label)
    }
}

// ---------------------------------------------------------------------------
// PublishRequest
// ---------------------------------------------------------------------------

/// A decoded image attached to a publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Target filename relative to the section directory.
    pub filename: String,
    /// Declared MIME type. Informational only; bytes are stored as-is.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A validated request to publish one content item.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub section: Section,
    /// Caller-chosen identifier, used verbatim as the filename stem.
    pub slug: String,
    /// The content document to commit.
    pub draft: Draft,
    pub image: Option<ImageUpload>,
    /// Permit overwriting existing content and replacing the manifest entry.
    pub force: bool,
    pub commit_message: Option<String>,
}

impl PublishRequest {
    /// The caller's commit message, or the section's default one.
    pub fn commit_message(&self) -> String {
        self.commit_message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.section.config().default_commit_message(&self.slug))
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    /// Whether the section manifest was rewritten.
    pub manifest_updated: bool,
}
