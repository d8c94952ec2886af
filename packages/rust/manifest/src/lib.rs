//! Per-section manifest (`index.json`) maintenance.
//!
//! A manifest is `{"items": [...]}` holding exactly one entry per slug. The
//! engine computes the entry a publish implies and folds it in:
//! - slug absent → append, `changed = true`
//! - slug present, not forced → leave untouched, `changed = false`
//! - slug present, forced → shallow merge, candidate fields win, other
//!   existing fields (ordering hints, captions, ...) survive
//!
//! Merging is per-slug and order-independent, so re-running a publish is safe.

mod entry;

use serde_json::{Map, Value};
use tracing::debug;

use contentpub_shared::{Draft, PublishError, Result, Section, render_json};

pub use entry::{EventEntry, ListEntry, ManifestEntry, entry_key, resolve_image_ref};

/// Manifest file name inside each section directory.
pub const MANIFEST_FILE_NAME: &str = "index.json";

const ITEMS_KEY: &str = "items";

/// What [`Manifest::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// No entry for the slug existed; the candidate was appended.
    Appended,
    /// An existing entry was merged with the candidate.
    Replaced,
    /// An entry existed and the publish was not forced.
    Unchanged,
}

impl MergeAction {
    pub fn changed(self) -> bool {
        !matches!(self, MergeAction::Unchanged)
    }
}

/// A parsed section manifest. Top-level keys other than `items` are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// The full document; its `items` slot is refreshed from `items` on render.
    doc: Map<String, Value>,
    items: Vec<Value>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::empty()
    }
}

impl Manifest {
    /// `{"items": []}`, the stand-in for a manifest that does not exist yet.
    pub fn empty() -> Self {
        let mut doc = Map::new();
        doc.insert(ITEMS_KEY.into(), Value::Null);
        Self {
            doc,
            items: Vec::new(),
        }
    }

    /// Parse stored manifest bytes.
    ///
    /// Anything other than an object with an `items` array is an internal
    /// error: the manifest is ours, so a bad one is not the caller's fault.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| PublishError::internal(format!("Manifest is not valid JSON: {e}")))?;
        let Value::Object(mut doc) = value else {
            return Err(PublishError::internal("Manifest must be a JSON object"));
        };
        let items = match doc.get_mut(ITEMS_KEY).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(PublishError::internal(
                    "Manifest must contain an array under 'items'",
                ));
            }
        };
        Ok(Self { doc, items })
    }

    /// Render with the same deterministic layout as content files.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = self.doc.clone();
        doc.insert(ITEMS_KEY.into(), Value::Array(self.items.clone()));
        render_json(&doc)
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Index of the entry keyed by `slug`.
    pub fn position(&self, slug: &str) -> Option<usize> {
        self.items()
            .iter()
            .position(|item| entry_key(item) == Some(slug))
    }

    /// Fold `candidate` into the manifest.
    pub fn apply(&mut self, candidate: &ManifestEntry, force: bool) -> MergeAction {
        let slug = candidate.slug().to_string();
        match self.position(&slug) {
            None => {
                self.items.push(Value::Object(candidate.to_object()));
                debug!(slug, "manifest entry appended");
                MergeAction::Appended
            }
            Some(_) if !force => {
                debug!(slug, "manifest already lists slug, leaving it untouched");
                MergeAction::Unchanged
            }
            Some(index) => {
                let merged = merge_entry(&self.items[index], candidate.to_object());
                self.items[index] = Value::Object(merged);
                debug!(slug, index, "manifest entry merged");
                MergeAction::Replaced
            }
        }
    }
}

/// Shallow merge: existing fields first, candidate fields overwrite in place.
fn merge_entry(existing: &Value, candidate: Map<String, Value>) -> Map<String, Value> {
    match existing {
        Value::Object(prior) => {
            let mut merged = prior.clone();
            for (key, value) in candidate {
                merged.insert(key, value);
            }
            merged
        }
        // Legacy bare-string entries are replaced outright.
        _ => candidate,
    }
}

/// Compute the manifest after publishing `slug`, and whether it changed.
pub fn merge(
    existing: Manifest,
    section: Section,
    slug: &str,
    draft: &Draft,
    image: Option<&str>,
    force: bool,
) -> (Manifest, bool) {
    let mut manifest = existing;
    let candidate = ManifestEntry::candidate(section, slug, draft, image);
    let action = manifest.apply(&candidate, force);
    (manifest, action.changed())
}
