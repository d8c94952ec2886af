//! The publish pipeline: authorize → validate → commit content → commit
//! image → fold into the section manifest.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use contentpub_auth::{Authenticator, Credentials};
use contentpub_manifest::{Manifest, ManifestEntry, resolve_image_ref};
use contentpub_shared::{PublishOutcome, PublishRequest, Result, render_json};
use contentpub_store::{ContentStore, Expected, StoreConnector, WriteOptions};

use crate::paths::ContentLayout;
use crate::request::parse_publish_request;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each file is committed.
    fn file_committed(&self, path: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PublishOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_committed(&self, _path: &str) {}
    fn done(&self, _outcome: &PublishOutcome) {}
}

/// Runs publish requests against a content store.
///
/// Not transactional: a failure after the content file is committed leaves it
/// in place without a manifest entry. Re-running with `force` repairs that.
pub struct Publisher {
    connector: Arc<dyn StoreConnector>,
    authenticator: Authenticator,
    layout: ContentLayout,
}

impl Publisher {
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        authenticator: Authenticator,
        layout: ContentLayout,
    ) -> Self {
        Self {
            connector,
            authenticator,
            layout,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    /// Authorize the caller, decode `body`, and publish it.
    ///
    /// Nothing is read from or written to the store unless both succeed.
    pub async fn handle(&self, creds: &Credentials, body: &[u8]) -> Result<PublishOutcome> {
        self.authenticator.authorize(creds)?;
        let request = parse_publish_request(body)?;
        self.publish(&request, &SilentProgress).await
    }

    /// Commit an already validated request.
    #[instrument(
        skip_all,
        fields(section = %request.section, slug = %request.slug, force = request.force)
    )]
    pub async fn publish(
        &self,
        request: &PublishRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishOutcome> {
        let start = Instant::now();
        let section = request.section.config();

        // Resolve every target path up front so a bad slug or image filename
        // is rejected before anything is committed.
        let content_path = self.layout.content_path(&section, &request.slug)?;
        let image_target = request
            .image
            .as_ref()
            .map(|image| {
                self.layout
                    .image_target(&section, &image.filename)
                    .map(|target| (image, target))
            })
            .transpose()?;
        let manifest_path = self.layout.manifest_path(&section);
        let message = request.commit_message();

        progress.phase("Connecting to content store");
        let store = self.connector.connect().await?;

        progress.phase("Committing content");
        let rendered = render_json(&request.draft)?;
        store
            .put_file(&content_path, &rendered, &message, &WriteOptions::new(request.force))
            .await?;
        progress.file_committed(&content_path);

        let mut uploaded_ref = None;
        if let Some((image, target)) = image_target {
            progress.phase("Committing image");
            let written = store
                .put_file(
                    &target.repo_path,
                    &image.bytes,
                    &message,
                    &WriteOptions::new(request.force),
                )
                .await;
            if let Err(e) = written {
                warn!(path = %content_path, "content committed but image upload failed");
                return Err(e);
            }
            progress.file_committed(&target.repo_path);
            uploaded_ref = Some(target.public_ref);
        }

        progress.phase("Updating manifest");
        let image_ref = resolve_image_ref(uploaded_ref.as_deref(), &request.draft);
        let manifest_updated = match self
            .update_manifest(
                store.as_ref(),
                request,
                &manifest_path,
                image_ref.as_deref(),
                &message,
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                warn!(
                    path = %content_path,
                    error = %e,
                    "content committed but manifest update failed; re-run with force to repair"
                );
                return Err(e);
            }
        };
        if manifest_updated {
            progress.file_committed(&manifest_path);
        }

        let outcome = PublishOutcome { manifest_updated };
        info!(
            manifest_updated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "publish complete"
        );
        progress.done(&outcome);
        Ok(outcome)
    }

    /// Read, merge, and (if changed) write the section manifest.
    ///
    /// The write carries the version that was read, so a concurrent manifest
    /// change fails with a conflict instead of being overwritten.
    async fn update_manifest(
        &self,
        store: &dyn ContentStore,
        request: &PublishRequest,
        manifest_path: &str,
        image_ref: Option<&str>,
        message: &str,
    ) -> Result<bool> {
        let current = store.get_file(manifest_path).await?;
        let mut manifest = match &current {
            Some(file) => Manifest::from_slice(&file.content)?,
            None => Manifest::empty(),
        };

        let candidate =
            ManifestEntry::candidate(request.section, &request.slug, &request.draft, image_ref);
        let action = manifest.apply(&candidate, request.force);
        if !action.changed() {
            return Ok(false);
        }

        let opts = WriteOptions::new(true).expecting(Expected::from_read(current.as_ref()));
        store
            .put_file(manifest_path, &manifest.to_bytes()?, message, &opts)
            .await?;
        Ok(true)
    }
}
