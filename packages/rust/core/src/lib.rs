//! Publish orchestration for contentpub.
//!
//! Ties the crates together for a single request:
//! 1. authorize the caller ([`contentpub_auth`])
//! 2. decode and validate the body ([`request`])
//! 3. resolve repository paths, rejecting traversal ([`paths`])
//! 4. commit the content file, then the optional image ([`contentpub_store`])
//! 5. fold the entry into the section manifest ([`contentpub_manifest`])

pub mod paths;
pub mod publish;
pub mod request;

pub use paths::{ContentLayout, ImageTarget, normalize_path};
pub use publish::{ProgressReporter, Publisher, SilentProgress};
pub use request::parse_publish_request;
