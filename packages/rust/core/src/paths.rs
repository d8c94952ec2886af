//! Repository paths for content, images, and manifests.

use contentpub_manifest::MANIFEST_FILE_NAME;
use contentpub_shared::{ContentConfig, PublishError, Result, SectionConfig};

/// Where an uploaded image is committed and how the site refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    /// Repository path the bytes are written to.
    pub repo_path: String,
    /// Site-relative reference recorded in the manifest.
    pub public_ref: String,
}

/// Layout of the content tree inside the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    root: String,
    public_prefix: String,
}

impl Default for ContentLayout {
    fn default() -> Self {
        Self::from_config(&ContentConfig::default())
    }
}

impl ContentLayout {
    pub fn new(root: &str, public_prefix: &str) -> Self {
        Self {
            root: root.trim_matches('/').to_string(),
            public_prefix: public_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(&config.root, &config.public_prefix)
    }

    /// `<root>/<contentDir>`.
    pub fn section_dir(&self, section: &SectionConfig) -> String {
        join(&self.root, section.content_dir)
    }

    /// `<root>/<contentDir>/index.json`.
    pub fn manifest_path(&self, section: &SectionConfig) -> String {
        format!("{}/{MANIFEST_FILE_NAME}", self.section_dir(section))
    }

    /// `<root>/<contentDir>/<slug>.json`, refusing slugs that leave the section directory.
    pub fn content_path(&self, section: &SectionConfig, slug: &str) -> Result<String> {
        let dir = self.section_dir(section);
        let raw = format!("{dir}/{slug}.json");
        match normalize_path(&raw) {
            Some(normalized)
                if !slug.is_empty() && normalized == raw && is_under(&normalized, &dir) =>
            {
                Ok(raw)
            }
            _ => Err(PublishError::bad_request(
                "Invalid 'slug': must name a file inside the section directory",
            )),
        }
    }

    /// Resolve an upload filename to its committed path and manifest reference.
    pub fn image_target(&self, section: &SectionConfig, filename: &str) -> Result<ImageTarget> {
        let dir = self.section_dir(section);
        let normalized = normalize_path(&format!("{dir}/{filename}"))
            .filter(|p| is_under(p, &dir))
            .ok_or_else(|| PublishError::bad_request("Invalid image path"))?;

        let relative = &normalized[dir.len() + 1..];
        let public_ref = join(&join(&self.public_prefix, section.content_dir), relative);
        Ok(ImageTarget {
            repo_path: normalized,
            public_ref,
        })
    }
}

/// Characters a URL would decode or cut a path at.
const URL_SIGNIFICANT: [char; 3] = ['%', '?', '#'];

/// Resolve `.`, `..` and empty segments lexically.
///
/// Returns `None` when `..` would climb above the start of the path, or when
/// a segment carries a percent escape, `?` or `#`.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other if other.contains(URL_SIGNIFICANT) => return None,
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// True when `path` names something strictly inside `dir`.
fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() + 1 && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

fn join(a: &str, b: &str) -> String {
    if a.is_empty() {
        b.to_string()
    } else {
        format!("{a}/{b}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentpub_shared::Section;

    fn news() -> SectionConfig {
        Section::News.config()
    }

    #[test]
    fn default_layout_paths() {
        let layout = ContentLayout::default();
        assert_eq!(
            layout.content_path(&news(), "open-house-2025").unwrap(),
            "public/content/news/open-house-2025.json"
        );
        assert_eq!(
            layout.manifest_path(&Section::Events.config()),
            "public/content/events/index.json"
        );
    }

    #[test]
    fn traversing_slugs_are_rejected() {
        let layout = ContentLayout::default();
        for slug in ["", "../secrets", "../../x", "a/../../b", "./a", "a//b"] {
            let err = layout.content_path(&news(), slug).unwrap_err();
            assert_eq!(err.status_code(), 400, "slug {slug:?} should be rejected");
        }
    }

    #[test]
    fn image_target_maps_to_public_ref() {
        let layout = ContentLayout::default();
        let target = layout.image_target(&news(), "open-house.jpg").unwrap();
        assert_eq!(target.repo_path, "public/content/news/open-house.jpg");
        assert_eq!(target.public_ref, "content/news/open-house.jpg");
    }

    #[test]
    fn image_target_collapses_harmless_segments() {
        let layout = ContentLayout::default();
        let target = layout.image_target(&news(), "./img//a/../b.png").unwrap();
        assert_eq!(target.repo_path, "public/content/news/img/b.png");
        assert_eq!(target.public_ref, "content/news/img/b.png");
    }

    #[test]
    fn image_traversal_is_rejected() {
        let layout = ContentLayout::default();
        for filename in ["../../secrets.json", "../events/x.jpg", "..\\..\\x.jpg", "", "."] {
            let err = layout.image_target(&news(), filename).unwrap_err();
            assert_eq!(err.to_string(), "Invalid image path", "{filename:?}");
        }
    }

    #[test]
    fn percent_encoded_traversal_is_rejected() {
        let layout = ContentLayout::default();
        let slugs = [
            "%2e%2e/%2e%2e/%2e%2e/.github/workflows/x",
            "%2E%2E/x",
            "a%2fb",
            "a?b",
            "a#b",
        ];
        for slug in slugs {
            let err = layout.content_path(&news(), slug).unwrap_err();
            assert_eq!(err.status_code(), 400, "slug {slug:?} should be rejected");
        }
        let filenames = [
            "%2e%2e/%2e%2e/secrets.json",
            "img%2F..%2F..%2Fx.jpg",
            "a.jpg?x",
            "a#.jpg",
        ];
        for filename in filenames {
            let err = layout.image_target(&news(), filename).unwrap_err();
            assert_eq!(err.to_string(), "Invalid image path", "{filename:?}");
        }
    }

    #[test]
    fn normalize_refuses_to_climb_above_start() {
        assert_eq!(normalize_path("a/./b/../c"), Some("a/c".into()));
        assert_eq!(normalize_path("../a"), None);
    }

    #[test]
    fn custom_root_is_trimmed() {
        let layout = ContentLayout::new("/site/content/", "/content/");
        assert_eq!(layout.section_dir(&news()), "site/content/news");
        let target = layout.image_target(&news(), "a.jpg").unwrap();
        assert_eq!(target.public_ref, "content/news/a.jpg");
    }
}
