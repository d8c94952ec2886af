//! Manifest entry shapes, one per section family.

use serde::Serialize;
use serde_json::{Map, Value};

use contentpub_shared::{Draft, EntryFamily, Section};

/// Draft fields copied onto an event entry when present.
const EVENT_FIELDS: [&str; 5] = ["date", "timeStart", "timeEnd", "location", "meta"];

/// Keys identifying an entry, in lookup priority order.
const KEY_FIELDS: [&str; 3] = ["base", "id", "slug"];

/// The entry a publish wants the manifest to hold for its slug.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    /// News and projects: `{base, image?}`.
    List(ListEntry),
    /// Events: `{id, title, date?, timeStart?, timeEnd?, location?, meta?}`.
    Event(EventEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ManifestEntry {
    /// Build the candidate entry for `slug` from its draft.
    ///
    /// `image` only applies to list-style sections; event entries never carry one.
    pub fn candidate(section: Section, slug: &str, draft: &Draft, image: Option<&str>) -> Self {
        match section.family() {
            EntryFamily::List => ManifestEntry::List(ListEntry {
                base: slug.to_string(),
                image: image.map(str::to_string),
            }),
            EntryFamily::Event => {
                let field = |name: &str| draft.get(name).filter(|v| is_truthy(v)).cloned();
                let [date, time_start, time_end, location, meta] = EVENT_FIELDS.map(field);
                let title = draft
                    .get("title")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(slug)
                    .to_string();
                ManifestEntry::Event(EventEntry {
                    id: slug.to_string(),
                    title,
                    date,
                    time_start,
                    time_end,
                    location,
                    meta,
                })
            }
        }
    }

    /// Key this entry is found under.
    pub fn slug(&self) -> &str {
        match self {
            ManifestEntry::List(entry) => &entry.base,
            ManifestEntry::Event(entry) => &entry.id,
        }
    }

    /// The entry as a JSON object, fields in declaration order.
    pub fn to_object(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Both variants are plain structs and always serialize to objects.
            _ => Map::new(),
        }
    }
}

/// Lookup key of a raw manifest item.
///
/// Objects use the first truthy of `base`, `id`, `slug`; a bare string is its
/// own key (legacy shape).
pub fn entry_key(item: &Value) -> Option<&str> {
    match item {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => KEY_FIELDS
            .iter()
            .filter_map(|k| map.get(*k))
            .find(|v| is_truthy(v))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Resolve the manifest image for a publish.
///
/// An uploaded image wins; otherwise the draft's own non-blank `image` string, trimmed.
pub fn resolve_image_ref(uploaded: Option<&str>, draft: &Draft) -> Option<String> {
    if let Some(path) = uploaded {
        return Some(path.to_string());
    }
    draft
        .get("image")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// JSON truthiness: null, false, zero, and empty strings/arrays/objects are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> Draft {
        match value {
            Value::Object(map) => map,
            _ => panic!("draft must be an object"),
        }
    }

    #[test]
    fn list_candidate_with_and_without_image() {
        let d = draft(json!({"title": "Open house"}));
        let bare = ManifestEntry::candidate(Section::News, "open-house", &d, None);
        assert_eq!(Value::Object(bare.to_object()), json!({"base": "open-house"}));

        let with_image =
            ManifestEntry::candidate(Section::Projects, "p1", &d, Some("content/projects/p1.jpg"));
        assert_eq!(
            Value::Object(with_image.to_object()),
            json!({"base": "p1", "image": "content/projects/p1.jpg"})
        );
    }

    #[test]
    fn event_candidate_copies_truthy_fields_in_order() {
        let d = draft(json!({
            "title": "Summer school",
            "location": "Room 1",
            "date": "2025-06-01",
            "timeStart": "",
            "meta": null,
            "body": "ignored"
        }));
        let entry = ManifestEntry::candidate(Section::Events, "summer", &d, Some("ignored.jpg"));
        let rendered = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            rendered,
            r#"{"id":"summer","title":"Summer school","date":"2025-06-01","location":"Room 1"}"#
        );
    }

    #[test]
    fn event_title_falls_back_to_slug() {
        let entry = ManifestEntry::candidate(Section::Events, "summer", &Draft::new(), None);
        match entry {
            ManifestEntry::Event(e) => assert_eq!(e.title, "summer"),
            other => panic!("expected event entry, got {other:?}"),
        }
    }

    #[test]
    fn entry_key_priority() {
        assert_eq!(entry_key(&json!({"base": "a", "id": "b"})), Some("a"));
        assert_eq!(entry_key(&json!({"base": "", "id": "b", "slug": "c"})), Some("b"));
        assert_eq!(entry_key(&json!({"slug": "c"})), Some("c"));
        assert_eq!(entry_key(&json!("legacy")), Some("legacy"));
        assert_eq!(entry_key(&json!({"title": "x"})), None);
        assert_eq!(entry_key(&json!(42)), None);
    }

    #[test]
    fn image_ref_resolution() {
        let d = draft(json!({"image": "  https://cdn.example/x.jpg  "}));
        assert_eq!(
            resolve_image_ref(Some("content/news/a.jpg"), &d),
            Some("content/news/a.jpg".into())
        );
        assert_eq!(
            resolve_image_ref(None, &d),
            Some("https://cdn.example/x.jpg".into())
        );
        assert_eq!(resolve_image_ref(None, &draft(json!({"image": "   "}))), None);
        assert_eq!(resolve_image_ref(None, &Draft::new()), None);
    }
}
