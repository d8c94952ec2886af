//! Decoding and structural validation of publish request bodies.
//!
//! Wire shape (JSON object):
//!
//! ```text
//! {
//!   "section": "news" | "events" | "projects",
//!   "slug": "<non-empty string>",
//!   "payload": { ...draft... },
//!   "force": false,
//!   "commitMessage": "optional",
//!   "imageUpload": { "data": "<base64>", "filename": "optional", "contentType": "optional" }
//! }
//! ```

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

use contentpub_shared::{ImageUpload, PublishError, PublishRequest, Result, Section};

/// Standard alphabet, padding optional.
const IMAGE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "application/octet-stream";

/// Parse a raw request body into a [`PublishRequest`].
///
/// Every failure is a [`PublishError::BadRequest`].
pub fn parse_publish_request(body: &[u8]) -> Result<PublishRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PublishError::bad_request(format!("Body must be valid JSON: {e}")))?;
    let Value::Object(mut body) = value else {
        return Err(PublishError::bad_request("Body must be a JSON object"));
    };

    let section = body
        .get("section")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Section>().ok())
        .ok_or_else(|| PublishError::bad_request("Invalid 'section' field"))?;

    let slug = body
        .get("slug")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PublishError::bad_request("Missing or invalid 'slug'"))?;

    let draft = match body.remove("payload") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return Err(PublishError::bad_request("Missing 'payload' JSON object")),
    };

    let force = match body.get("force") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(PublishError::bad_request("'force' must be a boolean")),
    };

    let commit_message = match body.get("commitMessage") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(PublishError::bad_request("'commitMessage' must be a string"));
        }
    };

    let image = match body.get("imageUpload") {
        None | Some(Value::Null) => None,
        Some(Value::Object(upload)) => Some(parse_image_upload(upload, &slug)?),
        Some(_) => return Err(PublishError::bad_request("'imageUpload' must be an object")),
    };

    Ok(PublishRequest {
        section,
        slug,
        draft,
        image,
        force,
        commit_message,
    })
}

fn parse_image_upload(upload: &Map<String, Value>, slug: &str) -> Result<ImageUpload> {
    let data = upload
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| PublishError::bad_request("'imageUpload.data' must be a base64 string"))?;

    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = IMAGE_ENGINE
        .decode(compact.as_bytes())
        .map_err(|e| PublishError::bad_request(format!("Image data must be base64 encoded: {e}")))?;
    if bytes.is_empty() {
        return Err(PublishError::bad_request("Uploaded image contains no data"));
    }

    let text_field = |name: &str| {
        upload
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(ImageUpload {
        filename: text_field("filename").unwrap_or_else(|| format!("{slug}.jpg")),
        content_type: text_field("contentType")
            .unwrap_or_else(|| DEFAULT_IMAGE_CONTENT_TYPE.to_string()),
        bytes,
    })
}
