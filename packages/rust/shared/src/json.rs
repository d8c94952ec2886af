//! Deterministic JSON rendering for committed documents.
//!
//! Every file contentpub writes is rendered the same way: keys in the order
//! they were supplied, two-space indentation, non-ASCII kept as UTF-8, and a
//! single trailing newline. Re-rendering a parsed document yields identical bytes.

use serde::Serialize;

use crate::error::Result;

/// Render a value as pretty JSON bytes with a trailing newline.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn renders_two_space_indent_and_newline() {
        let bytes = render_json(&json!({"items": [{"base": "a"}]})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"items\": [\n    {\n      \"base\": \"a\"\n    }\n  ]\n}\n");
    }

    #[test]
    fn preserves_supplied_key_order() {
        let parsed: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap();
        let text = String::from_utf8(render_json(&parsed).unwrap()).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn rendering_is_stable_across_reparse() {
        let first = render_json(&json!({"title": "Öppet hus", "tags": [], "n": 1.5})).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = render_json(&reparsed).unwrap();
        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().contains("Öppet hus"));
    }
}
