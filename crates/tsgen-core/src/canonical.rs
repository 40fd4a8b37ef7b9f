//! Canonical serialization and fingerprinting of schema documents.
//!
//! The canonical form is compact JSON in which every object's keys are
//! sorted by their UTF-8 bytes, at every depth. Array order is preserved,
//! since it carries meaning (parameter lists, `enum` values, `allOf` chains).
//! Numbers and strings use `serde_json`'s fixed, locale-independent
//! rendering. The fingerprint is the SHA-256 digest of those bytes.
//!
//! Keys are sorted here explicitly instead of relying on the map type inside
//! [`serde_json::Value`]: enabling `serde_json/preserve_order` anywhere in the
//! dependency graph switches that map to insertion order.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use tsgen_core::{SchemaDocument, canonical_json, fingerprint};
//!
//! let a = SchemaDocument::new(json!({"info": {"version": "1", "title": "API"}, "openapi": "3.1.0"}));
//! let b = SchemaDocument::new(json!({"openapi": "3.1.0", "info": {"title": "API", "version": "1"}}));
//!
//! assert_eq!(
//!     canonical_json(&a).unwrap(),
//!     r#"{"info":{"title":"API","version":"1"},"openapi":"3.1.0"}"#
//! );
//! assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
//! ```

use serde_json::Value;

use crate::error::SerializationError;
use crate::schema::SchemaDocument;
use crate::types::Fingerprint;

/// Maximum nesting depth accepted by the canonical encoder.
///
/// Real OpenAPI documents stay far below this; anything deeper is rejected
/// with [`SerializationError::TooDeep`] rather than risking stack exhaustion.
pub const MAX_DEPTH: usize = 256;

/// Computes the fingerprint of a schema document.
///
/// # Errors
///
/// Returns [`SerializationError`] if the document cannot be canonicalized.
pub fn fingerprint(document: &SchemaDocument) -> Result<Fingerprint, SerializationError> {
    let bytes = canonical_json_bytes(document)?;
    Ok(Fingerprint::of_bytes(&bytes))
}

/// Returns the canonical JSON encoding of a document as bytes.
pub fn canonical_json_bytes(document: &SchemaDocument) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::with_capacity(4096);
    write_value(&mut out, document.as_value(), 0)?;
    Ok(out)
}

/// Returns the canonical JSON encoding of a document as a string.
pub fn canonical_json(document: &SchemaDocument) -> Result<String, SerializationError> {
    let bytes = canonical_json_bytes(document)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_value(out: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), SerializationError> {
    if depth > MAX_DEPTH {
        return Err(SerializationError::TooDeep { max: MAX_DEPTH });
    }

    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => out.extend_from_slice(number.to_string().as_bytes()),
        Value::String(text) => serde_json::to_writer(&mut *out, text)?,
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_value(out, item, depth + 1)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(out, item, depth + 1)?;
            }
            out.push(b'}');
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(text: &str) -> SchemaDocument {
        SchemaDocument::from_json_slice(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_canonical_form_sorts_keys_recursively() {
        let document = SchemaDocument::new(json!({
            "c": {"z": 1.5, "y": -2},
            "b": 1,
            "a": [true, null, "x"]
        }));
        insta::assert_snapshot!(
            canonical_json(&document).unwrap(),
            @r#"{"a":[true,null,"x"],"b":1,"c":{"y":-2,"z":1.5}}"#
        );
    }

    #[test]
    fn test_keys_sort_by_bytes() {
        let document = SchemaDocument::new(json!({"a": 1, "B": 2, "_": 3}));
        assert_eq!(canonical_json(&document).unwrap(), r#"{"B":2,"_":3,"a":1}"#);
    }

    #[test]
    fn test_strings_are_escaped() {
        let document = SchemaDocument::new(json!({"q": "say \"hi\"\n"}));
        assert_eq!(
            canonical_json(&document).unwrap(),
            r#"{"q":"say \"hi\"\n"}"#
        );
    }

    #[test]
    fn test_empty_object_fingerprint() {
        let fp = fingerprint(&SchemaDocument::new(json!({}))).unwrap();
        assert_eq!(
            fp.as_str(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_fingerprint_ignores_source_key_order() {
        let a = doc(
            r#"{"openapi":"3.1.0","info":{"title":"API","version":"1"},
                "paths":{"/b":{"get":{}},"/a":{"post":{"tags":["x"]}}}}"#,
        );
        let b = doc(
            r#"{"paths":{"/a":{"post":{"tags":["x"]}},"/b":{"get":{}}},
                "info":{"version":"1","title":"API"},"openapi":"3.1.0"}"#,
        );
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_detects_sequence_reordering() {
        let a = SchemaDocument::new(json!({"parameters": ["limit", "offset"]}));
        let b = SchemaDocument::new(json!({"parameters": ["offset", "limit"]}));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_detects_value_and_key_changes() {
        let base = SchemaDocument::new(json!({"info": {"title": "API", "version": "1"}}));
        let value_changed = SchemaDocument::new(json!({"info": {"title": "API", "version": "2"}}));
        let key_changed = SchemaDocument::new(json!({"info": {"title": "API", "revision": "1"}}));
        let type_changed = SchemaDocument::new(json!({"info": {"title": "API", "version": 1}}));

        let base_fp = fingerprint(&base).unwrap();
        assert_ne!(base_fp, fingerprint(&value_changed).unwrap());
        assert_ne!(base_fp, fingerprint(&key_changed).unwrap());
        assert_ne!(base_fp, fingerprint(&type_changed).unwrap());
    }

    #[test]
    fn test_fingerprint_is_stable_across_calls() {
        let document = SchemaDocument::new(json!({"paths": {"/x": {"get": {"summary": "é"}}}}));
        let first = fingerprint(&document).unwrap();
        let second = fingerprint(&document.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert!(
            first
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        );
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let mut value = json!(0);
        for _ in 0..(MAX_DEPTH + 10) {
            value = Value::Array(vec![value]);
        }
        let result = fingerprint(&SchemaDocument::new(value));
        assert!(matches!(
            result,
            Err(SerializationError::TooDeep { max: MAX_DEPTH })
        ));
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let mut value = json!(0);
        for _ in 0..MAX_DEPTH {
            value = Value::Array(vec![value]);
        }
        assert!(fingerprint(&SchemaDocument::new(value)).is_ok());
    }
}
