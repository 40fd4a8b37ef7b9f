//! Schema documents and their structural validation.
//!
//! A [`SchemaDocument`] is the OpenAPI document produced by a schema
//! provider. Its content is opaque to the pipeline except for the handful of
//! fields checked by [`SchemaDocument::validate`]:
//!
//! - the root is an object with `openapi`, `info` and `paths`
//! - `info.title` is a string
//! - `paths` registers at least one entry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{SchemaError, SerializationError};

/// Top-level fields every schema must carry.
const REQUIRED_FIELDS: [&str; 3] = ["openapi", "info", "paths"];

/// An OpenAPI schema document.
///
/// Wraps a [`serde_json::Value`]; mappings, sequences, strings, numbers,
/// booleans and null are the only node types it can hold.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tsgen_core::SchemaDocument;
///
/// let doc = SchemaDocument::new(json!({
///     "openapi": "3.1.0",
///     "info": {"title": "NinjaAPI", "version": "1.0.0"},
///     "paths": {"/api/items": {"get": {"operationId": "list_items"}}}
/// }));
/// assert!(doc.validate().is_ok());
/// assert_eq!(doc.title(), Some("NinjaAPI"));
/// assert_eq!(doc.path_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument(Value);

impl SchemaDocument {
    /// Wraps an already-parsed JSON value.
    #[inline]
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Converts any serializable value into a document.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Unrepresentable`] when the value has no
    /// JSON representation, for example a map keyed by non-string values.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Parses a document from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes).map(Self)
    }

    /// Serializes the document as pretty-printed JSON, for handing to a
    /// generator.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.0)
    }

    /// Returns the underlying JSON value.
    #[inline]
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the document and returns the underlying JSON value.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns `info.title`, if present.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.0.get("info")?.get("title")?.as_str()
    }

    /// Returns the `openapi` version string, if present.
    #[must_use]
    pub fn openapi_version(&self) -> Option<&str> {
        self.0.get("openapi")?.as_str()
    }

    /// Returns the number of entries under `paths`.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.0
            .get("paths")
            .and_then(Value::as_object)
            .map_or(0, serde_json::Map::len)
    }

    /// Checks the fields the pipeline relies on.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NotAnObject`] if the root is not a mapping
    /// - [`SchemaError::MissingFields`] listing every absent top-level field
    /// - [`SchemaError::MissingTitle`] if `info` has no string `title`
    /// - [`SchemaError::NoPaths`] if `paths` is empty or not a mapping
    pub fn validate(&self) -> Result<(), SchemaError> {
        let Value::Object(root) = &self.0 else {
            return Err(SchemaError::NotAnObject {
                found: json_type_name(&self.0),
            });
        };

        let missing: SmallVec<[&'static str; 4]> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !root.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingFields(missing));
        }

        if self.title().is_none() {
            return Err(SchemaError::MissingTitle);
        }

        if self.path_count() == 0 {
            return Err(SchemaError::NoPaths);
        }

        Ok(())
    }
}

impl From<Value> for SchemaDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Names the JSON type of a value for error messages.
const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
