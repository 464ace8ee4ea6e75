//! Core document representation.
//!
//! A [`Document`] is a JSON object. Besides the caller's own fields, every stored document
//! carries three reserved fields maintained by the collection:
//!
//! - `_id` - the document [identifier](crate::identifier), assigned once at creation
//! - `createdAt` - ISO-8601 timestamp of creation
//! - `updatedAt` - ISO-8601 timestamp of the last successful mutation
//!
//! # Example
//!
//! ```ignore
//! use docstash::document::Document;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! let document = Document::from_typed(&User { name: "Alice".into(), age: 30 })?;
//! let user: User = document.to_typed()?;
//! ```

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Reserved identifier field.
pub const ID_FIELD: &str = "_id";
/// Reserved creation timestamp field.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Reserved modification timestamp field.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A single JSON document stored in a collection.
///
/// Field order is not significant. Two documents are equal when they hold the same fields
/// with equal values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the document identifier, if one has been assigned.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Returns the creation timestamp, if present.
    pub fn created_at(&self) -> Option<&str> {
        self.0.get(CREATED_AT_FIELD).and_then(Value::as_str)
    }

    /// Returns the last modification timestamp, if present.
    pub fn updated_at(&self) -> Option<&str> {
        self.0.get(UPDATED_AT_FIELD).and_then(Value::as_str)
    }

    /// Returns the value of a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a top-level field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a top-level field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns `true` if the document has the field.
    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the top-level fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the document, returning the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Builds a document from any serializable value that serializes to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the value does not serialize to an object.
    pub fn from_typed<T: Serialize>(value: &T) -> DocumentStoreResult<Self> {
        Self::try_from(serde_json::to_value(value)?)
    }

    /// Deserializes the document into a typed value.
    ///
    /// Reserved fields are included, so target types either declare them or ignore unknown
    /// fields.
    pub fn to_typed<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    /// Stamps a new document with an identifier and both timestamps.
    pub(crate) fn stamp_created(&mut self, id: String) {
        let now = timestamp();
        self.0.insert(ID_FIELD.to_string(), Value::String(id));
        self.0.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        self.0.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
    }

    /// Shallow-merges a patch into the document and refreshes `updatedAt`.
    ///
    /// `_id` and `createdAt` are never overwritten.
    pub(crate) fn apply_patch(&mut self, patch: &Map<String, Value>) {
        for (field, value) in patch {
            if field == ID_FIELD || field == CREATED_AT_FIELD {
                continue;
            }
            self.0.insert(field.clone(), value.clone());
        }
        self.0.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp()));
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentStoreError::validation(format!(
                "Expected a document object, found {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Object(document.0)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
