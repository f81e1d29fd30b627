//! Stored documents and creation payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CouchError, Result};

/// One stored record: `_id`, `_rev` and every other top-level key.
///
/// Returned by `Database::doc_by_id`, `Database::all_docs` and
/// `Database::create`. The client never edits a `Document` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Build a document from a JSON object carrying `_id` and `_rev`.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CouchError::Deserialization(e.to_string()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rev(&self) -> &str {
        &self.rev
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Deserialize the whole document, `_id` and `_rev` included, into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let value = serde_json::to_value(self).map_err(|e| CouchError::Serialization(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| CouchError::Deserialization(e.to_string()))
    }
}

/// Input to `Database::create`.
///
/// With an `id` the document is written with `PUT /{db}/{id}`; without one
/// the server assigns the id (`POST /{db}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDocument {
    pub id: Option<String>,
    pub fields: Map<String, Value>,
}

impl NewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: Map::new(),
        }
    }

    /// Add or replace one field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Split `{"id": ..., ...fields}` into an id and the remaining fields.
    ///
    /// A non-string `id` stays in the fields untouched.
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        let id = match fields.remove("id") {
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                fields.insert("id".to_string(), other);
                None
            }
            None => None,
        };
        Self { id, fields }
    }

    /// Build from any value that serializes to a JSON object, applying the
    /// same `id` extraction as `from_fields`.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value).map_err(|e| CouchError::Serialization(e.to_string()))? {
            Value::Object(fields) => Ok(Self::from_fields(fields)),
            other => Err(CouchError::Serialization(format!(
                "document must be a JSON object, got {other}"
            ))),
        }
    }
}
