//! Wire DTOs for the CouchDB HTTP API.
//!
//! Every payload keeps the keys it does not model in a flattened `other`
//! map, so nothing the server sends is lost on the way through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Document;
use crate::http::HttpResponse;

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    /// The greeting, `"Welcome"` on every CouchDB release.
    pub couchdb: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub vendor: Option<Vendor>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Body of `GET /{db}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Filled from the requested name when the server leaves it out.
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub doc_count: Option<u64>,
    #[serde(default)]
    pub doc_del_count: Option<u64>,
    /// A number on 1.x servers and an opaque string on 2.x and later.
    #[serde(default)]
    pub update_seq: Option<Value>,
    #[serde(default)]
    pub purge_seq: Option<Value>,
    #[serde(default)]
    pub sizes: Option<DatabaseSizes>,
    #[serde(default)]
    pub disk_size: Option<u64>,
    #[serde(default)]
    pub data_size: Option<u64>,
    #[serde(default)]
    pub disk_format_version: Option<u64>,
    #[serde(default)]
    pub compact_running: Option<bool>,
    #[serde(default)]
    pub instance_start_time: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSizes {
    #[serde(default)]
    pub file: Option<u64>,
    #[serde(default)]
    pub external: Option<u64>,
    #[serde(default)]
    pub active: Option<u64>,
}

/// Acknowledgement of a document write or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// Body of `GET /{db}/_all_docs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllDocsResponse {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    /// Present when `include_docs=true`; `null` for deleted entries.
    #[serde(default)]
    pub doc: Option<Document>,
}

/// The `{"error": ..., "reason": ...}` body CouchDB sends with failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    /// Parse the CouchDB error body, falling back to the raw text.
    pub fn from_response(response: &HttpResponse) -> Self {
        serde_json::from_str(&response.body).unwrap_or_else(|_| ErrorBody {
            error: "unknown_error".to_string(),
            reason: response.body.trim().to_string(),
        })
    }

    pub(crate) fn describe(&self) -> String {
        match (self.error.is_empty(), self.reason.is_empty()) {
            (_, true) => self.error.clone(),
            (true, false) => self.reason.clone(),
            (false, false) => format!("{}: {}", self.error, self.reason),
        }
    }
}

/// Query options for listing documents. `include_docs=true` is always sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllDocsOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub descending: bool,
}

/// Options for selecting a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseDbOptions {
    pub name: String,
    /// Create the database when the select call reports it missing.
    pub create_if_missing: bool,
}

impl UseDbOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            create_if_missing: false,
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}
