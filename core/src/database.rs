//! Document operations against one selected database.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::document::{Document, NewDocument};
use crate::error::{CouchError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::requests::CouchRequests;
use crate::transport::{round_trip, Transport};
use crate::types::{AllDocsOptions, DatabaseInfo, WriteResult};

/// Handle on a database that existed when `Server::use_db` selected it.
#[derive(Clone)]
pub struct Database {
    name: String,
    requests: CouchRequests,
    client: Arc<dyn Transport>,
    info: DatabaseInfo,
}

impl Database {
    pub(crate) fn new(name: String, requests: CouchRequests, client: Arc<dyn Transport>, info: DatabaseInfo) -> Self {
        Self {
            name,
            requests,
            client,
            info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transport shared with the `Server` this handle came from.
    pub fn client(&self) -> &Arc<dyn Transport> {
        &self.client
    }

    /// Metadata captured when the database was selected.
    pub fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    /// Every document, in the order the server lists them.
    pub fn all_docs(&self) -> Result<Vec<Document>> {
        self.all_docs_with(&AllDocsOptions::default())
    }

    pub fn all_docs_with(&self, options: &AllDocsOptions) -> Result<Vec<Document>> {
        let response = self.send(self.requests.build_all_docs(&self.name, options))?;
        let docs = self.requests.parse_all_docs(response)?;
        debug!(db = %self.name, count = docs.len(), "listed documents");
        Ok(docs)
    }

    pub fn doc_by_id(&self, id: &str) -> Result<Document> {
        if id.is_empty() {
            return Err(CouchError::InvalidArgument("document id must not be empty".to_string()));
        }
        let response = self.send(self.requests.build_get_doc(&self.name, id))?;
        self.requests.parse_get_doc(id, response)
    }

    /// Store a new document and return it as the server now holds it.
    ///
    /// Two round trips: the write, then a fetch of the written id.
    pub fn create(&self, doc: NewDocument) -> Result<Document> {
        if doc.id.as_deref() == Some("") {
            return Err(CouchError::InvalidArgument("document id must not be empty".to_string()));
        }
        let response = self.send(self.requests.build_create_doc(&self.name, &doc)?)?;
        let written = self.requests.parse_write(doc.id.as_deref(), response)?;
        debug!(db = %self.name, id = %written.id, rev = %written.rev, "created document");
        self.doc_by_id(&written.id)
    }

    /// Write `doc` back under its current revision.
    pub fn update(&self, doc: &Document) -> Result<WriteResult> {
        let response = self.send(self.requests.build_update_doc(&self.name, doc)?)?;
        let written = self.requests.parse_write(Some(&doc.id), response)?;
        debug!(db = %self.name, id = %written.id, rev = %written.rev, "updated document");
        Ok(written)
    }

    /// Delete `doc` at its current revision.
    pub fn delete(&self, doc: &Document) -> Result<WriteResult> {
        let response = self.send(self.requests.build_delete_doc(&self.name, doc))?;
        let written = self.requests.parse_delete(&doc.id, response)?;
        debug!(db = %self.name, id = %written.id, rev = %written.rev, "deleted document");
        Ok(written)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        round_trip(self.client.as_ref(), request)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("base_url", &self.requests.base_url())
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
