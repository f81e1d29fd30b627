//! Stateless request builder and response parser for the CouchDB API.
//!
//! # Design
//! `CouchRequests` holds only the base URL. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`, so every URL, header and status mapping
//! can be checked without a network. `Server` and `Database` run the round
//! trip in between through a `Transport`.

use std::borrow::Cow;

use serde::de::DeserializeOwned;

use crate::document::{Document, NewDocument};
use crate::error::{CouchError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{AllDocsOptions, AllDocsResponse, DatabaseInfo, ErrorBody, Welcome, WriteResult};

const JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchRequests {
    base_url: String,
}

impl CouchRequests {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Server
    // -----------------------------------------------------------------------

    pub fn build_welcome(&self) -> HttpRequest {
        request(HttpMethod::Get, format!("{}/", self.base_url), None)
    }

    /// Any 2xx carrying the welcome payload is a live server; everything
    /// else is a `Connection` error.
    pub fn parse_welcome(&self, response: HttpResponse) -> Result<Welcome> {
        if !response.is_success() {
            let body = ErrorBody::from_response(&response);
            return Err(CouchError::Connection {
                status: Some(response.status),
                message: body.describe(),
            });
        }
        serde_json::from_str(&response.body).map_err(|e| CouchError::Connection {
            status: Some(response.status),
            message: format!("unexpected welcome payload: {e}"),
        })
    }

    pub fn build_all_dbs(&self) -> HttpRequest {
        request(HttpMethod::Get, format!("{}/_all_dbs", self.base_url), None)
    }

    pub fn parse_all_dbs(&self, response: HttpResponse) -> Result<Vec<String>> {
        expect_status(&response, &[200])?;
        decode(&response)
    }

    // -----------------------------------------------------------------------
    // Databases
    // -----------------------------------------------------------------------

    pub fn build_db_info(&self, db: &str) -> HttpRequest {
        request(HttpMethod::Get, self.db_url(db), None)
    }

    pub fn parse_db_info(&self, db: &str, response: HttpResponse) -> Result<DatabaseInfo> {
        if response.status == 404 {
            return Err(CouchError::DatabaseNotFound(db.to_string()));
        }
        expect_status(&response, &[200])?;
        let mut info: DatabaseInfo = decode(&response)?;
        if info.db_name.is_empty() {
            info.db_name = db.to_string();
        }
        Ok(info)
    }

    pub fn build_create_db(&self, db: &str) -> HttpRequest {
        request(HttpMethod::Put, self.db_url(db), None)
    }

    /// Returns `false` when the database already existed (412).
    pub fn parse_create_db(&self, response: HttpResponse) -> Result<bool> {
        if response.status == 412 {
            return Ok(false);
        }
        expect_status(&response, &[201, 202])?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn build_all_docs(&self, db: &str, options: &AllDocsOptions) -> HttpRequest {
        let mut url = format!("{}/_all_docs?include_docs=true", self.db_url(db));
        if let Some(limit) = options.limit {
            url.push_str(&format!("&limit={limit}"));
        }
        if let Some(skip) = options.skip {
            url.push_str(&format!("&skip={skip}"));
        }
        if options.descending {
            url.push_str("&descending=true");
        }
        request(HttpMethod::Get, url, None)
    }

    /// Rows keep server order; rows without an embedded doc are skipped.
    pub fn parse_all_docs(&self, response: HttpResponse) -> Result<Vec<Document>> {
        expect_status(&response, &[200])?;
        let listing: AllDocsResponse = decode(&response)?;
        Ok(listing.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    pub fn build_get_doc(&self, db: &str, id: &str) -> HttpRequest {
        request(HttpMethod::Get, self.doc_url(db, id), None)
    }

    pub fn parse_get_doc(&self, id: &str, response: HttpResponse) -> Result<Document> {
        if response.status == 404 {
            return Err(CouchError::DocumentNotFound(id.to_string()));
        }
        expect_status(&response, &[200])?;
        decode(&response)
    }

    pub fn build_create_doc(&self, db: &str, doc: &NewDocument) -> Result<HttpRequest> {
        let body = serde_json::to_string(&doc.fields).map_err(|e| CouchError::Serialization(e.to_string()))?;
        Ok(match &doc.id {
            Some(id) => request(HttpMethod::Put, self.doc_url(db, id), Some(body)),
            None => request(HttpMethod::Post, self.db_url(db), Some(body)),
        })
    }

    pub fn build_update_doc(&self, db: &str, doc: &Document) -> Result<HttpRequest> {
        let body = serde_json::to_string(doc).map_err(|e| CouchError::Serialization(e.to_string()))?;
        Ok(request(HttpMethod::Put, self.doc_url(db, &doc.id), Some(body)))
    }

    /// Parse the `{ok, id, rev}` acknowledgement of a create or update.
    pub fn parse_write(&self, id: Option<&str>, response: HttpResponse) -> Result<WriteResult> {
        if response.status == 409 {
            return Err(conflict(id, &response));
        }
        expect_status(&response, &[201, 202])?;
        acknowledged(decode(&response)?)
    }

    pub fn build_delete_doc(&self, db: &str, doc: &Document) -> HttpRequest {
        let url = format!("{}?rev={}", self.doc_url(db, &doc.id), urlencoding::encode(&doc.rev));
        request(HttpMethod::Delete, url, None)
    }

    pub fn parse_delete(&self, id: &str, response: HttpResponse) -> Result<WriteResult> {
        match response.status {
            404 => return Err(CouchError::DocumentNotFound(id.to_string())),
            409 => return Err(conflict(Some(id), &response)),
            _ => {}
        }
        expect_status(&response, &[200, 202])?;
        acknowledged(decode(&response)?)
    }

    fn db_url(&self, db: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(db))
    }

    fn doc_url(&self, db: &str, id: &str) -> String {
        format!("{}/{}", self.db_url(db), encode_doc_id(id))
    }
}

/// Design and local document ids keep their prefix slash literal.
fn encode_doc_id(id: &str) -> Cow<'_, str> {
    for prefix in ["_design/", "_local/"] {
        if let Some(rest) = id.strip_prefix(prefix) {
            return Cow::Owned(format!("{prefix}{}", urlencoding::encode(rest)));
        }
    }
    urlencoding::encode(id)
}

fn request(method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
    let mut headers = vec![("accept".to_string(), JSON.to_string())];
    if body.is_some() {
        headers.push(("content-type".to_string(), JSON.to_string()));
    }
    HttpRequest {
        method,
        url,
        headers,
        body,
    }
}

/// Map a status outside `accepted` to `CouchError::Http`.
fn expect_status(response: &HttpResponse, accepted: &[u16]) -> Result<()> {
    if accepted.contains(&response.status) {
        return Ok(());
    }
    let ErrorBody { error, reason } = ErrorBody::from_response(response);
    Err(CouchError::Http {
        status: response.status,
        error,
        reason,
    })
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_str(&response.body).map_err(|e| CouchError::Deserialization(e.to_string()))
}

fn conflict(id: Option<&str>, response: &HttpResponse) -> CouchError {
    let body = ErrorBody::from_response(response);
    CouchError::Conflict {
        id: id.map(str::to_string),
        reason: body.describe(),
    }
}

fn acknowledged(result: WriteResult) -> Result<WriteResult> {
    if !result.ok {
        return Err(CouchError::Deserialization(format!(
            "write of {} was not acknowledged",
            result.id
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn requests() -> CouchRequests {
        CouchRequests::new("http://localhost:5984")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn build_welcome_targets_root() {
        let req = requests().build_welcome();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:5984/");
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert!(req.header("content-type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = CouchRequests::new("http://localhost:5984//").build_db_info("egdb");
        assert_eq!(req.url, "http://localhost:5984/egdb");
    }

    #[test]
    fn parse_welcome_failure_is_connection_error() {
        let err = requests()
            .parse_welcome(response(500, r#"{"error":"unknown_error","reason":"badarg"}"#))
            .unwrap_err();
        match err {
            CouchError::Connection { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "unknown_error: badarg");
            }
            other => panic!("expected Connection, got {other:?}"),
        }
    }

    #[test]
    fn parse_welcome_rejects_foreign_payload() {
        let err = requests().parse_welcome(response(200, "<html>proxy</html>")).unwrap_err();
        assert!(matches!(err, CouchError::Connection { status: Some(200), .. }));
    }

    #[test]
    fn parse_db_info_not_found() {
        let err = requests()
            .parse_db_info(
                "nope",
                response(404, r#"{"error":"not_found","reason":"Database does not exist."}"#),
            )
            .unwrap_err();
        assert!(matches!(err, CouchError::DatabaseNotFound(name) if name == "nope"));
    }

    #[test]
    fn parse_db_info_without_name_uses_requested_name() {
        let info = requests()
            .parse_db_info("egdb", response(200, r#"{"doc_count":0}"#))
            .unwrap();
        assert_eq!(info.db_name, "egdb");
        assert_eq!(info.doc_count, Some(0));
    }

    #[test]
    fn database_names_are_encoded() {
        let req = requests().build_db_info("logs/2024");
        assert_eq!(req.url, "http://localhost:5984/logs%2F2024");
    }

    #[test]
    fn parse_create_db_tolerates_existing() {
        let c = requests();
        assert!(c.parse_create_db(response(201, r#"{"ok":true}"#)).unwrap());
        assert!(!c
            .parse_create_db(response(412, r#"{"error":"file_exists","reason":"exists"}"#))
            .unwrap());
        let err = c
            .parse_create_db(response(400, r#"{"error":"illegal_database_name","reason":"bad"}"#))
            .unwrap_err();
        assert!(matches!(err, CouchError::Http { status: 400, ref error, .. } if error == "illegal_database_name"));
    }

    #[test]
    fn build_all_docs_always_includes_docs() {
        let req = requests().build_all_docs("egdb", &AllDocsOptions::default());
        assert_eq!(req.url, "http://localhost:5984/egdb/_all_docs?include_docs=true");

        let options = AllDocsOptions {
            limit: Some(10),
            skip: Some(5),
            descending: true,
        };
        let req = requests().build_all_docs("egdb", &options);
        assert_eq!(
            req.url,
            "http://localhost:5984/egdb/_all_docs?include_docs=true&limit=10&skip=5&descending=true"
        );
    }

    #[test]
    fn parse_all_docs_skips_rows_without_doc() {
        let body = json!({
            "total_rows": 2,
            "offset": 0,
            "rows": [
                {"id": "a", "key": "a", "value": {"rev": "1-x"}, "doc": {"_id": "a", "_rev": "1-x", "n": 1}},
                {"id": "b", "key": "b", "value": {"rev": "2-y", "deleted": true}, "doc": null}
            ]
        });
        let docs = requests().parse_all_docs(response(200, &body.to_string())).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }

    #[test]
    fn doc_ids_are_encoded_except_design_prefix() {
        let c = requests();
        assert_eq!(
            c.build_get_doc("egdb", "a b/c").url,
            "http://localhost:5984/egdb/a%20b%2Fc"
        );
        assert_eq!(
            c.build_get_doc("egdb", "_design/views").url,
            "http://localhost:5984/egdb/_design/views"
        );
    }

    #[test]
    fn parse_get_doc_not_found() {
        let err = requests()
            .parse_get_doc("missing", response(404, r#"{"error":"not_found","reason":"missing"}"#))
            .unwrap_err();
        assert!(matches!(err, CouchError::DocumentNotFound(id) if id == "missing"));
    }

    #[test]
    fn create_with_id_is_put_without_id_in_body() {
        let doc = NewDocument::with_id("abcde12345").field("noise", "howl");
        let req = requests().build_create_doc("egdb", &doc).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:5984/egdb/abcde12345");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"noise": "howl"}));
    }

    #[test]
    fn create_without_id_is_post_to_database() {
        let doc = NewDocument::new().field("noise", "howl");
        let req = requests().build_create_doc("egdb", &doc).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:5984/egdb");
    }

    #[test]
    fn update_carries_revision_in_body() {
        let doc = Document::from_value(json!({"_id": "a", "_rev": "1-x", "noise": "pop"})).unwrap();
        let req = requests().build_update_doc("egdb", &doc).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["_rev"], "1-x");
    }

    #[test]
    fn parse_write_conflict() {
        let err = requests()
            .parse_write(
                Some("abcde12345"),
                response(409, r#"{"error":"conflict","reason":"Document update conflict."}"#),
            )
            .unwrap_err();
        match err {
            CouchError::Conflict { id, reason } => {
                assert_eq!(id.as_deref(), Some("abcde12345"));
                assert_eq!(reason, "conflict: Document update conflict.");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn parse_write_requires_ok() {
        let err = requests()
            .parse_write(None, response(201, r#"{"ok":false,"id":"a","rev":"1-x"}"#))
            .unwrap_err();
        assert!(matches!(err, CouchError::Deserialization(_)));
    }

    #[test]
    fn parse_write_unexpected_status_keeps_raw_body() {
        let err = requests().parse_write(None, response(500, "gateway exploded")).unwrap_err();
        match err {
            CouchError::Http { status, error, reason } => {
                assert_eq!(status, 500);
                assert_eq!(error, "unknown_error");
                assert_eq!(reason, "gateway exploded");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn delete_sends_encoded_revision() {
        let doc = Document::from_value(json!({"_id": "a", "_rev": "2-x+y"})).unwrap();
        let req = requests().build_delete_doc("egdb", &doc);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:5984/egdb/a?rev=2-x%2By");
    }

    #[test]
    fn parse_delete_maps_missing_and_conflict() {
        let c = requests();
        assert!(matches!(
            c.parse_delete("a", response(404, r#"{"error":"not_found","reason":"deleted"}"#)),
            Err(CouchError::DocumentNotFound(_))
        ));
        assert!(matches!(
            c.parse_delete("a", response(409, r#"{"error":"conflict","reason":"Document update conflict."}"#)),
            Err(CouchError::Conflict { .. })
        ));
        let ok = c.parse_delete("a", response(200, r#"{"ok":true,"id":"a","rev":"3-z"}"#)).unwrap();
        assert_eq!(ok.rev, "3-z");
    }

    #[test]
    fn parse_all_dbs_lists_names() {
        let names = requests().parse_all_dbs(response(200, r#"["_users","egdb"]"#)).unwrap();
        assert_eq!(names, vec!["_users", "egdb"]);
    }
}
