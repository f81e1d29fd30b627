use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const VERSION: &str = "3.3.3";

#[derive(Clone, Debug, PartialEq)]
pub struct StoredDoc {
    pub rev: String,
    pub body: Map<String, Value>,
    pub deleted: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StoredDb {
    pub docs: BTreeMap<String, StoredDoc>,
    pub update_seq: u64,
}

pub type Couch = Arc<RwLock<BTreeMap<String, StoredDb>>>;

/// A CouchDB-style failure: status plus the `{error, reason}` body.
#[derive(Debug, PartialEq)]
pub struct CouchFailure {
    pub status: StatusCode,
    pub error: &'static str,
    pub reason: String,
}

impl CouchFailure {
    fn new(status: StatusCode, error: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status,
            error,
            reason: reason.into(),
        }
    }

    fn no_db() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
    }

    fn conflict() -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", "Document update conflict.")
    }
}

impl IntoResponse for CouchFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.error, "reason": self.reason}))).into_response()
    }
}

type Reply = Result<(StatusCode, Json<Value>), CouchFailure>;

#[derive(Debug, Default, Deserialize)]
pub struct AllDocsQuery {
    #[serde(default)]
    pub include_docs: bool,
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub rev: Option<String>,
}

pub fn app() -> Router {
    let couch: Couch = Arc::new(RwLock::new(BTreeMap::new()));
    Router::new()
        .route("/", get(welcome))
        .route("/_all_dbs", get(all_dbs))
        .route("/{db}", get(db_info).put(create_db).post(post_doc))
        .route("/{db}/_all_docs", get(all_docs))
        .route("/{db}/{id}", get(get_doc).put(put_doc).delete(delete_doc))
        .layer(TraceLayer::new_for_http())
        .with_state(couch)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "couchdb": "Welcome",
        "version": VERSION,
        "uuid": "85fb71bf700c17267fef77535820e371",
        "vendor": {"name": "mock-couchdb"},
    }))
}

async fn all_dbs(State(couch): State<Couch>) -> Json<Vec<String>> {
    Json(couch.read().await.keys().cloned().collect())
}

async fn create_db(State(couch): State<Couch>, Path(db): Path<String>) -> Reply {
    if !is_valid_db_name(&db) {
        return Err(CouchFailure::new(
            StatusCode::BAD_REQUEST,
            "illegal_database_name",
            format!("Name: '{db}'. Only lowercase characters (a-z), digits (0-9), and any of the characters _, $, (, ), +, -, and / are allowed. Must begin with a letter."),
        ));
    }
    let mut couch = couch.write().await;
    if couch.contains_key(&db) {
        return Err(CouchFailure::new(
            StatusCode::PRECONDITION_FAILED,
            "file_exists",
            "The database could not be created, the file already exists.",
        ));
    }
    tracing::debug!(%db, "created database");
    couch.insert(db, StoredDb::default());
    Ok((StatusCode::CREATED, Json(json!({"ok": true}))))
}

async fn db_info(State(couch): State<Couch>, Path(db): Path<String>) -> Reply {
    let couch = couch.read().await;
    let stored = couch.get(&db).ok_or_else(CouchFailure::no_db)?;
    let doc_count = stored.docs.values().filter(|d| !d.deleted).count();
    let doc_del_count = stored.docs.len() - doc_count;
    let external: usize = stored
        .docs
        .values()
        .map(|d| Value::Object(d.body.clone()).to_string().len())
        .sum();
    Ok((
        StatusCode::OK,
        Json(json!({
            "db_name": db,
            "update_seq": format!("{}-mock", stored.update_seq),
            "sizes": {"file": external, "external": external, "active": external},
            "purge_seq": 0,
            "doc_del_count": doc_del_count,
            "doc_count": doc_count,
            "disk_format_version": 8,
            "compact_running": false,
            "instance_start_time": "0",
        })),
    ))
}

async fn all_docs(
    State(couch): State<Couch>,
    Path(db): Path<String>,
    Query(query): Query<AllDocsQuery>,
) -> Reply {
    let couch = couch.read().await;
    let stored = couch.get(&db).ok_or_else(CouchFailure::no_db)?;
    let mut live: Vec<(&String, &StoredDoc)> = stored.docs.iter().filter(|(_, d)| !d.deleted).collect();
    let total_rows = live.len();
    if query.descending {
        live.reverse();
    }

    let rows: Vec<Value> = live
        .into_iter()
        .skip(query.skip)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|(id, doc)| {
            let mut row = json!({"id": id, "key": id, "value": {"rev": doc.rev}});
            if query.include_docs {
                row["doc"] = render(id, doc);
            }
            row
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({"total_rows": total_rows, "offset": query.skip, "rows": rows})),
    ))
}

async fn get_doc(State(couch): State<Couch>, Path((db, id)): Path<(String, String)>) -> Reply {
    let couch = couch.read().await;
    let stored = couch.get(&db).ok_or_else(CouchFailure::no_db)?;
    match stored.docs.get(&id) {
        Some(doc) if doc.deleted => Err(CouchFailure::new(StatusCode::NOT_FOUND, "not_found", "deleted")),
        Some(doc) => Ok((StatusCode::OK, Json(render(&id, doc)))),
        None => Err(CouchFailure::new(StatusCode::NOT_FOUND, "not_found", "missing")),
    }
}

async fn put_doc(
    State(couch): State<Couch>,
    Path((db, id)): Path<(String, String)>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let mut couch = couch.write().await;
    let stored = couch.get_mut(&db).ok_or_else(CouchFailure::no_db)?;
    let rev = store(stored, &id, body)?;
    Ok((StatusCode::CREATED, Json(json!({"ok": true, "id": id, "rev": rev}))))
}

async fn post_doc(
    State(couch): State<Couch>,
    Path(db): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    let mut couch = couch.write().await;
    let stored = couch.get_mut(&db).ok_or_else(CouchFailure::no_db)?;
    let id = match body.get("_id") {
        Some(Value::String(id)) => id.clone(),
        _ => Uuid::new_v4().simple().to_string(),
    };
    let rev = store(stored, &id, body)?;
    Ok((StatusCode::CREATED, Json(json!({"ok": true, "id": id, "rev": rev}))))
}

async fn delete_doc(
    State(couch): State<Couch>,
    Path((db, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Reply {
    let mut couch = couch.write().await;
    let stored = couch.get_mut(&db).ok_or_else(CouchFailure::no_db)?;
    let doc = match stored.docs.get_mut(&id) {
        Some(doc) if doc.deleted => {
            return Err(CouchFailure::new(StatusCode::NOT_FOUND, "not_found", "deleted"));
        }
        Some(doc) => doc,
        None => return Err(CouchFailure::new(StatusCode::NOT_FOUND, "not_found", "missing")),
    };
    if query.rev.as_deref() != Some(doc.rev.as_str()) {
        return Err(CouchFailure::conflict());
    }
    let rev = next_rev(&doc.rev);
    doc.rev = rev.clone();
    doc.body.clear();
    doc.deleted = true;
    stored.update_seq += 1;
    tracing::debug!(%db, %id, %rev, "deleted document");
    Ok((StatusCode::OK, Json(json!({"ok": true, "id": id, "rev": rev}))))
}

/// Write `body` as the next revision of `id`.
///
/// A live document only accepts a write that names its current `_rev`; a
/// missing one rejects any `_rev`. Deleted documents can be recreated.
pub fn store(db: &mut StoredDb, id: &str, mut body: Map<String, Value>) -> Result<String, CouchFailure> {
    let given_rev = match body.remove("_rev") {
        Some(Value::String(rev)) => Some(rev),
        _ => None,
    };
    body.remove("_id");

    let rev = match db.docs.get(id) {
        Some(existing) if !existing.deleted => {
            if given_rev.as_deref() != Some(existing.rev.as_str()) {
                return Err(CouchFailure::conflict());
            }
            next_rev(&existing.rev)
        }
        Some(existing) => next_rev(&existing.rev),
        None if given_rev.is_some() => return Err(CouchFailure::conflict()),
        None => next_rev("0"),
    };

    db.docs.insert(
        id.to_string(),
        StoredDoc {
            rev: rev.clone(),
            body,
            deleted: false,
        },
    );
    db.update_seq += 1;
    tracing::debug!(%id, %rev, "stored document");
    Ok(rev)
}

/// `N-<hash>` becomes `N+1-<fresh hash>`.
pub fn next_rev(rev: &str) -> String {
    let generation: u64 = rev
        .split_once('-')
        .map_or(rev, |(generation, _)| generation)
        .parse()
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

pub fn is_valid_db_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c))
}

fn render(id: &str, doc: &StoredDoc) -> Value {
    let mut out = Map::new();
    out.insert("_id".to_string(), Value::from(id));
    out.insert("_rev".to_string(), Value::from(doc.rev.as_str()));
    out.extend(doc.body.clone());
    Value::Object(out)
}
