//! Synchronous CouchDB client.
//!
//! # Overview
//! `Server::connect` verifies the root endpoint, `Server::use_db` selects a
//! database, and `Database` creates, fetches and lists `Document`s. Every
//! call is one blocking request/response exchange (two for `create`).
//!
//! # Design
//! - `CouchRequests` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`. No I/O happens there.
//! - `Transport` executes the round trip. `UreqTransport` is the default;
//!   `ScriptedTransport` replays canned responses for tests.
//! - `Server` and `Database` share one `Arc<dyn Transport>` and are
//!   immutable once built.
//!
//! ```no_run
//! use couch_core::{NewDocument, Server, ServerConfig};
//!
//! let server = Server::connect(ServerConfig::new("http://localhost:5984"))?;
//! let db = server.use_db("egdb")?;
//! let doc = db.create(NewDocument::new().field("noise", "howl"))?;
//! assert_eq!(db.doc_by_id(&doc.id)?.id, doc.id);
//! # Ok::<(), couch_core::CouchError>(())
//! ```

pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod http;
pub mod requests;
pub mod server;
pub mod transport;
pub mod types;

pub use config::ServerConfig;
pub use database::Database;
pub use document::{Document, NewDocument};
pub use error::{CouchError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use requests::CouchRequests;
pub use server::Server;
pub use transport::{ScriptedTransport, Transport, UreqTransport};
pub use types::{AllDocsOptions, DatabaseInfo, UseDbOptions, Welcome, WriteResult};
