//! Error types for the CouchDB client.
//!
//! # Design
//! The variants follow what callers branch on: an unreachable server, a
//! missing database, a missing document and a revision conflict each get a
//! dedicated variant. Network failures are wrapped in `Transport`; any other
//! unexpected status lands in `Http` with the CouchDB `error`/`reason` pair
//! when the body carried one.

use thiserror::Error;

/// A failure raised by a `Transport` before a response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors returned by `Server`, `Database` and the `CouchRequests` parsers.
#[derive(Debug, Error)]
pub enum CouchError {
    /// The root endpoint could not be reached or did not answer with the
    /// welcome payload.
    #[error("cannot connect to CouchDB{}: {message}", status_suffix(.status))]
    Connection { status: Option<u16>, message: String },

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The server rejected a write because the revision is stale or the id
    /// is already taken.
    #[error("document update conflict{}: {reason}", id_suffix(.id))]
    Conflict { id: Option<String>, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Any other non-success status.
    #[error("HTTP {status}: {error}: {reason}")]
    Http {
        status: u16,
        error: String,
        reason: String,
    },

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CouchError {
    /// True for network failures and unexpected HTTP statuses.
    pub fn is_transport(&self) -> bool {
        matches!(self, CouchError::Transport(_) | CouchError::Http { .. })
    }

    /// The HTTP status behind this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            CouchError::Connection { status, .. } => *status,
            CouchError::DatabaseNotFound(_) | CouchError::DocumentNotFound(_) => Some(404),
            CouchError::Conflict { .. } => Some(409),
            CouchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_deref().map(|id| format!(" on {id}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CouchError>;
