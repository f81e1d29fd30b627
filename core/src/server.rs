//! Entry point: a verified connection to one CouchDB server.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::database::Database;
use crate::error::{CouchError, Result};
use crate::requests::CouchRequests;
use crate::transport::{round_trip, Transport, UreqTransport};
use crate::types::{DatabaseInfo, UseDbOptions, Welcome};

/// A CouchDB server that answered its root endpoint.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct Server {
    requests: CouchRequests,
    client: Arc<dyn Transport>,
    welcome: Welcome,
}

impl Server {
    /// Connect with the default blocking HTTP transport.
    pub fn connect(config: ServerConfig) -> Result<Self> {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Connect through a caller-supplied transport.
    ///
    /// Issues `GET /` once; any failure to get the welcome payload back is
    /// a `CouchError::Connection`.
    pub fn with_transport(config: ServerConfig, client: Arc<dyn Transport>) -> Result<Self> {
        let requests = CouchRequests::new(&config.base_url);
        let welcome = round_trip(client.as_ref(), requests.build_welcome())
            .map_err(|e| match e {
                CouchError::Transport(e) => CouchError::Connection {
                    status: None,
                    message: e.0,
                },
                other => other,
            })
            .and_then(|response| requests.parse_welcome(response))
            .inspect_err(|e| warn!(url = %requests.base_url(), error = %e, "couchdb connection failed"))?;

        info!(
            url = %requests.base_url(),
            version = welcome.version.as_deref().unwrap_or("unknown"),
            "connected to couchdb"
        );
        Ok(Self {
            requests,
            client,
            welcome,
        })
    }

    pub fn base_url(&self) -> &str {
        self.requests.base_url()
    }

    pub fn client(&self) -> &Arc<dyn Transport> {
        &self.client
    }

    /// The payload the root endpoint answered with at connect time.
    pub fn welcome(&self) -> &Welcome {
        &self.welcome
    }

    pub fn version(&self) -> Option<&str> {
        self.welcome.version.as_deref()
    }

    /// Names of every database on the server.
    pub fn all_dbs(&self) -> Result<Vec<String>> {
        let response = round_trip(self.client.as_ref(), self.requests.build_all_dbs())?;
        self.requests.parse_all_dbs(response)
    }

    /// Select an existing database.
    pub fn use_db(&self, name: &str) -> Result<Database> {
        self.use_db_with(UseDbOptions::new(name))
    }

    /// Select a database, optionally creating it first when it is missing.
    pub fn use_db_with(&self, options: UseDbOptions) -> Result<Database> {
        let UseDbOptions { name, create_if_missing } = options;
        if name.is_empty() {
            return Err(CouchError::InvalidArgument("database name must not be empty".to_string()));
        }

        match self.db_info(&name) {
            Err(CouchError::DatabaseNotFound(_)) if create_if_missing => {
                let response = round_trip(self.client.as_ref(), self.requests.build_create_db(&name))?;
                if self.requests.parse_create_db(response)? {
                    info!(db = %name, "created database");
                }
                let info = self.db_info(&name)?;
                Ok(Database::new(name, self.requests.clone(), Arc::clone(&self.client), info))
            }
            result => {
                let info = result?;
                Ok(Database::new(name, self.requests.clone(), Arc::clone(&self.client), info))
            }
        }
    }

    fn db_info(&self, name: &str) -> Result<DatabaseInfo> {
        let response = round_trip(self.client.as_ref(), self.requests.build_db_info(name))?;
        self.requests.parse_db_info(name, response)
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("base_url", &self.requests.base_url())
            .field("welcome", &self.welcome)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::transport::ScriptedTransport;

    const WELCOME: &str = r#"{"couchdb":"Welcome","uuid":"fce3d5aabfe189c988273c0ffa8d375b","version":"1.6.0","vendor":{"name":"Ubuntu","version":"15.10"}}"#;
    const EGDB: &str = r#"{"db_name":"egdb","doc_count":0,"doc_del_count":0}"#;

    fn connect(transport: &Arc<ScriptedTransport>) -> Result<Server> {
        Server::with_transport(ServerConfig::new("http://couch:5984"), transport.clone())
    }

    #[test]
    fn connect_stores_welcome() {
        let transport = Arc::new(ScriptedTransport::new().with_response(200, WELCOME));
        let server = connect(&transport).unwrap();
        assert_eq!(server.version(), Some("1.6.0"));
        assert_eq!(server.welcome().couchdb, "Welcome");
        assert_eq!(server.base_url(), "http://couch:5984");
        assert_eq!(transport.requests()[0].url, "http://couch:5984/");
    }

    #[test]
    fn connect_transport_failure_is_connection_error() {
        let transport = Arc::new(ScriptedTransport::new().with_failure("connection refused"));
        let err = connect(&transport).unwrap_err();
        assert!(matches!(err, CouchError::Connection { status: None, ref message } if message == "connection refused"));
    }

    #[test]
    fn use_db_rejects_empty_name_without_io() {
        let transport = Arc::new(ScriptedTransport::new().with_response(200, WELCOME));
        let server = connect(&transport).unwrap();
        let err = server.use_db("").unwrap_err();
        assert!(matches!(err, CouchError::InvalidArgument(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn use_db_with_creates_missing_database() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_response(200, WELCOME)
                .with_response(404, r#"{"error":"not_found","reason":"Database does not exist."}"#)
                .with_response(201, r#"{"ok":true}"#)
                .with_response(200, EGDB),
        );
        let server = connect(&transport).unwrap();
        let db = server
            .use_db_with(UseDbOptions::new("egdb").create_if_missing(true))
            .unwrap();
        assert_eq!(db.name(), "egdb");

        let methods: Vec<_> = transport.requests().iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![HttpMethod::Get, HttpMethod::Get, HttpMethod::Put, HttpMethod::Get]
        );
    }

    #[test]
    fn use_db_with_tolerates_concurrent_create() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_response(200, WELCOME)
                .with_response(404, r#"{"error":"not_found","reason":"Database does not exist."}"#)
                .with_response(412, r#"{"error":"file_exists","reason":"The database could not be created, the file already exists."}"#)
                .with_response(200, EGDB),
        );
        let server = connect(&transport).unwrap();
        let db = server
            .use_db_with(UseDbOptions::new("egdb").create_if_missing(true))
            .unwrap();
        assert_eq!(db.name(), "egdb");
        assert_eq!(db.info().doc_count, Some(0));
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn use_db_create_failure_is_reported() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_response(200, WELCOME)
                .with_response(404, r#"{"error":"not_found","reason":"Database does not exist."}"#)
                .with_failure("connection reset"),
        );
        let server = connect(&transport).unwrap();
        let err = server
            .use_db_with(UseDbOptions::new("egdb").create_if_missing(true))
            .unwrap_err();
        assert!(matches!(err, CouchError::Transport(_)));
    }

    #[test]
    fn use_db_without_create_reports_missing() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_response(200, WELCOME)
                .with_response(404, r#"{"error":"not_found","reason":"Database does not exist."}"#),
        );
        let server = connect(&transport).unwrap();
        let err = server.use_db("nope").unwrap_err();
        assert!(matches!(err, CouchError::DatabaseNotFound(ref name) if name == "nope"));
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn all_dbs_lists_names() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_response(200, WELCOME)
                .with_response(200, r#"["_replicator","_users","egdb"]"#),
        );
        let server = connect(&transport).unwrap();
        assert_eq!(server.all_dbs().unwrap(), vec!["_replicator", "_users", "egdb"]);
        assert_eq!(transport.requests()[1].url, "http://couch:5984/_all_dbs");
    }
}
