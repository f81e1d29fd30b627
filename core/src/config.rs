//! Connection settings for `Server::connect`.

use std::time::Duration;

use crate::error::{CouchError, Result};

pub const DEFAULT_URL: &str = "http://localhost:5984";

/// Where the server lives and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub base_url: String,
    /// Whole-request timeout for the default transport. `None` keeps the
    /// HTTP client's own default.
    pub timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `COUCHDB_URL` and `COUCHDB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("COUCHDB_URL").filter(|url| !url.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(secs) = lookup("COUCHDB_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                CouchError::InvalidArgument(format!("COUCHDB_TIMEOUT_SECS is not a number of seconds: {secs:?}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}
