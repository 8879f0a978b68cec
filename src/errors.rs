//! Error taxonomy for a collection run.
//!
//! Every failure below the configuration layer is recorded in the run report
//! at the narrowest scope it applies to; none of them aborts the run.

use serde::Serialize;
use thiserror::Error;

/// Errors produced while loading configuration or collecting from hosts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    /// Malformed or missing configuration. Fatal before any host is touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// A session to the host could not be opened.
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    /// A share, search root or directory could not be enumerated.
    #[error("failed to list {share}:/{path}: {reason}")]
    List {
        share: String,
        path: String,
        reason: String,
    },

    /// One file could not be read from the host or written locally.
    #[error("failed to fetch {share}:/{path}: {reason}")]
    Fetch {
        share: String,
        path: String,
        reason: String,
    },

    /// A remote path would escape the destination root.
    #[error("rejected path {path:?}: {reason}")]
    PathTraversal { path: String, reason: String },

    /// A search-root template cannot be resolved.
    #[error("invalid search-root template {template:?} for user {user}")]
    InvalidTemplate { template: String, user: String },
}

/// Machine-readable kind of a [`CollectError`], as written to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Connect,
    List,
    Fetch,
    PathTraversal,
    InvalidTemplate,
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Config(_) => ErrorKind::Config,
            CollectError::Connect { .. } => ErrorKind::Connect,
            CollectError::List { .. } => ErrorKind::List,
            CollectError::Fetch { .. } => ErrorKind::Fetch,
            CollectError::PathTraversal { .. } => ErrorKind::PathTraversal,
            CollectError::InvalidTemplate { .. } => ErrorKind::InvalidTemplate,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Connect => "connect",
            ErrorKind::List => "list",
            ErrorKind::Fetch => "fetch",
            ErrorKind::PathTraversal => "path_traversal",
            ErrorKind::InvalidTemplate => "invalid_template",
        };
        f.write_str(name)
    }
}
