use std::sync::Arc;
use thiserror::Error;

use crate::dns::ParseError;

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid upstream server: {0}")]
    InvalidUpstreamServer(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid buffer size: {0}")]
    InvalidBufferSize(String),

    #[error("Invalid concurrency limit: {0}")]
    InvalidConcurrency(String),

    #[error("Configuration file error: {0}")]
    File(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Failures of the key-value cache collaborator.
///
/// A plain miss is not an error; lookups return `Ok(None)` for that.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed cached row for {key}: {reason}")]
    MalformedRow { key: String, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Failures of the upstream resolver collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Upstream query timed out")]
    Timeout,

    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    #[error("Upstream returned no usable records")]
    NoRecords,

    #[error("Upstream server failure (rcode {0})")]
    ServerFailure(u8),

    #[error("No upstream servers configured")]
    NoServers,
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io(err.to_string())
    }
}

impl From<ParseError> for ResolveError {
    fn from(err: ParseError) -> Self {
        ResolveError::Malformed(err.to_string())
    }
}

/// Crate-wide error for setup and lifecycle failures.
#[derive(Error, Debug, Clone)]
pub enum BoundError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<std::io::Error> for BoundError {
    fn from(err: std::io::Error) -> Self {
        BoundError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BoundError>;
