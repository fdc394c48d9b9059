use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Pass cancelled after {completed} invocation(s)")]
    Cancelled { completed: usize },
}

/// Failures reported by capability handlers. Each one surfaces in the
/// transcript as a `HandlerError`.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("path denied: {0}")]
    PathDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown sandbox target '{0}'")]
    UnknownTarget(String),
    #[error("timed out after {0} ms")]
    TimedOut(u64),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl CapabilityError {
    /// Maps an I/O error on `path` to the most specific variant.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CapabilityError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => CapabilityError::AlreadyExists(path.to_string()),
            io::ErrorKind::PermissionDenied => CapabilityError::PathDenied(path.to_string()),
            _ => CapabilityError::Io(err),
        }
    }
}
