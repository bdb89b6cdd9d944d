//! Error types at the transport seam.

use std::fmt;

/// Failure talking to an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key or bucket does not exist.
    NotFound(String),
    /// Credentials rejected or object not readable.
    AccessDenied(String),
    /// Connection, DNS or timeout failure.
    Transport(String),
    /// Any other error reported by the service.
    Service(String),
    /// Local filesystem failure while streaming to or from disk.
    Io(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "not found: {}", what),
            StoreError::AccessDenied(what) => write!(f, "access denied: {}", what),
            StoreError::Transport(msg) => write!(f, "transport error: {}", msg),
            StoreError::Service(msg) => write!(f, "service error: {}", msg),
            StoreError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Failure of an anonymous HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Non-2xx response.
    Status(u16),
    Transport(String),
    Io(String),
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status(404))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Status(code) => write!(f, "HTTP status {}", code),
            HttpError::Transport(msg) => write!(f, "HTTP transport error: {}", msg),
            HttpError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        HttpError::Io(e.to_string())
    }
}
