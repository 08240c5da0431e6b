//! Session error types

use std::fmt;

/// Errors that can occur during session operations
///
/// The enum is `Clone` because the provisioning outcome (success or failure)
/// is cached per store instance and handed to every caller awaiting readiness.
#[derive(Debug, Clone)]
pub enum SessionError {
    /// Server unreachable or credentials rejected
    Connection(String),
    /// Database creation failed after an absence was detected
    Provisioning(String),
    /// Write rejected because the supplied revision no longer matches
    /// the current stored version; holds the document id
    Conflict(String),
    /// Document absent; holds the document id
    NotFound(String),
    /// One or more documents in a bulk batch failed
    BulkPartial {
        /// Number of documents the server rejected
        failed: usize,
        /// Total number of documents submitted
        total: usize,
    },
    /// Error during serialization/deserialization
    Serialization(String),
    /// Any other error reported by the store
    Store(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Connection(msg) => write!(f, "CouchDB connection error: {}", msg),
            SessionError::Provisioning(msg) => write!(f, "Database provisioning error: {}", msg),
            SessionError::Conflict(id) => write!(f, "Revision conflict on document {}", id),
            SessionError::NotFound(id) => write!(f, "Document not found: {}", id),
            SessionError::BulkPartial { failed, total } => {
                write!(f, "Bulk operation failed for {} of {} documents", failed, total)
            }
            SessionError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::Store(msg) => write!(f, "Session store error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        // A malformed body on an otherwise successful response is a
        // serialization problem, not a connection one.
        if err.is_decode() {
            SessionError::Serialization(err.to_string())
        } else {
            SessionError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}
