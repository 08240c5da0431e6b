//! CouchDB wire contract
//!
//! The store consumes the database through the [`DocumentDatabase`] trait so
//! the conflict-retry and provisioning logic stays testable without a live
//! server. [`HttpDatabase`] is the real implementation over the CouchDB
//! HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CouchConfig;
use crate::error::SessionError;
use crate::session::SessionData;

pub mod http;
pub use http::HttpDatabase;

/// A session as stored in CouchDB
///
/// The payload is flattened next to the `_id`/`_rev` bookkeeping fields, so
/// the document body on the wire matches what connect-couchdb writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Storage key (`"c"` + session id)
    #[serde(rename = "_id")]
    pub id: String,

    /// Opaque revision token; changes on every successful write and must
    /// accompany every update or delete
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Deletion marker, serialized only when set (used by bulk deletes)
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// The session payload
    #[serde(flatten)]
    pub session: SessionData,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SessionDocument {
    /// Create a document for a fresh write (no revision yet)
    pub fn new<S: Into<String>>(id: S, session: SessionData) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            session,
        }
    }
}

/// One row of a document listing
#[derive(Debug, Clone, Deserialize)]
pub struct DocRow {
    /// Document id
    pub id: String,
    /// Current revision
    pub rev: String,
    /// Document body, present when bodies were requested
    pub doc: Option<SessionDocument>,
}

/// Per-document outcome of a bulk submission
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDocStatus {
    /// Document id
    pub id: String,
    /// New revision on success
    pub rev: Option<String>,
    /// Error name on failure (e.g. "conflict")
    pub error: Option<String>,
    /// Human-readable failure reason
    pub reason: Option<String>,
}

impl BulkDocStatus {
    /// Whether the server rejected this document
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Wire contract consumed by the session store
///
/// `connect` performs the one-time provisioning sequence: reach the server
/// and ensure the configured database exists, creating it when absent. The
/// remaining methods operate on the resolved database handle.
#[async_trait]
pub trait DocumentDatabase: Sized + Send + Sync + 'static {
    /// Connect to the server and ensure the session database exists
    async fn connect(config: &CouchConfig) -> Result<Self, SessionError>;

    /// Fetch a document by id
    async fn get(&self, id: &str) -> Result<SessionDocument, SessionError>;

    /// Insert or overwrite a document, returning the new revision
    ///
    /// A revision on the document enables conflict detection; without one
    /// the write only succeeds if the document does not exist yet.
    async fn put(&self, doc: &SessionDocument) -> Result<String, SessionError>;

    /// Delete a document by id and revision
    async fn delete(&self, id: &str, rev: Option<&str>) -> Result<(), SessionError>;

    /// List all documents, optionally with bodies
    async fn all_docs(&self, include_docs: bool) -> Result<Vec<DocRow>, SessionError>;

    /// Submit a batch of document mutations
    async fn bulk_docs(&self, docs: Vec<SessionDocument>) -> Result<Vec<BulkDocStatus>, SessionError>;

    /// Number of documents in the database
    async fn count(&self) -> Result<usize, SessionError>;
}
