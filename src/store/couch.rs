//! CouchDB session store compatible with connect-couchdb
//!
//! Sessions are stored one document per session id, key format `"c" + sid`,
//! body in the express-session JSON shape. CouchDB's optimistic concurrency
//! control (revision tokens) replaces locking: writes that lose a race get a
//! conflict and are retried with a refreshed revision, up to a ceiling.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::SessionStore;
use crate::config::CouchConfig;
use crate::couch::{DocumentDatabase, HttpDatabase, SessionDocument};
use crate::error::SessionError;
use crate::session::SessionData;

/// Document ids starting with an underscore are reserved by CouchDB, so
/// session keys carry this prefix.
const DOC_ID_PREFIX: &str = "c";

/// How many conflict retries a single write may consume before the
/// conflict is surfaced to the caller.
const MAX_SET_RETRIES: u32 = 3;

/// Map a session id to its storage document id
///
/// Pure and deterministic; distinct sids yield distinct ids.
fn doc_id(sid: &str) -> String {
    format!("{}{}", DOC_ID_PREFIX, sid)
}

/// CouchDB session store
///
/// The database connection is provisioned lazily on first use: the server is
/// contacted, the configured database is created if absent, and the resulting
/// handle (or the failure) is cached for the lifetime of the store. Exactly
/// one provisioning sequence runs no matter how many operations race on
/// first use.
///
/// # Example
///
/// ```rust,ignore
/// use couch_session_store::{CouchConfig, CouchSessionStore, SessionStore};
///
/// let config = CouchConfig::new().with_database("sessions");
/// let store = CouchSessionStore::new(config);
/// store.set("abc", &session).await?;
/// ```
pub struct CouchSessionStore<D: DocumentDatabase = HttpDatabase> {
    config: CouchConfig,
    database: OnceCell<Result<Arc<D>, SessionError>>,
}

impl CouchSessionStore<HttpDatabase> {
    /// Create a store over the CouchDB HTTP API
    pub fn new(config: CouchConfig) -> Self {
        Self::with_config(config)
    }
}

impl<D: DocumentDatabase> CouchSessionStore<D> {
    /// Create a store over a custom database backend, provisioned lazily
    pub fn with_config(config: CouchConfig) -> Self {
        Self {
            config,
            database: OnceCell::new(),
        }
    }

    /// Create a store over an already-provisioned database handle
    pub fn with_database(database: D) -> Self {
        Self {
            config: CouchConfig::new(),
            database: OnceCell::new_with(Some(Ok(Arc::new(database)))),
        }
    }

    /// Resolve the database handle, provisioning on first use
    ///
    /// The outcome is cached either way: a provisioning failure is handed to
    /// every subsequent caller without re-running the sequence.
    async fn database(&self) -> Result<Arc<D>, SessionError> {
        self.database
            .get_or_init(|| async {
                tracing::debug!(database = %self.config.database, "provisioning session database");
                D::connect(&self.config).await.map(Arc::new)
            })
            .await
            .clone()
    }

    /// Insert or overwrite a session document, retrying revision conflicts
    ///
    /// On a conflict the current document is re-fetched for its latest
    /// revision and the write is re-issued. The retry count is local to this
    /// write, so concurrent writes on the same store never eat into each
    /// other's budget.
    async fn put_with_retry(&self, db: &D, mut doc: SessionDocument) -> Result<(), SessionError> {
        let mut retries = 0u32;
        loop {
            match db.put(&doc).await {
                Ok(_rev) => return Ok(()),
                Err(SessionError::Conflict(_)) if retries < MAX_SET_RETRIES => {
                    retries += 1;
                    tracing::debug!(id = %doc.id, retries, "revision conflict, refetching latest revision");
                    match db.get(&doc.id).await {
                        Ok(current) => doc.rev = current.rev,
                        // Deleted out from under us; retry as a fresh insert.
                        Err(SessionError::NotFound(_)) => doc.rev = None,
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<D: DocumentDatabase> SessionStore for CouchSessionStore<D> {
    /// Fetch a session, treating "no session" and "fetch failed" identically
    ///
    /// The middleware must never crash on a failed lookup, so any fetch error
    /// yields `Ok(None)`; not-found and failure are logged distinguishably.
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError> {
        let db = self.database().await?;
        let id = doc_id(sid);

        match db.get(&id).await {
            Ok(doc) => {
                if doc.session.cookie.is_expired() {
                    tracing::debug!(%sid, "stored session is expired");
                    return Ok(None);
                }
                Ok(Some(doc.session))
            }
            Err(SessionError::NotFound(_)) => {
                tracing::debug!(%sid, "session not found");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(%sid, error = %err, "session fetch failed, treating as missing");
                Ok(None)
            }
        }
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        let db = self.database().await?;
        let doc = SessionDocument::new(doc_id(sid), session.clone());
        self.put_with_retry(&db, doc).await
    }

    async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        let db = self.database().await?;
        let id = doc_id(sid);

        let rev = match db.get(&id).await {
            Ok(doc) => doc.rev,
            Err(err) => {
                tracing::debug!(%sid, error = %err, "destroy could not read current revision");
                None
            }
        };

        // Without a revision the delete is expected to fail; that error
        // belongs to the caller unchanged.
        db.delete(&id, rev.as_deref()).await
    }

    /// Slide the session's cookie expiry forward and persist it
    ///
    /// The document id is derived from `sid`, never trusted from the payload.
    /// `expires` is recomputed as now + `maxAge` only when both are present
    /// on the incoming cookie; otherwise it is written as given.
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        let db = self.database().await?;

        let mut session = session.clone();
        session.cookie.touch();

        let doc = SessionDocument::new(doc_id(sid), session);
        self.put_with_retry(&db, doc).await
    }

    /// Delete every session in one bulk batch
    ///
    /// Per-document failures are reported only in aggregate.
    async fn clear(&self) -> Result<(), SessionError> {
        let db = self.database().await?;

        let docs: Vec<SessionDocument> = db
            .all_docs(true)
            .await?
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|mut doc| {
                doc.deleted = true;
                doc
            })
            .collect();

        if docs.is_empty() {
            return Ok(());
        }

        let total = docs.len();
        let statuses = db.bulk_docs(docs).await?;
        let failed = statuses.iter().filter(|status| status.failed()).count();

        if failed > 0 {
            tracing::warn!(failed, total, "bulk session delete partially failed");
            return Err(SessionError::BulkPartial { failed, total });
        }

        Ok(())
    }

    async fn length(&self) -> Result<usize, SessionError> {
        let db = self.database().await?;
        db.count().await
    }

    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        let db = self.database().await?;
        Ok(db
            .all_docs(false)
            .await?
            .into_iter()
            .map(|row| {
                row.id
                    .strip_prefix(DOC_ID_PREFIX)
                    .unwrap_or(&row.id)
                    .to_string()
            })
            .collect())
    }

    /// Every session body, in storage-native listing order
    async fn all(&self) -> Result<Vec<SessionData>, SessionError> {
        let db = self.database().await?;
        Ok(db
            .all_docs(true)
            .await?
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| doc.session)
            .collect())
    }
}
