//! CouchDB HTTP API client
//!
//! Implements [`DocumentDatabase`] over the plain CouchDB REST endpoints:
//! `_all_dbs`, `PUT /{db}`, `GET|PUT|DELETE /{db}/{id}`, `_all_docs` and
//! `_bulk_docs`. No timeouts or retries beyond what reqwest provides.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{BulkDocStatus, DocRow, DocumentDatabase, SessionDocument};
use crate::config::CouchConfig;
use crate::error::SessionError;

/// Server-level client used during provisioning
struct CouchClient {
    http: reqwest::Client,
    base_url: String,
}

impl CouchClient {
    fn new(config: &CouchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.server_url(),
        }
    }

    /// List the names of all databases on the server
    async fn list_databases(&self) -> Result<Vec<String>, SessionError> {
        let url = format!("{}/_all_dbs", self.base_url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(connection_refused(status));
        }

        Ok(response.json().await?)
    }

    /// Create a database; a concurrent creator winning the race is fine
    async fn create_database(&self, name: &str) -> Result<(), SessionError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(name));
        let response = self.http.put(&url).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SessionError::Provisioning(format!(
            "creating database {} failed with status {}: {}",
            name, status, body
        )))
    }
}

/// A handle bound to one CouchDB database
pub struct HttpDatabase {
    client: CouchClient,
    name: String,
}

impl HttpDatabase {
    fn db_url(&self) -> String {
        format!(
            "{}/{}",
            self.client.base_url,
            urlencoding::encode(&self.name)
        )
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.db_url(), urlencoding::encode(id))
    }
}

#[derive(Deserialize)]
struct PutResponse {
    rev: String,
}

#[derive(Deserialize)]
struct AllDocsResponse {
    rows: Vec<RawRow>,
}

#[derive(Deserialize)]
struct RawRow {
    id: String,
    value: RowValue,
    doc: Option<SessionDocument>,
}

#[derive(Deserialize)]
struct RowValue {
    rev: String,
}

/// Drop CouchDB-internal rows (`_design/` and friends) from a listing;
/// only the remainder are sessions
fn session_rows(rows: Vec<RawRow>) -> Vec<DocRow> {
    rows.into_iter()
        .filter(|row| !row.id.starts_with('_'))
        .map(|row| DocRow {
            id: row.id,
            rev: row.value.rev,
            doc: row.doc,
        })
        .collect()
}

#[async_trait]
impl DocumentDatabase for HttpDatabase {
    async fn connect(config: &CouchConfig) -> Result<Self, SessionError> {
        let client = CouchClient::new(config);

        let existing = client.list_databases().await?;
        if !existing.iter().any(|name| name == &config.database) {
            tracing::debug!(database = %config.database, "session database absent, creating");
            client.create_database(&config.database).await?;
        }

        Ok(Self {
            client,
            name: config.database.clone(),
        })
    }

    async fn get(&self, id: &str) -> Result<SessionDocument, SessionError> {
        let response = self.client.http.get(self.doc_url(id)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, id));
        }

        Ok(response.json().await?)
    }

    async fn put(&self, doc: &SessionDocument) -> Result<String, SessionError> {
        let response = self
            .client
            .http
            .put(self.doc_url(&doc.id))
            .json(doc)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &doc.id));
        }

        let put: PutResponse = response.json().await?;
        Ok(put.rev)
    }

    async fn delete(&self, id: &str, rev: Option<&str>) -> Result<(), SessionError> {
        let mut request = self.client.http.delete(self.doc_url(id));
        if let Some(rev) = rev {
            request = request.query(&[("rev", rev)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, id));
        }

        Ok(())
    }

    async fn all_docs(&self, include_docs: bool) -> Result<Vec<DocRow>, SessionError> {
        let url = format!("{}/_all_docs", self.db_url());
        let response = self
            .client
            .http
            .get(&url)
            .query(&[("include_docs", include_docs)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "_all_docs"));
        }

        let listing: AllDocsResponse = response.json().await?;
        Ok(session_rows(listing.rows))
    }

    async fn bulk_docs(
        &self,
        docs: Vec<SessionDocument>,
    ) -> Result<Vec<BulkDocStatus>, SessionError> {
        let url = format!("{}/_bulk_docs", self.db_url());
        let body = serde_json::json!({ "docs": docs });

        let response = self.client.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "_bulk_docs"));
        }

        Ok(response.json().await?)
    }

    /// Counted from the same filtered `_all_docs` listing the other
    /// operations see, so `clear` followed by `count` reads zero even when
    /// the database holds internal documents.
    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.all_docs(false).await?.len())
    }
}

fn connection_refused(status: StatusCode) -> SessionError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SessionError::Connection(format!("credentials rejected (status {})", status.as_u16()))
    } else {
        SessionError::Connection(format!("server returned status {}", status.as_u16()))
    }
}

fn status_error(status: StatusCode, id: &str) -> SessionError {
    match status {
        StatusCode::NOT_FOUND => SessionError::NotFound(id.to_string()),
        StatusCode::CONFLICT => SessionError::Conflict(id.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => connection_refused(status),
        _ => SessionError::Store(format!(
            "unexpected status {} for {}",
            status.as_u16(),
            id
        )),
    }
}
