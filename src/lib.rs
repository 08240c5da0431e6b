//! # couch-session-store
//!
//! Express-session compatible session store backed by Apache CouchDB, with
//! the same storage layout as the Node.js connect-couchdb package: one
//! document per session, key format `"c" + session_id`, body in the
//! express-session JSON shape.
//!
//! ## Features
//!
//! - **Lazy, idempotent provisioning**: the session database is created on
//!   first use, exactly once per store instance, however many operations
//!   race on startup
//! - **Optimistic concurrency**: writes losing a revision race are retried
//!   with a refreshed revision token, up to three times per write
//! - **Express-session compatible documents**: `cookie` with
//!   `expires`/`maxAge` plus flattened payload fields
//! - **Pluggable wire backend**: the store talks to CouchDB through the
//!   [`couch::DocumentDatabase`] trait, so it can be exercised without a
//!   live server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use couch_session_store::{CouchConfig, CouchSessionStore, SessionData, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), couch_session_store::SessionError> {
//!     let config = CouchConfig::new()
//!         .with_hostname("localhost")
//!         .with_port(5984)
//!         .with_database("sessions");
//!
//!     let store = CouchSessionStore::new(config);
//!
//!     let mut session = SessionData::new(86400);
//!     session.set("user", 1);
//!
//!     store.set("abc", &session).await?;
//!     let found = store.get("abc").await?;
//!     assert!(found.is_some());
//!
//!     store.destroy("abc").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod couch;
pub mod error;
pub mod session;
pub mod store;

pub use config::CouchConfig;
pub use error::SessionError;
pub use session::{SessionCookie, SessionData};
pub use store::{CouchSessionStore, SessionStore};
