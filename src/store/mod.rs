//! Session storage backends

mod couch;
mod traits;

pub use couch::CouchSessionStore;
pub use traits::SessionStore;
