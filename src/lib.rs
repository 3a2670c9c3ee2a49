//! Client for a poker tracker's named-pipe API.
//!
//! One outbound pipe carries the application's calls; a pool of inbound
//! pipes, each behind its own listener thread, carries tracker-initiated
//! events and the deferred results of earlier calls, which are correlated
//! back to their callers and streamed into application callbacks.

pub mod adapter;
pub mod blob;
pub mod error;
pub mod logging;
pub mod profile;
pub mod stream;
pub mod transport;
pub mod types;
pub mod wire;

mod connection;
mod inbound;
mod pending;
mod requests;
mod session;

pub use adapter::TrackerAdapter;
pub use error::{AdapterError, Result};
pub use profile::Profile;
pub use stream::RowStream;
pub use types::{HandFormat, TableType, Tracker};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
