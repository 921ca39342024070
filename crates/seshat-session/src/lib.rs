//! Request-facing session persistence façade.
//!
//! [`SessionCache`] composes the record store and converter chain into the
//! interface a host session manager consumes: `load`, `save`, `remove`,
//! `clear`, and key enumeration. It applies the corrupt-record policy on
//! unreadable records and tracks locally-known session keys in a concurrent
//! set that is rebuilt lazily after a restart.
//!
//! [`SessionStoreBuilder`] wires the whole stack together once — table
//! client, codec, converter chain, cache, and optional reaper — so nothing
//! in the crate relies on process-wide state.

mod builder;
mod cache;
mod config;
mod error;

pub use builder::{SessionEngine, SessionStoreBuilder};
pub use cache::SessionCache;
pub use config::SessionConfig;
pub use error::{Result, SessionError};
