//! Layered configuration storage for confd.
//!
//! A [`Source`] is one backing layer opened from an address. A [`Sources`]
//! stack resolves keys across layers in priority order. A [`Database`] wraps a
//! stack with change subscribers and debounced persistence, and the
//! [`DatabaseRegistry`] maps addresses to databases.

#![warn(missing_docs)]

pub mod database;
pub mod listeners;
pub mod locale_cache;
pub mod memory;
pub mod registry;
pub mod source;
pub mod sources;
#[cfg(test)]
mod testing;

pub use database::sync::SyncState;
pub use database::{Database, DatabaseConfig};
pub use listeners::{Change, ChannelSubscriber, ConnectionId, Disconnected, Subscriber};
pub use locale_cache::LocaleCache;
pub use memory::MemoryBackend;
pub use registry::{DatabaseRegistry, RegistryConfig};
pub use source::{Address, Backend, BackendRegistry, Source, SourceFlags, StoredValue};
pub use sources::{Entry, QueryResult, Sources, UnsetFlags};
