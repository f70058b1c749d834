//! Databases indexed by address.
//!
//! The registry owns the default database plus any number of single-layer
//! databases opened on demand. Idle on-demand databases are evicted by
//! [`DatabaseRegistry::evict_idle`]; the default database lives until the
//! registry is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use confd_primitives::Result;
use tokio::time::Instant;

use crate::database::{Database, DatabaseConfig};
use crate::source::BackendRegistry;
use crate::sources::Sources;

/// Default idle time after which an unused database is evicted.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(20 * 60);

/// Tunables for a [`DatabaseRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
	/// Idle time after which a database without listeners is evicted.
	pub idle_threshold: Duration,
	/// Configuration applied to every database.
	pub database: DatabaseConfig,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			idle_threshold: DEFAULT_IDLE_THRESHOLD,
			database: DatabaseConfig::default(),
		}
	}
}

/// The default database and the databases opened by address.
#[derive(Debug)]
pub struct DatabaseRegistry {
	default: Arc<Database>,
	by_address: HashMap<String, Arc<Database>>,
	backends: BackendRegistry,
	config: RegistryConfig,
}

impl DatabaseRegistry {
	/// Creates a registry whose default database uses `default_sources`.
	pub fn new(default_sources: Sources, backends: BackendRegistry, config: RegistryConfig) -> Self {
		let default = Database::new(default_sources, config.database.clone());
		tracing::info!(name = default.persistent_name(), "default database ready");
		Self {
			default,
			by_address: HashMap::new(),
			backends,
			config,
		}
	}

	/// The default database.
	pub fn default_database(&self) -> &Arc<Database> {
		&self.default
	}

	/// Backends used to open databases.
	pub fn backends(&self) -> &BackendRegistry {
		&self.backends
	}

	/// Returns the database for `address`, or the default one for `None`.
	/// Does not open anything.
	pub fn lookup(&self, address: Option<&str>) -> Option<Arc<Database>> {
		match address {
			None => Some(Arc::clone(&self.default)),
			Some(address) => self.by_address.get(address.trim()).cloned(),
		}
	}

	/// Returns the database for `address`, opening a single-layer database
	/// on first use.
	pub fn obtain(&mut self, address: &str) -> Result<Arc<Database>> {
		let address = address.trim();
		if let Some(db) = self.by_address.get(address) {
			return Ok(Arc::clone(db));
		}

		let source = self.backends.open(address)?;
		let db = Database::new(Sources::new(vec![source]), self.config.database.clone());
		tracing::info!(address, "opened database");
		self.by_address.insert(address.to_owned(), Arc::clone(&db));
		Ok(db)
	}

	/// Number of databases opened by address.
	pub fn len(&self) -> usize {
		self.by_address.len()
	}

	/// Returns `true` if only the default database exists.
	pub fn is_empty(&self) -> bool {
		self.by_address.is_empty()
	}

	/// Every database, default first.
	pub fn databases(&self) -> impl Iterator<Item = &Arc<Database>> {
		std::iter::once(&self.default).chain(self.by_address.values())
	}

	/// Evicts on-demand databases with no listeners that have been idle
	/// longer than the threshold, flushing them first. Returns how many
	/// were evicted.
	pub fn evict_idle(&mut self) -> usize {
		let now = Instant::now();
		let threshold = self.config.idle_threshold;
		let idle: Vec<String> = self
			.by_address
			.iter()
			.filter(|(_, db)| {
				db.listener_count() == 0
					&& now.saturating_duration_since(db.last_access()) > threshold
			})
			.map(|(address, _)| address.clone())
			.collect();

		for address in &idle {
			if let Some(db) = self.by_address.remove(address) {
				if let Err(err) = db.close() {
					tracing::error!(address = %address, %err, "failed to flush evicted database");
				}
				tracing::info!(address = %address, "evicted idle database");
			}
		}
		idle.len()
	}

	/// Removes dead subscribers from every database. Returns how many.
	pub fn drop_dead_listeners(&self) -> usize {
		self.databases().map(|db| db.drop_dead_listeners()).sum()
	}

	/// Returns `true` if no on-demand database is open and the default
	/// database has no listeners.
	pub fn no_databases_in_use(&self) -> bool {
		self.by_address.is_empty() && self.default.listener_count() == 0
	}

	/// Flushes every database and drops the on-demand ones. Every database
	/// is flushed even if an earlier one fails; the first error is returned.
	pub fn shutdown_all(&mut self) -> Result<()> {
		let mut first = None;
		for (address, db) in self.by_address.drain() {
			if let Err(err) = db.synchronous_sync() {
				tracing::error!(address = %address, %err, "failed to sync database at shutdown");
				first.get_or_insert(err);
			}
		}
		if let Err(err) = self.default.synchronous_sync() {
			tracing::error!(name = self.default.persistent_name(), %err, "failed to sync default database at shutdown");
			first.get_or_insert(err);
		}
		first.map_or(Ok(()), Err)
	}
}
