//! The daemon process context.
//!
//! # Mental model
//!
//! - A [`Daemon`] owns the database registry and the locale cache; there is
//!   no process-wide state.
//! - Requests reach a database through [`Daemon::database`], which clones the
//!   database handle out of the registry lock before any work happens.
//! - [`Daemon::run`] drives the maintenance sweep until cancelled, then shuts
//!   down by flushing every database.
//!
//! # Invariants
//!
//! 1. Once shutdown begins, every request MUST fail with `InShutdown`.
//!    - Enforced in: `Daemon::check_running`
//!    - Tested by: `daemon::tests::requests_fail_after_shutdown`
//!    - Failure symptom: writes accepted after the final flush are lost.
//!
//! 2. The registry lock MUST NOT be held while a database operation runs.
//!    - Enforced in: `Daemon::database`
//!    - Tested by: `daemon::tests::subscriber_may_reenter_daemon`
//!    - Failure symptom: a subscriber calling back into the daemon deadlocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use confd_primitives::{Error, LocaleList, Result, Value};
use confd_store::{
	BackendRegistry, ConnectionId, Database, DatabaseRegistry, Entry, LocaleCache, QueryResult,
	Sources, Subscriber, UnsetFlags,
};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::source_path::{self, Variables};

/// Owner of every database in the process.
#[derive(Debug)]
pub struct Daemon {
	registry: Mutex<DatabaseRegistry>,
	locales: Mutex<LocaleCache>,
	in_shutdown: AtomicBool,
	config: DaemonConfig,
}

impl Daemon {
	/// Builds the default database from `config` and the source path file.
	pub fn new(config: DaemonConfig, backends: BackendRegistry, vars: &Variables) -> Self {
		let addresses = source_path::default_addresses(&config, vars);
		let sources = Sources::from_addresses(&addresses, &backends);
		Self::with_sources(config, sources, backends)
	}

	/// Uses `sources` for the default database as-is.
	pub fn with_sources(config: DaemonConfig, sources: Sources, backends: BackendRegistry) -> Self {
		let registry = DatabaseRegistry::new(sources, backends, config.registry_config());
		Self {
			registry: Mutex::new(registry),
			locales: Mutex::new(LocaleCache::new()),
			in_shutdown: AtomicBool::new(false),
			config,
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &DaemonConfig {
		&self.config
	}

	/// Returns `true` once shutdown has begun.
	pub fn in_shutdown(&self) -> bool {
		self.in_shutdown.load(Ordering::Acquire)
	}

	fn check_running(&self) -> Result<()> {
		if self.in_shutdown() {
			return Err(Error::InShutdown);
		}
		Ok(())
	}

	/// Returns the database for `address`, opening it on first use. `None`
	/// selects the default database.
	pub fn database(&self, address: Option<&str>) -> Result<Arc<Database>> {
		self.check_running()?;
		let mut registry = self.registry.lock();
		match address {
			None => Ok(Arc::clone(registry.default_database())),
			Some(address) => registry.obtain(address),
		}
	}

	/// Fallback chain for `locale`; `None` means the C locale.
	pub fn locales(&self, locale: Option<&str>) -> LocaleList {
		match locale {
			Some(locale) if !locale.is_empty() => self.locales.lock().get(locale),
			_ => LocaleList::c(),
		}
	}

	/// Resolves `key` in the selected database.
	pub fn query_value(
		&self,
		address: Option<&str>,
		key: &str,
		locale: Option<&str>,
		use_schema_default: bool,
	) -> Result<QueryResult> {
		let db = self.database(address)?;
		db.query_value(key, &self.locales(locale), use_schema_default)
	}

	/// Returns the schema default for `key` and whether it is writable.
	pub fn query_default_value(
		&self,
		address: Option<&str>,
		key: &str,
		locale: Option<&str>,
	) -> Result<(Option<Value>, bool)> {
		let db = self.database(address)?;
		db.query_default_value(key, &self.locales(locale))
	}

	/// Stores `value` under `key`.
	pub fn set(&self, address: Option<&str>, key: &str, value: Value) -> Result<()> {
		self.database(address)?.set(key, value)
	}

	/// Removes `key` from the first writable layer.
	pub fn unset(&self, address: Option<&str>, key: &str, locale: Option<&str>) -> Result<()> {
		self.database(address)?.unset(key, locale)
	}

	/// Removes `key` and everything below it.
	pub fn recursive_unset(
		&self,
		address: Option<&str>,
		key: &str,
		locale: Option<&str>,
		flags: UnsetFlags,
	) -> Result<()> {
		self.database(address)?.recursive_unset(key, locale, flags)
	}

	/// Returns `true` if `dir` exists in any layer.
	pub fn dir_exists(&self, address: Option<&str>, dir: &str) -> Result<bool> {
		self.database(address)?.dir_exists(dir)
	}

	/// Removes `dir` from every writable layer.
	pub fn remove_dir(&self, address: Option<&str>, dir: &str) -> Result<()> {
		self.database(address)?.remove_dir(dir)
	}

	/// Entries directly inside `dir`.
	pub fn all_entries(
		&self,
		address: Option<&str>,
		dir: &str,
		locale: Option<&str>,
	) -> Result<Vec<Entry>> {
		let db = self.database(address)?;
		db.all_entries(dir, &self.locales(locale))
	}

	/// Subdirectories directly inside `dir`.
	pub fn all_dirs(&self, address: Option<&str>, dir: &str) -> Result<Vec<String>> {
		self.database(address)?.all_dirs(dir)
	}

	/// Associates `key` with `schema_key`, or dissociates it.
	pub fn set_schema(&self, address: Option<&str>, key: &str, schema_key: Option<&str>) -> Result<()> {
		self.database(address)?.set_schema(key, schema_key)
	}

	/// Requests a prompt flush of the selected database.
	pub fn sync(&self, address: Option<&str>) -> Result<()> {
		self.database(address)?.sync();
		Ok(())
	}

	/// Drops cached state of the selected database.
	pub fn clear_cache(&self, address: Option<&str>) -> Result<()> {
		self.database(address)?.clear_cache();
		Ok(())
	}

	/// Subscribes to changes at or below `prefix`.
	pub fn add_listener(
		&self,
		address: Option<&str>,
		prefix: &str,
		subscriber: Arc<dyn Subscriber>,
	) -> Result<ConnectionId> {
		self.database(address)?.add_listener(prefix, subscriber)
	}

	/// Cancels a subscription. Returns `false` for unknown ids.
	pub fn remove_listener(&self, address: Option<&str>, id: ConnectionId) -> Result<bool> {
		Ok(self.database(address)?.remove_listener(id))
	}

	/// One maintenance sweep. Returns `true` if the daemon is unused.
	pub fn periodic_cleanup(&self) -> bool {
		let (dead, evicted, unused) = {
			let mut registry = self.registry.lock();
			let dead = registry.drop_dead_listeners();
			let evicted = registry.evict_idle();
			(dead, evicted, registry.no_databases_in_use())
		};
		let expired = self.locales.lock().expire(self.config.locale_max_age());
		tracing::debug!(dead, evicted, expired, unused, "periodic cleanup");
		unused
	}

	/// Enters shutdown and flushes every database. Later calls do nothing.
	pub fn shutdown(&self) -> Result<()> {
		if self.in_shutdown.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		tracing::info!("shutting down, flushing databases");
		self.registry.lock().shutdown_all()
	}

	/// Runs maintenance until `shutdown` is cancelled, or until the daemon
	/// is unused when `exit_when_unused` is set, then shuts down.
	pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
		let mut ticker = tokio::time::interval(self.config.cleanup_interval());
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		ticker.tick().await;

		loop {
			tokio::select! {
				_ = shutdown.cancelled() => {
					tracing::info!("shutdown requested");
					break;
				}
				_ = ticker.tick() => {
					if self.periodic_cleanup() && self.config.exit_when_unused {
						tracing::info!("no databases in use, exiting");
						break;
					}
				}
			}
		}
		self.shutdown()
	}
}
