//! One configuration database: a source stack, its subscribers, and
//! debounced persistence.
//!
//! # Mental model
//!
//! - A [`Database`] exclusively owns one [`Sources`] stack and one
//!   [`Listeners`] registry.
//! - Every operation stamps `last_access`, delegates to the stack, and on a
//!   successful mutation arms a sync and notifies subscribers in the same
//!   call.
//! - Persistence is debounced: mutations arm a delayed sync, an explicit
//!   [`Database::sync`] upgrades it to an immediate one, and both collapse
//!   into a single flush. See [`sync`].
//!
//! # Invariants
//!
//! 1. Locks MUST NOT be held while subscribers run.
//!    - Enforced in: `Database::notify`
//!    - Tested by: `database::tests::subscriber_may_query_during_delivery`
//!    - Failure symptom: a subscriber that reads the database deadlocks the event loop.
//!
//! 2. At most one sync is armed per database; repeated scheduling MUST NOT add flushes.
//!    - Enforced in: `SyncMachine::schedule`, `SyncMachine::nowish`, `Database::fire`
//!    - Tested by: `database::tests::many_mutations_collapse_into_one_flush`
//!    - Failure symptom: every mutation rewrites the backing store.
//!
//! 3. Pending changes MUST be flushed before a database goes away.
//!    - Enforced in: `Database::close`, `Drop for Database`
//!    - Tested by: `database::tests::close_flushes_pending_changes`
//!    - Failure symptom: changes made shortly before eviction or shutdown are lost.
//!
//! 4. Background sync failures are logged, never surfaced to callers.
//!    - Enforced in: `Database::fire`
//!    - Tested by: `database::tests::background_sync_failure_is_only_logged`

pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use confd_primitives::key;
use confd_primitives::{LocaleList, Result, Value};
use parking_lot::Mutex;
use tokio::time::Instant;

use self::sync::{SyncMachine, SyncState};
use crate::listeners::{self, Change, ConnectionId, Listeners, Subscriber};
use crate::sources::{Entry, QueryResult, Sources, UnsetFlags};

/// Default debounce delay between a mutation and its flush.
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_millis(5000);

/// Tunables for a [`Database`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	/// Delay between the first unsynced mutation and the flush.
	pub sync_delay: Duration,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			sync_delay: DEFAULT_SYNC_DELAY,
		}
	}
}

/// A source stack with subscribers and debounced persistence.
#[derive(Debug)]
pub struct Database {
	sources: Mutex<Sources>,
	listeners: Mutex<Listeners>,
	sync: Mutex<SyncMachine>,
	last_access: Mutex<Instant>,
	persistent_name: String,
	config: DatabaseConfig,
}

fn logged<T>(result: Result<T>, what: &str, key: &str) -> Result<T> {
	if let Err(err) = &result {
		tracing::error!(key, %err, "{what} failed");
	}
	result
}

impl Database {
	/// Wraps `sources` in a new database.
	pub fn new(sources: Sources, config: DatabaseConfig) -> Arc<Self> {
		let persistent_name = sources.addresses().next().unwrap_or("empty").to_owned();
		Arc::new(Self {
			sources: Mutex::new(sources),
			listeners: Mutex::new(Listeners::new()),
			sync: Mutex::new(SyncMachine::default()),
			last_access: Mutex::new(Instant::now()),
			persistent_name,
			config,
		})
	}

	/// Address of the highest-priority layer, or `"empty"`.
	pub fn persistent_name(&self) -> &str {
		&self.persistent_name
	}

	/// Time of the most recent operation.
	pub fn last_access(&self) -> Instant {
		*self.last_access.lock()
	}

	fn touch(&self) {
		*self.last_access.lock() = Instant::now();
	}

	/// Current debounce state.
	pub fn sync_state(&self) -> SyncState {
		self.sync.lock().state()
	}

	/// Number of live subscriptions.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	/// Resolves `key`. See [`Sources::query_value`].
	pub fn query_value(
		&self,
		key: &str,
		locales: &[String],
		use_schema_default: bool,
	) -> Result<QueryResult> {
		self.touch();
		let result = self.sources.lock().query_value(key, locales, use_schema_default);
		logged(result, "query", key)
	}

	/// Returns the schema default for `key` and whether it is writable.
	pub fn query_default_value(&self, key: &str, locales: &[String]) -> Result<(Option<Value>, bool)> {
		self.touch();
		let result = self.sources.lock().query_default_value(key, locales);
		logged(result, "default value query", key)
	}

	/// Stores `value` under `key` and notifies subscribers.
	pub fn set(self: &Arc<Self>, key: &str, value: Value) -> Result<()> {
		self.touch();
		let result = self.sources.lock().set_value(key, &value);
		logged(result, "set", key)?;
		self.schedule_sync();
		self.notify(key, Some(value), false, true);
		Ok(())
	}

	/// Removes `key` from the first writable layer and notifies subscribers
	/// with the key's default.
	pub fn unset(self: &Arc<Self>, key: &str, locale: Option<&str>) -> Result<()> {
		self.touch();
		tracing::debug!(key, "unset");
		let result = self.sources.lock().unset_value(key, locale);
		logged(result, "unset", key)?;

		let locales = locale.map(LocaleList::for_locale).unwrap_or_default();
		let (default, is_writable) = self
			.query_default_value(key, &locales)
			.unwrap_or((None, true));
		self.schedule_sync();
		self.notify(key, default, true, is_writable);
		Ok(())
	}

	/// Unsets `key` and everything below it in every writable layer.
	///
	/// The walk continues past failures. Every visited key is re-resolved and
	/// notified; the first error encountered is returned afterwards.
	pub fn recursive_unset(
		self: &Arc<Self>,
		key: &str,
		locale: Option<&str>,
		flags: UnsetFlags,
	) -> Result<()> {
		self.touch();
		tracing::debug!(key, ?flags, "recursive unset");
		let result = self.sources.lock().recursive_unset(key, locale, flags);
		let report = logged(result, "recursive unset", key)?;
		let mut first_error = report.first_error;
		if let Some(err) = &first_error {
			tracing::error!(key, %err, "recursive unset was incomplete");
		}

		let locales = locale.map(LocaleList::for_locale).unwrap_or_default();
		for affected in &report.affected {
			let resolved = self.sources.lock().query_value(affected, &locales, true);
			let resolved = match resolved {
				Ok(resolved) => resolved,
				Err(err) => {
					tracing::error!(key = %affected, %err, "failed to re-resolve unset key");
					first_error.get_or_insert(err);
					QueryResult {
						is_default: true,
						is_writable: true,
						..QueryResult::default()
					}
				}
			};
			self.schedule_sync();
			self.notify(
				affected,
				resolved.value,
				resolved.is_default,
				resolved.is_writable,
			);
		}
		first_error.map_or(Ok(()), Err)
	}

	/// Returns `true` if any layer has `dir`.
	pub fn dir_exists(&self, dir: &str) -> Result<bool> {
		self.touch();
		let result = self.sources.lock().dir_exists(dir);
		logged(result, "dir_exists", dir)
	}

	/// Removes `dir` from every writable layer.
	pub fn remove_dir(self: &Arc<Self>, dir: &str) -> Result<()> {
		self.touch();
		tracing::debug!(dir, "remove dir");
		let result = self.sources.lock().remove_dir(dir);
		logged(result, "remove_dir", dir)?;
		self.schedule_sync();
		Ok(())
	}

	/// Immediate entries of `dir`.
	pub fn all_entries(&self, dir: &str, locales: &[String]) -> Result<Vec<Entry>> {
		self.touch();
		let result = self.sources.lock().all_entries(dir, locales);
		logged(result, "all_entries", dir)
	}

	/// Immediate subdirectories of `dir`.
	pub fn all_dirs(&self, dir: &str) -> Result<Vec<String>> {
		self.touch();
		let result = self.sources.lock().all_dirs(dir);
		logged(result, "all_dirs", dir)
	}

	/// Associates `key` with a schema; `None` or an empty key dissociates.
	pub fn set_schema(self: &Arc<Self>, key: &str, schema_key: Option<&str>) -> Result<()> {
		self.touch();
		let result = self.sources.lock().set_schema(key, schema_key);
		logged(result, "set_schema", key)?;
		self.schedule_sync();
		Ok(())
	}

	/// Asks for a flush as soon as the event loop is idle.
	pub fn sync(self: &Arc<Self>) {
		self.touch();
		tracing::debug!(name = %self.persistent_name, "sync requested");
		self.sync_nowish();
	}

	/// Drops cached state in every layer.
	pub fn clear_cache(&self) {
		self.touch();
		self.sources.lock().clear_cache();
	}

	/// Registers `subscriber` for changes at or below `prefix`.
	pub fn add_listener(&self, prefix: &str, subscriber: Arc<dyn Subscriber>) -> Result<ConnectionId> {
		self.touch();
		key::validate_dir(prefix)?;
		let id = self.listeners.lock().add(prefix, subscriber);
		tracing::debug!(prefix, connection = %id, "added listener");
		Ok(id)
	}

	/// Removes a registration. Returns `false` for unknown ids.
	pub fn remove_listener(&self, id: ConnectionId) -> bool {
		self.touch();
		let removed = self.listeners.lock().remove(id);
		tracing::debug!(connection = %id, removed, "removed listener");
		removed
	}

	/// Removes registrations whose subscriber is no longer alive.
	pub fn drop_dead_listeners(&self) -> usize {
		self.listeners.lock().drop_dead(|s| !s.is_alive())
	}

	fn notify(&self, key: &str, value: Option<Value>, is_default: bool, is_writable: bool) {
		let targets = self.listeners.lock().matching(key);
		if targets.is_empty() {
			return;
		}
		let change = Arc::new(Change {
			key: key.to_owned(),
			value,
			is_default,
			is_writable,
		});
		let (_, failed) = listeners::deliver(&targets, &change);
		if !failed.is_empty() {
			let mut registry = self.listeners.lock();
			for id in failed {
				registry.remove(id);
			}
		}
	}

	/// Arms a delayed flush unless one is already pending.
	pub fn schedule_sync(self: &Arc<Self>) {
		let armed = self.sync.lock().schedule();
		if let Some(generation) = armed {
			self.spawn_fire(generation, Some(self.config.sync_delay));
		}
	}

	/// Replaces a delayed flush with one on the next idle turn.
	pub fn sync_nowish(self: &Arc<Self>) {
		let armed = self.sync.lock().nowish();
		if let Some(generation) = armed {
			self.spawn_fire(generation, None);
		}
	}

	/// Cancels any armed flush and flushes every layer now.
	pub fn synchronous_sync(&self) -> Result<()> {
		self.sync.lock().disarm();
		self.touch();
		self.sources.lock().sync_all()
	}

	/// Flushes pending changes, if any. Called before the database is
	/// discarded.
	pub fn close(&self) -> Result<()> {
		let pending = self.sync.lock().disarm();
		if pending {
			self.sources.lock().sync_all()
		} else {
			Ok(())
		}
	}

	fn spawn_fire(self: &Arc<Self>, generation: u64, delay: Option<Duration>) {
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			// Outside an event loop nothing would ever wake the task.
			self.fire(generation);
			return;
		};
		let db = Arc::downgrade(self);
		handle.spawn(async move {
			match delay {
				Some(delay) => tokio::time::sleep(delay).await,
				None => tokio::task::yield_now().await,
			}
			if let Some(db) = db.upgrade() {
				db.fire(generation);
			}
		});
	}

	fn fire(&self, generation: u64) {
		if !self.sync.lock().fire(generation) {
			return;
		}
		match self.synchronous_sync() {
			Ok(()) => tracing::debug!(name = %self.persistent_name, "sync completed"),
			Err(err) => {
				tracing::error!(name = %self.persistent_name, %err, "failed to sync one or more sources");
			}
		}
	}
}

impl Drop for Database {
	fn drop(&mut self) {
		if self.sync.get_mut().disarm()
			&& let Err(err) = self.sources.get_mut().sync_all()
		{
			tracing::error!(name = %self.persistent_name, %err, "failed to flush database on drop");
		}
	}
}
