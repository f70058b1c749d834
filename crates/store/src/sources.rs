//! The layered source stack.
//!
//! Layers are ordered highest priority first and fixed at construction.
//! Reads scan front to back and the first layer holding a value wins; when
//! every layer misses, the key's schema may supply a default. Writes go to
//! the first writable layer.

use confd_primitives::key;
use confd_primitives::{Error, Result, Value};
use indexmap::map::Entry as MapEntry;
use indexmap::{IndexMap, IndexSet};

use crate::source::{BackendRegistry, Source};

bitflags::bitflags! {
	/// Options for [`Sources::recursive_unset`].
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
	pub struct UnsetFlags: u8 {
		/// Also drop schema associations of every visited key.
		const INCLUDING_SCHEMA_NAMES = 1 << 0;
	}
}

/// Resolution of one key against the stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
	/// Effective value, if any.
	pub value: Option<Value>,
	/// `true` if `value` came from the key's schema.
	pub is_default: bool,
	/// `true` if a write to the key would become the effective value.
	pub is_writable: bool,
	/// Schema associated with the key by the highest layer that has one.
	pub schema_name: Option<String>,
}

/// One merged directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
	/// Absolute key.
	pub key: String,
	/// Effective value, if any.
	pub value: Option<Value>,
	/// Associated schema key.
	pub schema_name: Option<String>,
	/// `true` if `value` came from the schema.
	pub is_default: bool,
	/// `true` if a write to the key would become the effective value.
	pub is_writable: bool,
}

/// Outcome of [`Sources::recursive_unset`].
///
/// The walk does not stop at the first failure; `first_error` holds the
/// earliest one and `affected` every key the walk visited.
#[derive(Debug, Default)]
pub struct UnsetReport {
	/// Keys whose effective value may have changed, deepest first.
	pub affected: Vec<String>,
	/// First error encountered, if any.
	pub first_error: Option<Error>,
}

impl UnsetReport {
	fn record(&mut self, err: Error) {
		tracing::debug!(%err, "recursive unset step failed");
		self.first_error.get_or_insert(err);
	}

	fn visit(&mut self, key: String) {
		if !self.affected.contains(&key) {
			self.affected.push(key);
		}
	}
}

/// Ordered stack of sources, highest priority first.
#[derive(Debug, Default)]
pub struct Sources {
	layers: Vec<Box<dyn Source>>,
}

/// Keys that can hold a value: valid and not the root directory.
fn validate_entry_key(key: &str) -> Result<()> {
	key::validate_key(key)?;
	if key == key::ROOT {
		return Err(Error::bad_key(key, "root is a directory"));
	}
	Ok(())
}

impl Sources {
	/// Creates a stack from already opened layers.
	pub fn new(layers: Vec<Box<dyn Source>>) -> Self {
		Self { layers }
	}

	/// Opens every address with `backends`, skipping the ones that fail.
	pub fn from_addresses<I, S>(addresses: I, backends: &BackendRegistry) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut layers = Vec::new();
		for address in addresses {
			let address = address.as_ref();
			match backends.open(address) {
				Ok(source) => {
					tracing::debug!(address, writable = source.is_writable(), "resolved source");
					layers.push(source);
				}
				Err(err) => tracing::error!(address, %err, "unable to resolve source address"),
			}
		}

		let sources = Self::new(layers);
		if !sources.has_writable() {
			tracing::warn!(
				layers = sources.len(),
				"no writable source in the stack; changes will be refused"
			);
		}
		sources
	}

	/// Number of layers.
	pub fn len(&self) -> usize {
		self.layers.len()
	}

	/// Returns `true` if the stack has no layers.
	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}

	/// Layer addresses, highest priority first.
	pub fn addresses(&self) -> impl Iterator<Item = &str> {
		self.layers.iter().map(|l| l.address())
	}

	/// Returns `true` if any layer accepts writes.
	pub fn has_writable(&self) -> bool {
		self.layers.iter().any(|l| l.is_writable())
	}

	fn first_writable(&mut self, key: &str) -> Result<&mut Box<dyn Source>> {
		self.layers
			.iter_mut()
			.find(|l| l.is_writable())
			.ok_or_else(|| Error::NoWritableDatabase(key.to_owned()))
	}

	/// Resolves `key`.
	///
	/// On a total miss with `use_schema_default`, the default of the key's
	/// schema is returned with `is_default` set.
	pub fn query_value(
		&self,
		key: &str,
		locales: &[String],
		use_schema_default: bool,
	) -> Result<QueryResult> {
		key::validate_key(key)?;

		let mut is_writable = false;
		let mut schema_name = None;
		for layer in &self.layers {
			is_writable |= layer.is_writable();
			let stored = layer.query_value(key, locales)?;
			if schema_name.is_none() {
				schema_name = stored.schema_name;
			}
			if let Some(value) = stored.value {
				return Ok(QueryResult {
					value: Some(value),
					is_default: false,
					is_writable,
					schema_name,
				});
			}
		}

		let value = match &schema_name {
			Some(name) if use_schema_default => self.schema_default(name, locales),
			_ => None,
		};
		Ok(QueryResult {
			is_default: value.is_some(),
			value,
			is_writable,
			schema_name,
		})
	}

	/// Returns the schema default for `key` and whether the key is writable.
	pub fn query_default_value(
		&self,
		key: &str,
		locales: &[String],
	) -> Result<(Option<Value>, bool)> {
		key::validate_key(key)?;

		let mut schema_name = None;
		for layer in &self.layers {
			if let Some(name) = layer.query_value(key, locales)?.schema_name {
				schema_name = Some(name);
				break;
			}
		}
		let value = schema_name.and_then(|name| self.schema_default(&name, locales));
		Ok((value, self.has_writable()))
	}

	/// Looks up the schema stored under `schema_key` and returns its default.
	///
	/// Failures are logged and treated as "no default".
	fn schema_default(&self, schema_key: &str, locales: &[String]) -> Option<Value> {
		if let Err(err) = key::validate_key(schema_key) {
			tracing::warn!(schema_key, %err, "invalid schema key");
			return None;
		}
		for layer in &self.layers {
			match layer.query_value(schema_key, locales) {
				Ok(stored) => match stored.value {
					Some(Value::Schema(schema)) => return schema.default_value.clone(),
					Some(other) => {
						tracing::warn!(
							schema_key,
							kind = %other.value_type(),
							"schema key does not hold a schema"
						);
						return None;
					}
					None => {}
				},
				Err(err) => {
					tracing::warn!(schema_key, %err, "failed to load schema");
					return None;
				}
			}
		}
		None
	}

	/// Stores `value` in the first writable layer.
	///
	/// Fails with [`Error::NoPermission`] if a read-only layer ahead of it
	/// already holds the key, since the write would stay invisible.
	pub fn set_value(&mut self, key: &str, value: &Value) -> Result<()> {
		validate_entry_key(key)?;
		value.validate()?;

		for layer in &mut self.layers {
			if layer.is_writable() {
				return layer.set_value(key, value);
			}
			if layer.query_value(key, &[])?.value.is_some() {
				return Err(Error::NoPermission(format!(
					"`{key}` is overridden by read-only source `{}`",
					layer.address()
				)));
			}
		}
		Err(Error::NoWritableDatabase(key.to_owned()))
	}

	/// Removes `key` from the first writable layer only.
	pub fn unset_value(&mut self, key: &str, locale: Option<&str>) -> Result<()> {
		key::validate_key(key)?;
		self.first_writable(key)?.unset_value(key, locale)
	}

	/// Associates `key` with a schema in the first writable layer. An empty
	/// or missing schema key dissociates.
	pub fn set_schema(&mut self, key: &str, schema_key: Option<&str>) -> Result<()> {
		validate_entry_key(key)?;
		let schema_key = schema_key.filter(|s| !s.is_empty());
		if let Some(schema_key) = schema_key {
			validate_entry_key(schema_key)?;
		}
		self.first_writable(key)?.set_schema(key, schema_key)
	}

	/// Unsets `key` and every key below it in all writable layers.
	///
	/// Only argument validation and the absence of writable layers fail
	/// the call outright; per-key failures land in the report. Only the
	/// first failure is kept, so after an error the caller cannot tell which
	/// keys survived without reading the tree again.
	pub fn recursive_unset(
		&mut self,
		key: &str,
		locale: Option<&str>,
		flags: UnsetFlags,
	) -> Result<UnsetReport> {
		key::validate_key(key)?;
		if !self.has_writable() {
			return Err(Error::NoWritableDatabase(key.to_owned()));
		}
		let mut report = UnsetReport::default();
		self.unset_tree(key, locale, flags, &mut report);
		Ok(report)
	}

	fn unset_tree(
		&mut self,
		dir: &str,
		locale: Option<&str>,
		flags: UnsetFlags,
		report: &mut UnsetReport,
	) {
		let mut subdirs = IndexSet::new();
		let mut entries = IndexSet::new();
		for layer in self.layers.iter().filter(|l| l.is_writable()) {
			match layer.all_subdirs(dir) {
				Ok(names) => subdirs.extend(names),
				Err(err) => report.record(err),
			}
			match layer.all_entries(dir, &[]) {
				Ok(found) => entries.extend(found.into_iter().map(|(name, _)| name)),
				Err(err) => report.record(err),
			}
		}

		for name in subdirs {
			self.unset_tree(&key::join(dir, &name), locale, flags, report);
		}
		for name in entries {
			self.unset_everywhere(&key::join(dir, &name), locale, flags, report);
		}
		self.unset_everywhere(dir, locale, flags, report);
	}

	fn unset_everywhere(
		&mut self,
		key: &str,
		locale: Option<&str>,
		flags: UnsetFlags,
		report: &mut UnsetReport,
	) {
		for layer in self.layers.iter_mut().filter(|l| l.is_writable()) {
			if flags.contains(UnsetFlags::INCLUDING_SCHEMA_NAMES)
				&& let Err(err) = layer.set_schema(key, None)
			{
				report.record(err);
			}
			if let Err(err) = layer.unset_value(key, locale) {
				report.record(err);
			}
		}
		report.visit(key.to_owned());
	}

	/// Returns `true` if any layer has `dir`.
	pub fn dir_exists(&self, dir: &str) -> Result<bool> {
		key::validate_dir(dir)?;
		for layer in &self.layers {
			if layer.dir_exists(dir)? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// Removes `dir` from every writable layer, continuing past failures.
	pub fn remove_dir(&mut self, dir: &str) -> Result<()> {
		key::validate_dir(dir)?;
		if !self.has_writable() {
			return Err(Error::NoWritableDatabase(dir.to_owned()));
		}
		let mut first = None;
		for layer in self.layers.iter_mut().filter(|l| l.is_writable()) {
			if let Err(err) = layer.remove_dir(dir) {
				first.get_or_insert(err);
			}
		}
		first.map_or(Ok(()), Err)
	}

	/// Immediate entries of `dir`, merged across layers.
	///
	/// The first layer holding a value for a name wins. Entries without a
	/// value fall back to their schema default.
	pub fn all_entries(&self, dir: &str, locales: &[String]) -> Result<Vec<Entry>> {
		key::validate_dir(dir)?;

		let mut merged: IndexMap<String, Entry> = IndexMap::new();
		let mut is_writable = false;
		for layer in &self.layers {
			is_writable |= layer.is_writable();
			for (name, stored) in layer.all_entries(dir, locales)? {
				match merged.entry(name) {
					MapEntry::Vacant(slot) => {
						let key = key::join(dir, slot.key());
						slot.insert(Entry {
							key,
							value: stored.value,
							schema_name: stored.schema_name,
							is_default: false,
							is_writable,
						});
					}
					MapEntry::Occupied(mut slot) => {
						let entry = slot.get_mut();
						if entry.schema_name.is_none() {
							entry.schema_name = stored.schema_name;
						}
						if entry.value.is_none() && stored.value.is_some() {
							entry.value = stored.value;
							entry.is_writable = is_writable;
						}
					}
				}
			}
		}

		let any_writable = self.has_writable();
		Ok(merged
			.into_values()
			.map(|mut entry| {
				if entry.value.is_none() {
					entry.is_writable = any_writable;
					if let Some(name) = &entry.schema_name {
						entry.value = self.schema_default(name, locales);
						entry.is_default = entry.value.is_some();
					}
				}
				entry
			})
			.collect())
	}

	/// Absolute paths of the immediate subdirectories of `dir`, merged
	/// across layers.
	pub fn all_dirs(&self, dir: &str) -> Result<Vec<String>> {
		key::validate_dir(dir)?;
		let mut names = IndexSet::new();
		for layer in &self.layers {
			names.extend(layer.all_subdirs(dir)?);
		}
		Ok(names.into_iter().map(|name| key::join(dir, &name)).collect())
	}

	/// Syncs every layer, continuing past failures.
	pub fn sync_all(&mut self) -> Result<()> {
		let mut first = None;
		for layer in &mut self.layers {
			if let Err(err) = layer.sync_all() {
				tracing::error!(address = layer.address(), %err, "failed to sync source");
				first.get_or_insert(err);
			}
		}
		first.map_or(Ok(()), Err)
	}

	/// Drops cached state in every layer.
	pub fn clear_cache(&mut self) {
		for layer in &mut self.layers {
			layer.clear_cache();
		}
	}
}

#[cfg(test)]
mod tests;
