//! In-memory backend.
//!
//! Every source opened on the same resource name through one
//! [`MemoryBackend`] shares a committed tree. Each source edits a private
//! working copy; [`Source::sync_all`] publishes the whole copy at once, and
//! [`Source::clear_cache`] reloads the committed tree when nothing is dirty.
//!
//! Schema values are stored per locale. Queries pick the first variant
//! matching the locale chain, then any variant.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use confd_primitives::key;
use confd_primitives::locale::C_LOCALE;
use confd_primitives::{Error, Result, Value};
use parking_lot::Mutex;

use crate::source::{Address, Backend, Source, SourceFlags, StoredValue};

/// Backend name used in addresses (`memory:...`).
pub const BACKEND_NAME: &str = "memory";

/// Backend whose sources live in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	committed: Arc<Mutex<HashMap<String, Tree>>>,
}

impl MemoryBackend {
	/// Creates a backend with no committed trees.
	pub fn new() -> Self {
		Self::default()
	}

	/// Names of resources that have been synced at least once.
	pub fn resources(&self) -> Vec<String> {
		let mut names: Vec<_> = self.committed.lock().keys().cloned().collect();
		names.sort();
		names
	}
}

impl Backend for MemoryBackend {
	fn name(&self) -> &str {
		BACKEND_NAME
	}

	fn open(&self, address: &Address) -> Result<Box<dyn Source>> {
		let working = self
			.committed
			.lock()
			.get(address.resource())
			.cloned()
			.unwrap_or_default();
		tracing::debug!(address = address.as_str(), "opened memory source");
		Ok(Box::new(MemorySource {
			address: address.as_str().to_owned(),
			resource: address.resource().to_owned(),
			flags: address
				.flags()
				.unwrap_or(SourceFlags::READABLE | SourceFlags::WRITABLE),
			committed: Arc::clone(&self.committed),
			working,
			dirty: false,
		}))
	}
}

#[derive(Debug, Clone, Default)]
struct Tree {
	nodes: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, Default)]
struct Node {
	value: Option<Value>,
	/// Schema values keyed by their description locale.
	localized: BTreeMap<String, Value>,
	schema_name: Option<String>,
}

impl Node {
	fn is_empty(&self) -> bool {
		self.value.is_none() && self.localized.is_empty() && self.schema_name.is_none()
	}

	fn stored(&self, locales: &[String]) -> StoredValue {
		let value = self.value.clone().or_else(|| {
			locales
				.iter()
				.find_map(|l| self.localized.get(l))
				.or_else(|| self.localized.get(C_LOCALE))
				.or_else(|| self.localized.values().next())
				.cloned()
		});
		StoredValue {
			value,
			schema_name: self.schema_name.clone(),
		}
	}
}

enum Child<'a> {
	Entry(&'a str, &'a Node),
	Dir(&'a str),
}

impl Tree {
	/// Immediate children of `dir`, in key order.
	fn children<'a>(&'a self, dir: &str) -> impl Iterator<Item = Child<'a>> + use<'a> {
		let prefix = key::join(dir, "");
		let len = prefix.len();
		self.nodes
			.range(prefix.clone()..)
			.take_while(move |(k, _)| k.starts_with(&prefix))
			.filter_map(move |(k, node)| {
				let rest = &k[len..];
				match rest.split_once('/') {
					Some((segment, _)) => Some(Child::Dir(segment)),
					None if rest.is_empty() => None,
					None => Some(Child::Entry(rest, node)),
				}
			})
	}

	fn has_below(&self, dir: &str) -> bool {
		dir == key::ROOT || self.children(dir).next().is_some()
	}

	fn remove_below(&mut self, dir: &str) {
		if dir == key::ROOT {
			self.nodes.clear();
			return;
		}
		let prefix = key::join(dir, "");
		self.nodes.retain(|k, _| !k.starts_with(&prefix));
	}
}

/// A source opened by [`MemoryBackend`].
#[derive(Debug)]
pub struct MemorySource {
	address: String,
	resource: String,
	flags: SourceFlags,
	committed: Arc<Mutex<HashMap<String, Tree>>>,
	working: Tree,
	dirty: bool,
}

impl MemorySource {
	fn check_writable(&self) -> Result<()> {
		if self.is_writable() {
			Ok(())
		} else {
			Err(Error::NoPermission(format!(
				"source `{}` is read-only",
				self.address
			)))
		}
	}

	fn readable(&self) -> bool {
		self.flags.contains(SourceFlags::READABLE)
	}

	fn edit(&mut self, key: &str, f: impl FnOnce(&mut Node)) {
		let node = self.working.nodes.entry(key.to_owned()).or_default();
		f(node);
		if node.is_empty() {
			self.working.nodes.remove(key);
		}
		self.dirty = true;
	}
}

impl Source for MemorySource {
	fn address(&self) -> &str {
		&self.address
	}

	fn flags(&self) -> SourceFlags {
		self.flags
	}

	fn query_value(&self, key: &str, locales: &[String]) -> Result<StoredValue> {
		if !self.readable() {
			return Ok(StoredValue::default());
		}
		Ok(self
			.working
			.nodes
			.get(key)
			.map(|node| node.stored(locales))
			.unwrap_or_default())
	}

	fn set_value(&mut self, key: &str, value: &Value) -> Result<()> {
		self.check_writable()?;
		let locale = match value {
			Value::Schema(schema) => Some(schema.locale.as_deref().unwrap_or(C_LOCALE).to_owned()),
			_ => None,
		};
		let value = value.clone();
		self.edit(key, |node| match locale {
			Some(locale) => {
				node.value = None;
				node.localized.insert(locale, value);
			}
			None => {
				node.localized.clear();
				node.value = Some(value);
			}
		});
		Ok(())
	}

	fn unset_value(&mut self, key: &str, locale: Option<&str>) -> Result<()> {
		self.check_writable()?;
		if !self.working.nodes.contains_key(key) {
			return Ok(());
		}
		self.edit(key, |node| match locale {
			Some(locale) if !node.localized.is_empty() => {
				node.localized.remove(locale);
			}
			_ => {
				node.value = None;
				node.localized.clear();
			}
		});
		Ok(())
	}

	fn all_entries(&self, dir: &str, locales: &[String]) -> Result<Vec<(String, StoredValue)>> {
		if !self.readable() {
			return Ok(Vec::new());
		}
		Ok(self
			.working
			.children(dir)
			.filter_map(|child| match child {
				Child::Entry(name, node) => Some((name.to_owned(), node.stored(locales))),
				Child::Dir(_) => None,
			})
			.collect())
	}

	fn all_subdirs(&self, dir: &str) -> Result<Vec<String>> {
		if !self.readable() {
			return Ok(Vec::new());
		}
		let dirs: BTreeSet<&str> = self
			.working
			.children(dir)
			.filter_map(|child| match child {
				Child::Dir(name) => Some(name),
				Child::Entry(..) => None,
			})
			.collect();
		Ok(dirs.into_iter().map(ToOwned::to_owned).collect())
	}

	fn dir_exists(&self, dir: &str) -> Result<bool> {
		Ok(self.readable() && self.working.has_below(dir))
	}

	fn remove_dir(&mut self, dir: &str) -> Result<()> {
		self.check_writable()?;
		self.working.remove_below(dir);
		self.dirty = true;
		Ok(())
	}

	fn set_schema(&mut self, key: &str, schema_key: Option<&str>) -> Result<()> {
		self.check_writable()?;
		if schema_key.is_none() && !self.working.nodes.contains_key(key) {
			return Ok(());
		}
		let schema_key = schema_key.map(ToOwned::to_owned);
		self.edit(key, |node| node.schema_name = schema_key);
		Ok(())
	}

	fn sync_all(&mut self) -> Result<()> {
		if !self.dirty {
			return Ok(());
		}
		self.committed
			.lock()
			.insert(self.resource.clone(), self.working.clone());
		self.dirty = false;
		tracing::debug!(address = %self.address, "memory source synced");
		Ok(())
	}

	fn clear_cache(&mut self) {
		if self.dirty {
			return;
		}
		self.working = self
			.committed
			.lock()
			.get(&self.resource)
			.cloned()
			.unwrap_or_default();
	}
}

#[cfg(test)]
mod tests;
