//! The backing-store contract.
//!
//! A [`Source`] is one layer of a configuration stack. Sources are opened
//! from textual addresses of the form `backend:[flags:]resource` by a
//! [`Backend`] looked up in a [`BackendRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use confd_primitives::{Error, Result, Value};

bitflags::bitflags! {
	/// Capabilities of an opened source.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct SourceFlags: u8 {
		/// Values may be queried.
		const READABLE = 1 << 0;
		/// Values may be set and unset.
		const WRITABLE = 1 << 1;
	}
}

/// What one layer stores for a key.
///
/// A key can carry a schema association without a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredValue {
	/// The stored value, if any.
	pub value: Option<Value>,
	/// Key of the schema describing this key.
	pub schema_name: Option<String>,
}

impl StoredValue {
	/// Returns `true` if neither a value nor a schema association is stored.
	pub fn is_empty(&self) -> bool {
		self.value.is_none() && self.schema_name.is_none()
	}
}

/// One backing layer.
///
/// Keys handed to a source are already validated. Directory listings return
/// child names relative to the listed directory.
pub trait Source: Send + fmt::Debug {
	/// Address the source was opened from.
	fn address(&self) -> &str;

	/// Capabilities of this source.
	fn flags(&self) -> SourceFlags;

	/// Returns `true` if the source accepts mutations.
	fn is_writable(&self) -> bool {
		self.flags().contains(SourceFlags::WRITABLE)
	}

	/// Looks up `key`, choosing localized data by `locales` in order.
	fn query_value(&self, key: &str, locales: &[String]) -> Result<StoredValue>;

	/// Stores `value` under `key`.
	fn set_value(&mut self, key: &str, value: &Value) -> Result<()>;

	/// Removes the value under `key`. With a locale, only that locale's
	/// variant of a localized value is removed. Absent keys are not an error.
	fn unset_value(&mut self, key: &str, locale: Option<&str>) -> Result<()>;

	/// Immediate entries of `dir` as `(name, stored)` pairs.
	fn all_entries(&self, dir: &str, locales: &[String]) -> Result<Vec<(String, StoredValue)>>;

	/// Names of the immediate subdirectories of `dir`.
	fn all_subdirs(&self, dir: &str) -> Result<Vec<String>>;

	/// Returns `true` if `dir` holds anything in this source.
	fn dir_exists(&self, dir: &str) -> Result<bool>;

	/// Removes `dir` and everything below it.
	fn remove_dir(&mut self, dir: &str) -> Result<()>;

	/// Associates `key` with the schema stored under `schema_key`, or
	/// dissociates it when `schema_key` is `None`.
	fn set_schema(&mut self, key: &str, schema_key: Option<&str>) -> Result<()>;

	/// Persists pending changes. All-or-nothing for this source.
	fn sync_all(&mut self) -> Result<()>;

	/// Drops cached state so the next read sees the backing store.
	fn clear_cache(&mut self);
}

/// Parsed source address, `backend:[flags:]resource`.
///
/// Recognized flags are `readonly` and `readwrite`, comma separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
	raw: String,
	backend: String,
	flags: Option<SourceFlags>,
	resource: String,
}

impl Address {
	/// Parses an address.
	pub fn parse(raw: &str) -> Result<Self> {
		let raw = raw.trim();
		let (backend, rest) = raw
			.split_once(':')
			.ok_or_else(|| Error::bad_address(raw, "missing `:` after backend name"))?;
		if backend.is_empty()
			|| !backend
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		{
			return Err(Error::bad_address(raw, "invalid backend name"));
		}

		let (flags, resource) = match rest.split_once(':') {
			Some((words, resource)) => match parse_flags(words) {
				Some(flags) => (Some(flags), resource),
				None => (None, rest),
			},
			None => (None, rest),
		};
		if resource.is_empty() {
			return Err(Error::bad_address(raw, "empty resource"));
		}

		Ok(Self {
			raw: raw.to_owned(),
			backend: backend.to_owned(),
			flags,
			resource: resource.to_owned(),
		})
	}

	/// Full address text.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Backend name.
	pub fn backend(&self) -> &str {
		&self.backend
	}

	/// Flags requested by the address, if any.
	pub fn flags(&self) -> Option<SourceFlags> {
		self.flags
	}

	/// Backend-specific resource.
	pub fn resource(&self) -> &str {
		&self.resource
	}
}

fn parse_flags(words: &str) -> Option<SourceFlags> {
	let mut flags = SourceFlags::READABLE;
	for word in words.split(',').map(str::trim) {
		match word {
			"readonly" => flags.remove(SourceFlags::WRITABLE),
			"readwrite" => flags.insert(SourceFlags::WRITABLE),
			_ => return None,
		}
	}
	Some(flags)
}

impl FromStr for Address {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

/// Opens sources for one address scheme.
pub trait Backend: Send + Sync + fmt::Debug {
	/// Scheme name matched against [`Address::backend`].
	fn name(&self) -> &str;

	/// Opens the source described by `address`.
	fn open(&self, address: &Address) -> Result<Box<dyn Source>>;
}

/// Backends indexed by scheme name.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
	backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry holding the built-in backends.
	pub fn with_builtin() -> Self {
		let mut registry = Self::new();
		registry.register(Arc::new(crate::memory::MemoryBackend::new()));
		registry
	}

	/// Registers `backend`, replacing any backend of the same name.
	pub fn register(&mut self, backend: Arc<dyn Backend>) {
		self.backends.insert(backend.name().to_owned(), backend);
	}

	/// Looks up a backend by name.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Backend>> {
		self.backends.get(name)
	}

	/// Parses `address` and opens it with the matching backend.
	pub fn open(&self, address: &str) -> Result<Box<dyn Source>> {
		let address = Address::parse(address)?;
		let backend = self.get(address.backend()).ok_or_else(|| {
			Error::bad_address(
				address.as_str(),
				format!("no backend named `{}`", address.backend()),
			)
		})?;
		backend.open(&address)
	}
}
