//! Source doubles for unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use confd_primitives::{Error, Result, Value};

use crate::memory::MemoryBackend;
use crate::source::{Address, Backend, Source, SourceFlags, StoredValue};

/// Opens `address` on `backend`.
pub(crate) fn open(backend: &MemoryBackend, address: &str) -> Box<dyn Source> {
	backend.open(&Address::parse(address).unwrap()).unwrap()
}

/// Opens `address`, stores `entries` in it, and commits them.
pub(crate) fn seeded(
	backend: &MemoryBackend,
	address: &str,
	entries: &[(&str, Value)],
) -> Box<dyn Source> {
	let writer_address = format!("memory:readwrite:{}", Address::parse(address).unwrap().resource());
	let mut writer = open(backend, &writer_address);
	for (key, value) in entries {
		writer.set_value(key, value).unwrap();
	}
	writer.sync_all().unwrap();
	open(backend, address)
}

/// Shared view into a [`TestSource`] after it moved into a stack.
#[derive(Debug, Clone, Default)]
pub(crate) struct SyncSpy {
	syncs: Arc<AtomicUsize>,
	fail_sync: Arc<AtomicBool>,
}

impl SyncSpy {
	pub(crate) fn syncs(&self) -> usize {
		self.syncs.load(Ordering::SeqCst)
	}

	pub(crate) fn fail_sync(&self, fail: bool) {
		self.fail_sync.store(fail, Ordering::SeqCst);
	}
}

/// Wraps a source, counting syncs and failing chosen operations.
#[derive(Debug)]
pub(crate) struct TestSource {
	inner: Box<dyn Source>,
	spy: SyncSpy,
	fail_unset: HashSet<String>,
	fail_remove_dir: HashSet<String>,
}

impl TestSource {
	pub(crate) fn wrap(inner: Box<dyn Source>) -> (Self, SyncSpy) {
		let spy = SyncSpy::default();
		let source = Self {
			inner,
			spy: spy.clone(),
			fail_unset: HashSet::new(),
			fail_remove_dir: HashSet::new(),
		};
		(source, spy)
	}

	pub(crate) fn failing_unset(mut self, key: &str) -> Self {
		self.fail_unset.insert(key.to_owned());
		self
	}

	pub(crate) fn failing_remove_dir(mut self, dir: &str) -> Self {
		self.fail_remove_dir.insert(dir.to_owned());
		self
	}
}

impl Source for TestSource {
	fn address(&self) -> &str {
		self.inner.address()
	}

	fn flags(&self) -> SourceFlags {
		self.inner.flags()
	}

	fn query_value(&self, key: &str, locales: &[String]) -> Result<StoredValue> {
		self.inner.query_value(key, locales)
	}

	fn set_value(&mut self, key: &str, value: &Value) -> Result<()> {
		self.inner.set_value(key, value)
	}

	fn unset_value(&mut self, key: &str, locale: Option<&str>) -> Result<()> {
		if self.fail_unset.contains(key) {
			return Err(Error::Failed(format!("injected failure unsetting `{key}`")));
		}
		self.inner.unset_value(key, locale)
	}

	fn all_entries(&self, dir: &str, locales: &[String]) -> Result<Vec<(String, StoredValue)>> {
		self.inner.all_entries(dir, locales)
	}

	fn all_subdirs(&self, dir: &str) -> Result<Vec<String>> {
		self.inner.all_subdirs(dir)
	}

	fn dir_exists(&self, dir: &str) -> Result<bool> {
		self.inner.dir_exists(dir)
	}

	fn remove_dir(&mut self, dir: &str) -> Result<()> {
		if self.fail_remove_dir.contains(dir) {
			return Err(Error::Failed(format!("injected failure removing `{dir}`")));
		}
		self.inner.remove_dir(dir)
	}

	fn set_schema(&mut self, key: &str, schema_key: Option<&str>) -> Result<()> {
		self.inner.set_schema(key, schema_key)
	}

	fn sync_all(&mut self) -> Result<()> {
		self.spy.syncs.fetch_add(1, Ordering::SeqCst);
		if self.spy.fail_sync.load(Ordering::SeqCst) {
			return Err(Error::Failed("injected sync failure".into()));
		}
		self.inner.sync_all()
	}

	fn clear_cache(&mut self) {
		self.inner.clear_cache();
	}
}
