//! Time-stamped cache of locale fallback chains.

use std::collections::HashMap;
use std::time::Duration;

use confd_primitives::LocaleList;
use tokio::time::Instant;

/// Default age after which an unused chain is dropped.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Maps locale strings to their computed fallback chains.
///
/// Every lookup stamps the entry; [`LocaleCache::expire`] drops entries not
/// looked up within the given age. There is no size bound.
#[derive(Debug, Default)]
pub struct LocaleCache {
	entries: HashMap<String, (LocaleList, Instant)>,
}

impl LocaleCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the chain for `locale`, computing it on first use.
	pub fn get(&mut self, locale: &str) -> LocaleList {
		let now = Instant::now();
		let (list, last_used) = self
			.entries
			.entry(locale.to_owned())
			.or_insert_with(|| (LocaleList::for_locale(locale), now));
		*last_used = now;
		list.clone()
	}

	/// Drops entries not used within `max_age`. Returns how many were dropped.
	pub fn expire(&mut self, max_age: Duration) -> usize {
		let now = Instant::now();
		let before = self.entries.len();
		self.entries
			.retain(|_, (_, last_used)| now.saturating_duration_since(*last_used) <= max_age);
		let dropped = before - self.entries.len();
		if dropped > 0 {
			tracing::debug!(dropped, "expired cached locale chains");
		}
		dropped
	}

	/// Number of cached chains.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` if nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
