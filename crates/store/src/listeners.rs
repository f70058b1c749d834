//! Prefix-scoped change subscriptions.
//!
//! Registrations live in a slot arena. A [`ConnectionId`] pairs the slot
//! with a generation so a stale id never removes a newer registration that
//! reused the slot. Registrations are also bucketed by prefix; a change to
//! `/a/b/c` visits the buckets of `/a/b/c`, `/a/b`, `/a` and `/`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use confd_primitives::Value;
use confd_primitives::key;
use slab::Slab;
use tokio::sync::mpsc;

/// Opaque handle for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
	slot: u32,
	generation: u32,
}

impl ConnectionId {
	/// Packs the id into a single integer for transports.
	pub const fn to_bits(self) -> u64 {
		((self.generation as u64) << 32) | self.slot as u64
	}

	/// Inverse of [`ConnectionId::to_bits`].
	pub const fn from_bits(bits: u64) -> Self {
		Self {
			slot: bits as u32,
			generation: (bits >> 32) as u32,
		}
	}
}

impl fmt::Display for ConnectionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_bits())
	}
}

/// Snapshot of one committed change, shared by every recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
	/// Changed key.
	pub key: String,
	/// New effective value; `None` if the key has no value or default.
	pub value: Option<Value>,
	/// `true` if `value` is the schema default.
	pub is_default: bool,
	/// `true` if the key can still be written.
	pub is_writable: bool,
}

/// The subscriber's connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("subscriber disconnected")
	}
}

impl std::error::Error for Disconnected {}

/// Receives change notifications for a registration.
pub trait Subscriber: Send + Sync + fmt::Debug {
	/// Delivers `change` for registration `id`.
	///
	/// Returning [`Disconnected`] removes the registration.
	fn notify(&self, id: ConnectionId, change: &Arc<Change>) -> Result<(), Disconnected>;

	/// Returns `false` once the subscriber can no longer receive changes.
	fn is_alive(&self) -> bool {
		true
	}
}

/// Subscriber forwarding changes into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
	tx: mpsc::UnboundedSender<(ConnectionId, Arc<Change>)>,
}

impl ChannelSubscriber {
	/// Creates a subscriber and the receiving end of its channel.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<(ConnectionId, Arc<Change>)>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

impl Subscriber for ChannelSubscriber {
	fn notify(&self, id: ConnectionId, change: &Arc<Change>) -> Result<(), Disconnected> {
		self.tx
			.send((id, Arc::clone(change)))
			.map_err(|_| Disconnected)
	}

	fn is_alive(&self) -> bool {
		!self.tx.is_closed()
	}
}

#[derive(Debug)]
struct Registration {
	prefix: String,
	generation: u32,
	subscriber: Arc<dyn Subscriber>,
}

/// Registry of subscriptions for one database.
#[derive(Debug, Default)]
pub struct Listeners {
	slots: Slab<Registration>,
	by_prefix: HashMap<String, Vec<usize>>,
	next_generation: u32,
}

impl Listeners {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of live registrations.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Returns `true` if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Number of distinct prefixes with at least one registration.
	pub fn prefix_count(&self) -> usize {
		self.by_prefix.len()
	}

	/// Registers `subscriber` for changes at or below `prefix`.
	///
	/// The prefix must already be a valid directory.
	pub fn add(&mut self, prefix: &str, subscriber: Arc<dyn Subscriber>) -> ConnectionId {
		self.next_generation = self.next_generation.wrapping_add(1);
		let generation = self.next_generation;
		let slot = self.slots.insert(Registration {
			prefix: prefix.to_owned(),
			generation,
			subscriber,
		});
		self.by_prefix.entry(prefix.to_owned()).or_default().push(slot);
		ConnectionId {
			slot: slot as u32,
			generation,
		}
	}

	/// Removes a registration. Returns `false` for unknown or stale ids.
	pub fn remove(&mut self, id: ConnectionId) -> bool {
		let slot = id.slot as usize;
		match self.slots.get(slot) {
			Some(reg) if reg.generation == id.generation => {}
			_ => return false,
		}
		let reg = self.slots.remove(slot);
		self.unbucket(&reg.prefix, slot);
		true
	}

	fn unbucket(&mut self, prefix: &str, slot: usize) {
		if let Some(bucket) = self.by_prefix.get_mut(prefix) {
			bucket.retain(|&s| s != slot);
			if bucket.is_empty() {
				self.by_prefix.remove(prefix);
			}
		}
	}

	/// Prefix of a live registration.
	pub fn prefix(&self, id: ConnectionId) -> Option<&str> {
		self.slots
			.get(id.slot as usize)
			.filter(|reg| reg.generation == id.generation)
			.map(|reg| reg.prefix.as_str())
	}

	/// Registrations whose prefix is `key` or one of its ancestors.
	///
	/// Each registration appears once, deepest prefix first.
	pub fn matching(&self, key: &str) -> Vec<(ConnectionId, Arc<dyn Subscriber>)> {
		key::ancestors(key)
			.filter_map(|prefix| self.by_prefix.get(prefix))
			.flatten()
			.map(|&slot| {
				let reg = &self.slots[slot];
				let id = ConnectionId {
					slot: slot as u32,
					generation: reg.generation,
				};
				(id, Arc::clone(&reg.subscriber))
			})
			.collect()
	}

	/// Delivers a change to every matching registration and removes the
	/// ones whose subscriber disconnected. Returns the number of deliveries.
	pub fn notify(
		&mut self,
		key: &str,
		value: Option<Value>,
		is_default: bool,
		is_writable: bool,
	) -> usize {
		let change = Arc::new(Change {
			key: key.to_owned(),
			value,
			is_default,
			is_writable,
		});
		let targets = self.matching(key);
		let (delivered, failed) = deliver(&targets, &change);
		for id in failed {
			self.remove(id);
		}
		delivered
	}

	/// Removes every registration whose subscriber satisfies `is_dead`.
	/// Returns how many were removed.
	pub fn drop_dead(&mut self, mut is_dead: impl FnMut(&dyn Subscriber) -> bool) -> usize {
		let dead: Vec<usize> = self
			.slots
			.iter()
			.filter(|(_, reg)| is_dead(reg.subscriber.as_ref()))
			.map(|(slot, _)| slot)
			.collect();
		for &slot in &dead {
			let reg = self.slots.remove(slot);
			self.unbucket(&reg.prefix, slot);
		}
		dead.len()
	}
}

/// Hands `change` to each target. Returns the number of successful
/// deliveries and the ids whose subscriber disconnected.
pub fn deliver(
	targets: &[(ConnectionId, Arc<dyn Subscriber>)],
	change: &Arc<Change>,
) -> (usize, Vec<ConnectionId>) {
	let mut delivered = 0;
	let mut failed = Vec::new();
	for (id, subscriber) in targets {
		match subscriber.notify(*id, change) {
			Ok(()) => delivered += 1,
			Err(Disconnected) => {
				tracing::warn!(connection = %id, key = %change.key, "dropping disconnected subscriber");
				failed.push(*id);
			}
		}
	}
	(delivered, failed)
}
