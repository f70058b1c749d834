//! Debounced persistence state machine.
//!
//! At most one sync is armed per database. `PendingSoon` fires after the
//! configured delay; `PendingNow` fires on the next turn of the event loop.
//! Arming bumps a generation counter and the spawned task carries the
//! generation it was armed with, so a task whose arm was superseded or
//! disarmed wakes up, sees a stale generation, and does nothing.

/// Observable sync state of a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
	/// Nothing armed.
	#[default]
	Idle,
	/// A sync fires after the debounce delay.
	PendingSoon,
	/// A sync fires as soon as the event loop is otherwise idle.
	PendingNow,
}

#[derive(Debug, Default)]
pub(super) struct SyncMachine {
	state: SyncState,
	generation: u64,
}

impl SyncMachine {
	pub(super) fn state(&self) -> SyncState {
		self.state
	}

	fn arm(&mut self, state: SyncState) -> u64 {
		self.generation += 1;
		self.state = state;
		self.generation
	}

	/// Arms `PendingSoon` from `Idle`. Returns the generation to spawn with.
	pub(super) fn schedule(&mut self) -> Option<u64> {
		match self.state {
			SyncState::Idle => Some(self.arm(SyncState::PendingSoon)),
			SyncState::PendingSoon | SyncState::PendingNow => None,
		}
	}

	/// Replaces any `PendingSoon` with `PendingNow`.
	pub(super) fn nowish(&mut self) -> Option<u64> {
		match self.state {
			SyncState::PendingNow => None,
			SyncState::Idle | SyncState::PendingSoon => Some(self.arm(SyncState::PendingNow)),
		}
	}

	/// Consumes a wake-up. Returns `true` if the task is still current.
	pub(super) fn fire(&mut self, generation: u64) -> bool {
		if self.state == SyncState::Idle || generation != self.generation {
			return false;
		}
		self.state = SyncState::Idle;
		true
	}

	/// Cancels whatever is armed. Returns `true` if something was.
	pub(super) fn disarm(&mut self) -> bool {
		let was_pending = self.state != SyncState::Idle;
		self.generation += 1;
		self.state = SyncState::Idle;
		was_pending
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schedule_is_noop_while_pending() {
		let mut m = SyncMachine::default();
		let soon = m.schedule().unwrap();
		assert_eq!(m.schedule(), None);
		assert_eq!(m.state(), SyncState::PendingSoon);
		assert!(m.fire(soon));
		assert_eq!(m.state(), SyncState::Idle);
	}

	#[test]
	fn nowish_supersedes_soon() {
		let mut m = SyncMachine::default();
		let soon = m.schedule().unwrap();
		let now = m.nowish().unwrap();
		assert_eq!(m.nowish(), None);
		assert_eq!(m.schedule(), None);

		assert!(!m.fire(soon));
		assert_eq!(m.state(), SyncState::PendingNow);
		assert!(m.fire(now));
	}

	#[test]
	fn disarm_invalidates_pending_task() {
		let mut m = SyncMachine::default();
		let soon = m.schedule().unwrap();
		assert!(m.disarm());
		assert!(!m.disarm());
		assert!(!m.fire(soon));
	}
}
