//! Ledger time as seen by the crank.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[async_trait]
pub trait Clock: Send + Sync {
	/// The current ledger slot.
	fn current_slot(&self) -> u64;

	async fn sleep(&self, duration: Duration);
}

/// Derives the slot from elapsed wall time at a fixed slot duration.
pub struct SystemClock {
	start: Instant,
	start_slot: u64,
	ms_per_slot: u64,
}

impl SystemClock {
	pub fn new(start_slot: u64, ms_per_slot: u64) -> Self {
		Self {
			start: Instant::now(),
			start_slot,
			ms_per_slot: ms_per_slot.max(1),
		}
	}
}

#[async_trait]
impl Clock for SystemClock {
	fn current_slot(&self) -> u64 {
		let elapsed = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
		self.start_slot.saturating_add(elapsed / self.ms_per_slot)
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// A clock that only moves when told to, or when something sleeps on it.
///
/// Sleeping advances the slot by the slept duration (at least one slot) and
/// yields to the scheduler instead of waiting.
pub struct ManualClock {
	slot: AtomicU64,
	ms_per_slot: u64,
}

impl ManualClock {
	pub fn new(slot: u64, ms_per_slot: u64) -> Self {
		Self {
			slot: AtomicU64::new(slot),
			ms_per_slot: ms_per_slot.max(1),
		}
	}

	pub fn advance(&self, slots: u64) {
		self.slot.fetch_add(slots, Ordering::SeqCst);
	}

	pub fn set_slot(&self, slot: u64) {
		self.slot.store(slot, Ordering::SeqCst);
	}
}

#[async_trait]
impl Clock for ManualClock {
	fn current_slot(&self) -> u64 {
		self.slot.load(Ordering::SeqCst)
	}

	async fn sleep(&self, duration: Duration) {
		let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
		self.advance((millis / self.ms_per_slot).max(1));
		tokio::task::yield_now().await;
	}
}
