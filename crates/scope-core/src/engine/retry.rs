//! Bounded exponential backoff.

use std::time::Duration;

/// Tracks retries of one call.
///
/// The first retry waits `base`, each later one twice as long, capped at
/// `max`. After `max_retries` retries no further delay is handed out.
#[derive(Debug, Clone)]
pub struct RetryState {
	max_retries: u32,
	base: Duration,
	max: Duration,
	attempts: u32,
}

impl RetryState {
	pub fn new(max_retries: u32, base: Duration, max: Duration) -> Self {
		Self {
			max_retries,
			base,
			max,
			attempts: 0,
		}
	}

	/// Delay before the next retry, or `None` once the bound is reached.
	pub fn next_delay(&mut self) -> Option<Duration> {
		if self.attempts >= self.max_retries {
			return None;
		}
		let factor = 2u32.checked_pow(self.attempts).unwrap_or(u32::MAX);
		self.attempts += 1;
		Some(self.base.saturating_mul(factor).min(self.max))
	}

	/// Retries handed out so far.
	pub fn attempts(&self) -> u32 {
		self.attempts
	}
}
