//! Start-up and shutdown of the crank.

use super::{CrankEngine, EngineError};

impl CrankEngine {
	/// Checks that the feed is reachable before the first cycle.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let mapped = self.transport.mapped_slots().await?;
		tracing::info!(
			feed = %self.config.feed.id,
			mapped_slots = mapped.len(),
			start_slot = self.clock.current_slot(),
			"Initializing crank"
		);
		if mapped.is_empty() {
			tracing::warn!(feed = %self.config.feed.id, "No slots are mapped");
		}
		Ok(())
	}

	/// Asks the run loop to stop at its next sleep point.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(feed = %self.config.feed.id, "Shutting down crank");
		self.shutdown.send_replace(true);
		Ok(())
	}
}
