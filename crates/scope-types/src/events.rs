//! Event types emitted by the crank.
//!
//! Events flow through an in-process bus so that collaborators (tests, the
//! HTTP layer, log tailers) can observe refresh outcomes without parsing logs.

use crate::{Price, ProviderKind};
use serde::{Deserialize, Serialize};

/// Outcome events published by the crank scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrankEvent {
	/// Emitted once, when steady-state polling begins.
	Ready { feed_id: String, mapped_slots: usize },
	/// A cycle started at the given ledger slot.
	CycleStarted { cycle: u64, slot: u64, due_slots: usize },
	/// A slot was written.
	RefreshSucceeded {
		slot_index: u16,
		kind: ProviderKind,
		price: Price,
		marker: u64,
	},
	/// The provider was not ready; the slot was left untouched.
	RefreshSkipped { slot_index: u16, reason: String },
	/// A slot, or a whole batch call, failed.
	RefreshFailed {
		slot_indices: Vec<u16>,
		error: String,
	},
	/// A vault-share refresh wrote the same price as before.
	VaultShareUnchanged { slot_index: u16, price: Price },
	/// A vault-share refresh changed the price.
	VaultShareUpdated {
		slot_index: u16,
		previous: Price,
		price: Price,
	},
	/// A cycle finished.
	CycleCompleted {
		cycle: u64,
		succeeded: usize,
		skipped: usize,
		failed: usize,
	},
}

impl CrankEvent {
	/// Short stable label, matching the log message of the same outcome.
	pub fn label(&self) -> &'static str {
		match self {
			CrankEvent::Ready { .. } => "Crank ready",
			CrankEvent::CycleStarted { .. } => "Cycle started",
			CrankEvent::RefreshSucceeded { .. } => "Refresh succeeded",
			CrankEvent::RefreshSkipped { .. } => "Refresh skipped",
			CrankEvent::RefreshFailed { .. } => "Refresh failed",
			CrankEvent::VaultShareUnchanged { .. } => "Vault share unchanged",
			CrankEvent::VaultShareUpdated { .. } => "Vault share updated",
			CrankEvent::CycleCompleted { .. } => "Cycle completed",
		}
	}
}
