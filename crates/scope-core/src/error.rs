//! Errors raised by the program's admin and refresh operations.

use scope_adapters::AdapterError;
use scope_storage::StorageError;
use scope_types::{AccountRef, PriceError};
use thiserror::Error;

/// Errors that can occur while operating on a price feed.
///
/// Call-shape errors (`BadSlot`, `BatchTooLarge`, `AccountsAndSlotsMismatch`)
/// abort a whole batch. All other refresh errors are reported per slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
	#[error("Slot {0} has no mapping")]
	NoMapping(u16),
	#[error("Kind mismatch: {0}")]
	KindMismatch(String),
	#[error("Decode error: {0}")]
	Decode(String),
	#[error("Provider not ready: {0}")]
	NotReady(String),
	#[error("Stale marker for slot {slot}: stored {stored}, attempted {attempted}")]
	StaleMarker { slot: u16, stored: u64, attempted: u64 },
	#[error("Signer {0} is not the feed admin")]
	Unauthorized(AccountRef),
	#[error("Slot {slot} is out of range (capacity {capacity})")]
	BadSlot { slot: u16, capacity: usize },
	#[error("Unexpected account for slot {slot}: expected {expected}, got {actual}")]
	UnexpectedAccount {
		slot: u16,
		expected: AccountRef,
		actual: AccountRef,
	},
	#[error("Account {0} not found")]
	AccountNotFound(AccountRef),
	#[error("{slots} slots but {accounts} accounts")]
	AccountsAndSlotsMismatch { slots: usize, accounts: usize },
	#[error("Batch of {len} slots exceeds the limit of {max}")]
	BatchTooLarge { len: usize, max: usize },
	#[error("Feed '{0}' is already initialized")]
	AlreadyInitialized(String),
	#[error("Unknown feed '{0}'")]
	UnknownFeed(String),
	#[error("Invalid feed id: {0}")]
	InvalidFeedId(String),
	#[error("Vault share accounts are not configured")]
	VaultShareNotConfigured,
	#[error("Price table holds {prices} entries but mapping table holds {mappings}")]
	CapacityMismatch { prices: usize, mappings: usize },
	#[error("Layout error: {0}")]
	Layout(String),
	#[error("Math error: {0}")]
	Math(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl ScopeError {
	/// Errors that reject the call itself rather than a single slot.
	pub fn is_call_shape(&self) -> bool {
		matches!(
			self,
			ScopeError::BadSlot { .. }
				| ScopeError::BatchTooLarge { .. }
				| ScopeError::AccountsAndSlotsMismatch { .. }
		)
	}
}

impl From<AdapterError> for ScopeError {
	fn from(err: AdapterError) -> Self {
		match err {
			AdapterError::Decode(msg) => ScopeError::Decode(msg),
			e @ AdapterError::KindMismatch { .. } => ScopeError::KindMismatch(e.to_string()),
			AdapterError::NotReady(msg) => ScopeError::NotReady(msg),
			AdapterError::Math(e) => ScopeError::Math(e.to_string()),
		}
	}
}

impl From<PriceError> for ScopeError {
	fn from(err: PriceError) -> Self {
		ScopeError::Math(err.to_string())
	}
}

impl From<StorageError> for ScopeError {
	fn from(err: StorageError) -> Self {
		ScopeError::Storage(err.to_string())
	}
}
