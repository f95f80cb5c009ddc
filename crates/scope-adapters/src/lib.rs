//! Provider adapters for the Scope price oracle.
//!
//! Each provider kind owns one adapter that turns a raw account blob into a
//! normalized [`Price`]. Adapters are pure: they never perform I/O and never
//! write to the price table. Dispatch is a closed match on the
//! [`ProviderKind`] stored in a slot's mapping, never on the blob contents.

use scope_types::{AccountInfo, Price, PriceError, ProviderKind, SLOTS_PER_EPOCH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod aggregator_v1;
	pub mod aggregator_v2;
	pub mod lending_exchange_rate;
	pub mod live_aggregator;
	pub mod stake_pool_exchange_rate;
	pub mod vault_share;
}

mod layout;

pub use implementations::vault_share::decode_vault_share;

/// Errors that can occur while decoding a provider account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
	/// The account is malformed for its declared kind.
	#[error("Decode error: {0}")]
	Decode(String),
	/// The account, or the call shape, does not belong to the expected kind.
	#[error("Kind mismatch for {kind}: {reason}")]
	KindMismatch { kind: ProviderKind, reason: String },
	/// The provider reports a state that must not be priced right now.
	#[error("Provider not ready: {0}")]
	NotReady(String),
	/// Price arithmetic overflowed.
	#[error("Math error: {0}")]
	Math(#[from] PriceError),
}

impl AdapterError {
	/// Soft failures leave the slot untouched without failing the refresh.
	pub fn is_soft(&self) -> bool {
		matches!(self, AdapterError::NotReady(_))
	}

	pub(crate) fn kind_mismatch(kind: ProviderKind, reason: impl Into<String>) -> Self {
		AdapterError::KindMismatch {
			kind,
			reason: reason.into(),
		}
	}
}

/// Ledger position at which a decode happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeContext {
	pub slot: u64,
	pub epoch: u64,
}

impl DecodeContext {
	/// Derives the epoch from the slot.
	pub fn at_slot(slot: u64) -> Self {
		Self {
			slot,
			epoch: slot / SLOTS_PER_EPOCH,
		}
	}
}

/// A decoded provider observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
	pub price: Price,
	/// Unix timestamp reported by the provider, when it reports one.
	pub source_timestamp: Option<u64>,
}

/// Interface implemented by every provider adapter.
pub trait PriceAdapter: Send + Sync {
	/// The provider kind this adapter decodes.
	fn kind(&self) -> ProviderKind;

	/// Decodes a single provider account.
	fn decode(&self, account: &AccountInfo, ctx: &DecodeContext) -> Result<Observation, AdapterError>;

	/// Checks that an account is usable before it is mapped to a slot.
	fn validate(&self, _account: &AccountInfo) -> Result<(), AdapterError> {
		Ok(())
	}
}

/// Returns the adapter for a provider kind.
pub fn adapter(kind: ProviderKind) -> &'static dyn PriceAdapter {
	use implementations::*;

	match kind {
		ProviderKind::LiveAggregator => &live_aggregator::LiveAggregatorAdapter,
		ProviderKind::AggregatorV1 => &aggregator_v1::AggregatorV1Adapter,
		ProviderKind::AggregatorV2 => &aggregator_v2::AggregatorV2Adapter,
		ProviderKind::LendingExchangeRate => &lending_exchange_rate::LendingExchangeRateAdapter,
		ProviderKind::StakePoolExchangeRate => {
			&stake_pool_exchange_rate::StakePoolExchangeRateAdapter
		},
		ProviderKind::VaultShare => &vault_share::VaultShareAdapter,
	}
}

/// Decodes `account` with the adapter selected by `kind`.
pub fn decode(
	kind: ProviderKind,
	account: &AccountInfo,
	ctx: &DecodeContext,
) -> Result<Observation, AdapterError> {
	let result = adapter(kind).decode(account, ctx);
	if let Err(e) = &result {
		tracing::trace!(kind = %kind, account = %account.key.short(), error = %e, "Decode failed");
	}
	result
}

/// Validates `account` for use as a `kind` provider account.
pub fn validate_account(kind: ProviderKind, account: &AccountInfo) -> Result<(), AdapterError> {
	adapter(kind).validate(account)
}
