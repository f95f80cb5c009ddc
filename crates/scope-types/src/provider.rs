//! Provider kinds known to the program.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown provider kind: {0}")]
pub struct UnknownProviderKind(pub String);

/// Closed set of price providers, tagged with a stable `u8` used in the
/// persisted mapping region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProviderKind {
	/// Live aggregator feed with confidence and trading status.
	LiveAggregator = 0,
	/// Round-based aggregator, first account format.
	AggregatorV1 = 1,
	/// Round-based aggregator, second account format.
	AggregatorV2 = 2,
	/// Price derived from a lending reserve exchange rate.
	LendingExchangeRate = 3,
	/// Price derived from a stake pool exchange rate.
	StakePoolExchangeRate = 4,
	/// Price derived from a vault's underlying holdings per share.
	VaultShare = 5,
}

impl ProviderKind {
	pub const ALL: [ProviderKind; 6] = [
		ProviderKind::LiveAggregator,
		ProviderKind::AggregatorV1,
		ProviderKind::AggregatorV2,
		ProviderKind::LendingExchangeRate,
		ProviderKind::StakePoolExchangeRate,
		ProviderKind::VaultShare,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ProviderKind::LiveAggregator => "live_aggregator",
			ProviderKind::AggregatorV1 => "aggregator_v1",
			ProviderKind::AggregatorV2 => "aggregator_v2",
			ProviderKind::LendingExchangeRate => "lending_exchange_rate",
			ProviderKind::StakePoolExchangeRate => "stake_pool_exchange_rate",
			ProviderKind::VaultShare => "vault_share",
		}
	}

	/// Vault-share slots are refreshed only through the dedicated operation.
	pub fn is_generic(&self) -> bool {
		!matches!(self, ProviderKind::VaultShare)
	}
}

impl From<ProviderKind> for u8 {
	fn from(kind: ProviderKind) -> Self {
		kind as u8
	}
}

impl TryFrom<u8> for ProviderKind {
	type Error = UnknownProviderKind;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Self::ALL
			.into_iter()
			.find(|kind| *kind as u8 == value)
			.ok_or_else(|| UnknownProviderKind(value.to_string()))
	}
}

impl FromStr for ProviderKind {
	type Err = UnknownProviderKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| UnknownProviderKind(s.to_string()))
	}
}

impl fmt::Display for ProviderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
