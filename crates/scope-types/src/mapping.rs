//! Slot mapping entries and the vault-share account pair.

use crate::{AccountRef, ProviderKind};
use serde::{Deserialize, Serialize};

/// Which provider, and which provider account, feeds a price slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
	pub provider_kind: ProviderKind,
	pub provider_account: AccountRef,
}

impl MappingEntry {
	pub fn new(provider_kind: ProviderKind, provider_account: AccountRef) -> Self {
		Self {
			provider_kind,
			provider_account,
		}
	}
}

/// The globally known account pair a vault share is priced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultShareAccounts {
	/// Share mint, whose supply is the denominator.
	pub mint: AccountRef,
	/// Token account holding the vault's underlying tokens.
	pub underlying: AccountRef,
}
