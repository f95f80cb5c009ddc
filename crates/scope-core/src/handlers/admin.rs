//! Mapping administration.

use crate::program::{OracleFeed, ScopeProgram};
use crate::ScopeError;
use scope_types::{AccountInfo, AccountRef, MappingEntry, ProviderKind};
use tracing::instrument;

impl OracleFeed {
	/// Points `slot` at a provider account.
	///
	/// The entry is overwritten unconditionally. The price table is left as
	/// is, so a remapped slot keeps its old price until its next refresh.
	#[instrument(skip_all, fields(feed = %self.feed_id(), slot = slot, kind = %kind))]
	pub fn update_mapping(
		&self,
		signer: &AccountRef,
		slot: u16,
		kind: ProviderKind,
		provider_account: &AccountInfo,
	) -> Result<Option<MappingEntry>, ScopeError> {
		if *signer != self.configuration().admin {
			return Err(ScopeError::Unauthorized(*signer));
		}
		if usize::from(slot) >= self.capacity() {
			return Err(ScopeError::BadSlot {
				slot,
				capacity: self.capacity(),
			});
		}

		if kind == ProviderKind::VaultShare {
			let pair = self
				.configuration()
				.vault_share
				.ok_or(ScopeError::VaultShareNotConfigured)?;
			if provider_account.key != pair.mint {
				return Err(ScopeError::UnexpectedAccount {
					slot,
					expected: pair.mint,
					actual: provider_account.key,
				});
			}
		} else {
			scope_adapters::validate_account(kind, provider_account)?;
		}

		let entry = MappingEntry::new(kind, provider_account.key);
		let previous = self.mappings.set(slot, entry)?;
		tracing::info!(account = %provider_account.key.short(), replaced = previous.is_some(), "Mapping updated");
		Ok(previous.map(|entry| *entry))
	}
}

impl ScopeProgram {
	pub fn update_mapping(
		&self,
		feed_id: &str,
		signer: &AccountRef,
		slot: u16,
		kind: ProviderKind,
		provider_account: &AccountInfo,
	) -> Result<Option<MappingEntry>, ScopeError> {
		self.feed(feed_id)?
			.update_mapping(signer, slot, kind, provider_account)
	}
}
