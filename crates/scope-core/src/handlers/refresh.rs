//! Permissionless price refreshes.
//!
//! A refresh reads one consistent mapping entry, decodes the presented
//! provider account with the adapter for the mapped kind and writes the
//! result into the price table. None of the operations here await, so a
//! refresh is never interrupted half way through a batch.

use crate::program::{OracleFeed, ScopeProgram};
use crate::ScopeError;
use scope_adapters::{AdapterError, DecodeContext, Observation};
use scope_types::{AccountInfo, AccountRef, DatedPrice, MappingEntry, Price, ProviderKind, MAX_BATCH_SIZE};
use std::sync::Arc;

/// Result of a single-slot refresh that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// The slot was written with this entry.
	Updated(DatedPrice),
	/// The provider was not ready; the slot was left untouched.
	Skipped(String),
}

/// Per-slot result inside a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotResult {
	Updated(DatedPrice),
	Skipped(String),
	Failed(ScopeError),
}

impl From<Result<RefreshOutcome, ScopeError>> for SlotResult {
	fn from(result: Result<RefreshOutcome, ScopeError>) -> Self {
		match result {
			Ok(RefreshOutcome::Updated(price)) => SlotResult::Updated(price),
			Ok(RefreshOutcome::Skipped(reason)) => SlotResult::Skipped(reason),
			Err(e) => SlotResult::Failed(e),
		}
	}
}

/// Outcome of a `refresh_many` call, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub results: Vec<(u16, SlotResult)>,
}

impl BatchReport {
	pub fn updated(&self) -> impl Iterator<Item = (u16, &DatedPrice)> {
		self.results.iter().filter_map(|(slot, result)| match result {
			SlotResult::Updated(price) => Some((*slot, price)),
			_ => None,
		})
	}

	pub fn skipped(&self) -> impl Iterator<Item = (u16, &str)> {
		self.results.iter().filter_map(|(slot, result)| match result {
			SlotResult::Skipped(reason) => Some((*slot, reason.as_str())),
			_ => None,
		})
	}

	pub fn failed(&self) -> impl Iterator<Item = (u16, &ScopeError)> {
		self.results.iter().filter_map(|(slot, result)| match result {
			SlotResult::Failed(e) => Some((*slot, e)),
			_ => None,
		})
	}

	pub fn all_updated(&self) -> bool {
		self.updated().count() == self.results.len()
	}
}

/// Result of a vault-share refresh that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultShareOutcome {
	/// The price changed (or the slot was unset before).
	Updated { previous: Price, price: Price },
	/// The same value was written again; only the marker advanced.
	Unchanged(Price),
	Skipped(String),
}

impl OracleFeed {
	fn check_slot(&self, slot: u16) -> Result<(), ScopeError> {
		if usize::from(slot) >= self.capacity() {
			return Err(ScopeError::BadSlot {
				slot,
				capacity: self.capacity(),
			});
		}
		Ok(())
	}

	fn mapping(&self, slot: u16) -> Result<Arc<MappingEntry>, ScopeError> {
		self.mappings.get(slot)?.ok_or(ScopeError::NoMapping(slot))
	}

	fn store_observation(
		&self,
		slot: u16,
		kind: ProviderKind,
		observation: Observation,
		marker: u64,
	) -> Result<(DatedPrice, DatedPrice), ScopeError> {
		let dated = DatedPrice {
			price: observation.price,
			last_updated_marker: marker,
			unix_timestamp: observation.source_timestamp.unwrap_or(0),
			source_kind: Some(kind),
		};
		let previous = self.prices.write(slot, dated)?;
		Ok((previous, dated))
	}

	/// Refreshes one generic slot from its provider account.
	pub fn refresh_one(
		&self,
		slot: u16,
		provider_account: &AccountInfo,
		marker: u64,
	) -> Result<RefreshOutcome, ScopeError> {
		self.check_slot(slot)?;
		let mapping = self.mapping(slot)?;
		let kind = mapping.provider_kind;
		if kind == ProviderKind::VaultShare {
			return Err(ScopeError::KindMismatch(format!(
				"slot {} maps to a vault share and must be refreshed with both vault accounts",
				slot
			)));
		}
		expect_account(slot, &mapping.provider_account, &provider_account.key)?;

		let observation = match scope_adapters::decode(kind, provider_account, &DecodeContext::at_slot(marker)) {
			Ok(observation) => observation,
			Err(e) if e.is_soft() => {
				tracing::debug!(slot, kind = %kind, reason = %e, "Provider not ready");
				return Ok(RefreshOutcome::Skipped(reason(e)));
			},
			Err(e) => return Err(e.into()),
		};

		let (_, dated) = self.store_observation(slot, kind, observation, marker)?;
		tracing::trace!(slot, kind = %kind, price = %dated.price, marker, "Slot written");
		Ok(RefreshOutcome::Updated(dated))
	}

	/// Rejects a batch whose shape is invalid before any slot is touched.
	pub fn check_batch(&self, slots: &[u16], accounts: usize) -> Result<(), ScopeError> {
		if slots.len() > MAX_BATCH_SIZE {
			return Err(ScopeError::BatchTooLarge {
				len: slots.len(),
				max: MAX_BATCH_SIZE,
			});
		}
		if slots.len() != accounts {
			return Err(ScopeError::AccountsAndSlotsMismatch {
				slots: slots.len(),
				accounts,
			});
		}
		slots.iter().try_for_each(|&slot| self.check_slot(slot))
	}

	/// Refreshes up to [`MAX_BATCH_SIZE`] slots, pairing `slots[i]` with `accounts[i]`.
	///
	/// A malformed call is rejected as a whole. Otherwise every slot is
	/// refreshed independently and its result reported in the batch.
	pub fn refresh_many(
		&self,
		slots: &[u16],
		accounts: &[AccountInfo],
		marker: u64,
	) -> Result<BatchReport, ScopeError> {
		self.check_batch(slots, accounts.len())?;

		let results: Vec<(u16, SlotResult)> = slots
			.iter()
			.zip(accounts)
			.map(|(&slot, account)| (slot, SlotResult::from(self.refresh_one(slot, account, marker))))
			.collect();
		Ok(BatchReport { results })
	}

	/// Refreshes a vault-share slot from the configured mint and underlying
	/// token account.
	pub fn refresh_vault_share(
		&self,
		slot: u16,
		mint: &AccountInfo,
		underlying: &AccountInfo,
		marker: u64,
	) -> Result<VaultShareOutcome, ScopeError> {
		self.check_slot(slot)?;
		let mapping = self.mapping(slot)?;
		if mapping.provider_kind != ProviderKind::VaultShare {
			return Err(ScopeError::KindMismatch(format!(
				"slot {} maps to {}, not a vault share",
				slot, mapping.provider_kind
			)));
		}
		let pair = self
			.configuration()
			.vault_share
			.ok_or(ScopeError::VaultShareNotConfigured)?;
		expect_account(slot, &pair.mint, &mint.key)?;
		expect_account(slot, &pair.underlying, &underlying.key)?;

		let observation =
			match scope_adapters::decode_vault_share(mint, underlying, &DecodeContext::at_slot(marker)) {
				Ok(observation) => observation,
				Err(e) if e.is_soft() => return Ok(VaultShareOutcome::Skipped(reason(e))),
				Err(e) => return Err(e.into()),
			};

		let (previous, dated) =
			self.store_observation(slot, ProviderKind::VaultShare, observation, marker)?;
		// The slot is written at this point. Prices too far apart to align
		// cannot be equal, so an overflow reports a change.
		let unchanged = previous.is_set() && previous.price.value_eq(&dated.price).unwrap_or(false);
		if unchanged {
			Ok(VaultShareOutcome::Unchanged(dated.price))
		} else {
			Ok(VaultShareOutcome::Updated {
				previous: previous.price,
				price: dated.price,
			})
		}
	}
}

impl ScopeProgram {
	pub fn refresh_one(
		&self,
		feed_id: &str,
		slot: u16,
		provider_account: &AccountInfo,
		marker: u64,
	) -> Result<RefreshOutcome, ScopeError> {
		self.feed(feed_id)?.refresh_one(slot, provider_account, marker)
	}

	pub fn refresh_many(
		&self,
		feed_id: &str,
		slots: &[u16],
		accounts: &[AccountInfo],
		marker: u64,
	) -> Result<BatchReport, ScopeError> {
		self.feed(feed_id)?.refresh_many(slots, accounts, marker)
	}

	pub fn refresh_vault_share(
		&self,
		feed_id: &str,
		slot: u16,
		mint: &AccountInfo,
		underlying: &AccountInfo,
		marker: u64,
	) -> Result<VaultShareOutcome, ScopeError> {
		self.feed(feed_id)?
			.refresh_vault_share(slot, mint, underlying, marker)
	}
}

fn expect_account(slot: u16, expected: &AccountRef, actual: &AccountRef) -> Result<(), ScopeError> {
	if expected != actual {
		return Err(ScopeError::UnexpectedAccount {
			slot,
			expected: *expected,
			actual: *actual,
		});
	}
	Ok(())
}

fn reason(err: AdapterError) -> String {
	match err {
		AdapterError::NotReady(reason) => reason,
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use scope_adapters::implementations::aggregator_v1::AggregatorV1Account;
	use scope_adapters::implementations::live_aggregator::LiveAggregatorAccount;
	use scope_adapters::implementations::vault_share::{MintAccount, TokenAccount};
	use scope_types::VaultShareAccounts;

	const ADMIN: AccountRef = AccountRef([1; 32]);
	const MINT: AccountRef = AccountRef([0xa0; 32]);
	const UNDERLYING: AccountRef = AccountRef([0xa1; 32]);

	fn feed() -> Arc<OracleFeed> {
		ScopeProgram::new()
			.initialize(
				"hubble",
				ADMIN,
				Some(VaultShareAccounts {
					mint: MINT,
					underlying: UNDERLYING,
				}),
			)
			.unwrap()
	}

	fn live(key: u8, price: i64) -> AccountInfo {
		AccountInfo::new(
			AccountRef::new([key; 32]),
			LiveAggregatorAccount::trading(price, -8, 0).pack(),
		)
	}

	fn map(feed: &OracleFeed, slot: u16, kind: ProviderKind, account: &AccountInfo) {
		feed.update_mapping(&ADMIN, slot, kind, account).unwrap();
	}

	fn vault_accounts(amount: u64, supply: u64) -> (AccountInfo, AccountInfo) {
		(
			AccountInfo::new(MINT, MintAccount::new(supply, 6).pack()),
			AccountInfo::new(
				UNDERLYING,
				TokenAccount::new(AccountRef::new([3; 32]), AccountRef::new([4; 32]), amount).pack(),
			),
		)
	}

	#[test]
	fn test_refresh_one_writes_decoded_price() {
		let feed = feed();
		let account = live(10, 22841550900);
		map(&feed, 3, ProviderKind::LiveAggregator, &account);

		let outcome = feed.refresh_one(3, &account, 100).unwrap();
		let stored = feed.prices().get(3).unwrap();
		assert_eq!(outcome, RefreshOutcome::Updated(stored));
		assert_eq!(stored.price.to_string(), "228.41550900");
		assert_eq!(stored.last_updated_marker, 100);
		assert_eq!(stored.source_kind, Some(ProviderKind::LiveAggregator));
	}

	#[test]
	fn test_refresh_unmapped_slot() {
		assert_eq!(
			feed().refresh_one(4, &live(10, 1), 1),
			Err(ScopeError::NoMapping(4))
		);
	}

	#[test]
	fn test_refresh_with_wrong_account() {
		let feed = feed();
		map(&feed, 3, ProviderKind::LiveAggregator, &live(10, 100));
		assert!(matches!(
			feed.refresh_one(3, &live(11, 100), 1),
			Err(ScopeError::UnexpectedAccount { slot: 3, .. })
		));
	}

	#[test]
	fn test_stale_marker_leaves_slot_untouched() {
		let feed = feed();
		let account = live(10, 100_000_000);
		map(&feed, 0, ProviderKind::LiveAggregator, &account);
		feed.refresh_one(0, &account, 50).unwrap();
		let before = feed.prices().get(0).unwrap();

		let newer = live(10, 200_000_000);
		assert_eq!(
			feed.refresh_one(0, &newer, 49),
			Err(ScopeError::StaleMarker {
				slot: 0,
				stored: 50,
				attempted: 49
			})
		);
		assert_eq!(feed.prices().get(0).unwrap(), before);

		// Equal markers are accepted.
		assert!(feed.refresh_one(0, &newer, 50).is_ok());
	}

	#[test]
	fn test_not_ready_is_a_skip() {
		let feed = feed();
		let account = live(10, 100);
		map(&feed, 0, ProviderKind::LiveAggregator, &account);
		let wide = LiveAggregatorAccount::trading(100, -8, 10);
		let outcome = feed
			.refresh_one(0, &AccountInfo::new(account.key, wide.pack()), 5)
			.unwrap();
		assert!(matches!(outcome, RefreshOutcome::Skipped(_)));
		assert!(!feed.prices().get(0).unwrap().is_set());
	}

	#[test]
	fn test_refresh_many_partial_failure() {
		let feed = feed();
		let mut accounts = Vec::new();
		for slot in 0..5u16 {
			let account = AccountInfo::new(
				AccountRef::new([20 + slot as u8; 32]),
				AggregatorV1Account::new(1000 + i64::from(slot), 3).pack(),
			);
			map(&feed, slot, ProviderKind::AggregatorV1, &account);
			accounts.push(account);
		}
		accounts[2] = AccountInfo::new(accounts[2].key, vec![0u8; 3]);

		let report = feed.refresh_many(&[0, 1, 2, 3, 4], &accounts, 7).unwrap();
		assert_eq!(report.updated().count(), 4);
		let failed: Vec<_> = report.failed().collect();
		assert_eq!(failed.len(), 1);
		assert_eq!(failed[0].0, 2);
		assert!(matches!(failed[0].1, ScopeError::Decode(_)));
		assert!(!feed.prices().get(2).unwrap().is_set());
		assert_eq!(feed.prices().get(4).unwrap().price.to_string(), "1.004");
	}

	#[test]
	fn test_refresh_many_call_shape() {
		let feed = feed();
		let account = live(10, 100);
		let slots: Vec<u16> = (0..=MAX_BATCH_SIZE as u16).collect();
		let accounts = vec![account.clone(); slots.len()];
		assert_eq!(
			feed.refresh_many(&slots, &accounts, 1),
			Err(ScopeError::BatchTooLarge {
				len: MAX_BATCH_SIZE + 1,
				max: MAX_BATCH_SIZE
			})
		);
		assert_eq!(
			feed.refresh_many(&[0, 1], &[account.clone()], 1),
			Err(ScopeError::AccountsAndSlotsMismatch {
				slots: 2,
				accounts: 1
			})
		);

		map(&feed, 0, ProviderKind::LiveAggregator, &account);
		assert!(matches!(
			feed.refresh_many(&[0, 600], &[account.clone(), account.clone()], 1),
			Err(ScopeError::BadSlot { slot: 600, .. })
		));
		// The valid slot was not written either.
		assert!(!feed.prices().get(0).unwrap().is_set());
	}

	#[test]
	fn test_vault_share_refresh() {
		let feed = feed();
		let (mint, underlying) = vault_accounts(1_000_000, 1_000_000);
		map(&feed, 9, ProviderKind::VaultShare, &mint);

		let first = feed.refresh_vault_share(9, &mint, &underlying, 10).unwrap();
		assert_eq!(
			first,
			VaultShareOutcome::Updated {
				previous: Price::default(),
				price: Price::new(100_000_000, 8).unwrap()
			}
		);

		let again = feed.refresh_vault_share(9, &mint, &underlying, 11).unwrap();
		assert!(matches!(again, VaultShareOutcome::Unchanged(_)));
		assert_eq!(feed.prices().get(9).unwrap().last_updated_marker, 11);

		let (mint, richer) = vault_accounts(1_500_000, 1_000_000);
		match feed.refresh_vault_share(9, &mint, &richer, 12).unwrap() {
			VaultShareOutcome::Updated { previous, price } => {
				assert_eq!(previous.to_string(), "1.00000000");
				assert_eq!(price.to_string(), "1.50000000");
			},
			other => panic!("unexpected outcome {:?}", other),
		}
	}

	#[test]
	fn test_vault_share_after_remap_from_high_exponent_price() {
		let feed = feed();
		let account = live(10, 100);
		map(&feed, 4, ProviderKind::LiveAggregator, &account);
		feed.prices()
			.write(
				4,
				DatedPrice {
					price: Price::new(1, 38).unwrap(),
					last_updated_marker: 10,
					unix_timestamp: 0,
					source_kind: Some(ProviderKind::LiveAggregator),
				},
			)
			.unwrap();

		let (mint, underlying) = vault_accounts(1000, 1);
		map(&feed, 4, ProviderKind::VaultShare, &mint);
		let outcome = feed.refresh_vault_share(4, &mint, &underlying, 20).unwrap();

		let stored = feed.prices().get(4).unwrap();
		assert_eq!(
			outcome,
			VaultShareOutcome::Updated {
				previous: Price::new(1, 38).unwrap(),
				price: stored.price
			}
		);
		assert_eq!(stored.price.to_string(), "1000.00000000");
		assert_eq!(stored.last_updated_marker, 20);
		assert_eq!(stored.source_kind, Some(ProviderKind::VaultShare));
	}

	#[test]
	fn test_vault_share_kind_checks() {
		let feed = feed();
		let (mint, underlying) = vault_accounts(1, 1);
		let account = live(10, 100);
		map(&feed, 1, ProviderKind::LiveAggregator, &account);
		map(&feed, 2, ProviderKind::VaultShare, &mint);

		assert!(matches!(
			feed.refresh_vault_share(1, &mint, &underlying, 1),
			Err(ScopeError::KindMismatch(_))
		));
		assert!(matches!(
			feed.refresh_one(2, &mint, 1),
			Err(ScopeError::KindMismatch(_))
		));
		assert!(matches!(
			feed.refresh_vault_share(2, &mint, &account, 1),
			Err(ScopeError::UnexpectedAccount { .. })
		));
		assert!(!feed.prices().get(1).unwrap().is_set());
		assert!(!feed.prices().get(2).unwrap().is_set());
	}
}
