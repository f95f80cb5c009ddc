//! The seam between the crank and the program it drives.

use crate::engine::clock::Clock;
use crate::handlers::{BatchReport, SlotResult, VaultShareOutcome};
use crate::program::{FeedStore, OracleFeed};
use crate::ScopeError;
use async_trait::async_trait;
use scope_types::{AccountInfo, AccountRef, DatedPrice, MappingEntry};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("Account {0} not found")]
	AccountNotFound(AccountRef),
	#[error("Call rejected: {0}")]
	Rejected(#[from] ScopeError),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl TransportError {
	/// Rejections are deterministic; repeating the same call cannot succeed.
	pub fn is_retryable(&self) -> bool {
		!matches!(self, TransportError::Rejected(_))
	}
}

/// Submits refresh calls for one feed and reads back its tables.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
	/// Currently mapped slots, in slot order.
	async fn mapped_slots(&self) -> Result<Vec<(u16, MappingEntry)>, TransportError>;

	/// A copy of the whole price table.
	async fn prices(&self) -> Result<Vec<DatedPrice>, TransportError>;

	/// Refreshes generic slots, pairing `slots[i]` with `accounts[i]`.
	async fn refresh_many(
		&self,
		slots: &[u16],
		accounts: &[AccountRef],
	) -> Result<BatchReport, TransportError>;

	/// Refreshes a vault-share slot from the feed's configured accounts.
	async fn refresh_vault_share(&self, slot: u16) -> Result<VaultShareOutcome, TransportError>;
}

/// Calls an in-process feed, reading provider accounts from the account store.
///
/// The clock's current slot is used as the marker of every call, and the
/// price region is persisted after each call that reached the program.
pub struct LocalTransport {
	feed: Arc<OracleFeed>,
	store: FeedStore,
	clock: Arc<dyn Clock>,
}

impl LocalTransport {
	pub fn new(feed: Arc<OracleFeed>, store: FeedStore, clock: Arc<dyn Clock>) -> Self {
		Self { feed, store, clock }
	}

	async fn account(&self, key: &AccountRef) -> Result<AccountInfo, TransportError> {
		self.store
			.load_account(key)
			.await
			.map_err(|e| TransportError::Storage(e.to_string()))?
			.ok_or(TransportError::AccountNotFound(*key))
	}

	async fn persist(&self) -> Result<(), TransportError> {
		self.store
			.save_prices(&self.feed)
			.await
			.map_err(|e| TransportError::Storage(e.to_string()))
	}
}

#[async_trait]
impl RefreshTransport for LocalTransport {
	async fn mapped_slots(&self) -> Result<Vec<(u16, MappingEntry)>, TransportError> {
		Ok(self.feed.mappings().mapped())
	}

	async fn prices(&self) -> Result<Vec<DatedPrice>, TransportError> {
		Ok(self.feed.prices().snapshot())
	}

	async fn refresh_many(
		&self,
		slots: &[u16],
		accounts: &[AccountRef],
	) -> Result<BatchReport, TransportError> {
		self.feed.check_batch(slots, accounts.len())?;

		// A slot whose account is missing fails on its own; the rest of the
		// batch still goes through.
		let mut lookups = Vec::with_capacity(accounts.len());
		for key in accounts {
			lookups.push(match self.account(key).await {
				Ok(info) => Ok(info),
				Err(TransportError::AccountNotFound(key)) => Err(key),
				Err(e) => return Err(e),
			});
		}
		let (present_slots, present): (Vec<u16>, Vec<AccountInfo>) = slots
			.iter()
			.zip(&lookups)
			.filter_map(|(&slot, lookup)| lookup.as_ref().ok().map(|info| (slot, info.clone())))
			.unzip();

		let mut refreshed = if present.is_empty() {
			Vec::new().into_iter()
		} else {
			let marker = self.clock.current_slot();
			let report = self.feed.refresh_many(&present_slots, &present, marker)?;
			self.persist().await?;
			report.results.into_iter()
		};

		let mut results = Vec::with_capacity(slots.len());
		for (&slot, lookup) in slots.iter().zip(&lookups) {
			match lookup {
				Ok(_) => results.extend(refreshed.next()),
				Err(key) => {
					tracing::warn!(slot, account = %key, "Provider account not found");
					results.push((slot, SlotResult::Failed(ScopeError::AccountNotFound(*key))));
				},
			}
		}
		Ok(BatchReport { results })
	}

	async fn refresh_vault_share(&self, slot: u16) -> Result<VaultShareOutcome, TransportError> {
		let pair = self
			.feed
			.configuration()
			.vault_share
			.ok_or(ScopeError::VaultShareNotConfigured)?;
		let mint = self.account(&pair.mint).await?;
		let underlying = self.account(&pair.underlying).await?;
		let marker = self.clock.current_slot();
		let outcome = self
			.feed
			.refresh_vault_share(slot, &mint, &underlying, marker)?;
		self.persist().await?;
		Ok(outcome)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::clock::ManualClock;
	use crate::program::ScopeProgram;
	use scope_adapters::implementations::aggregator_v2::AggregatorV2Account;
	use scope_storage::implementations::memory::MemoryStorage;
	use scope_storage::StorageService;
	use scope_types::ProviderKind;

	#[tokio::test]
	async fn test_local_transport_refreshes_and_persists() {
		let admin = AccountRef::new([1; 32]);
		let store = FeedStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let feed = ScopeProgram::new().initialize("hubble", admin, None).unwrap();
		let account = AccountInfo::new(AccountRef::new([2; 32]), AggregatorV2Account::new(31415, 4).pack());
		feed.update_mapping(&admin, 5, ProviderKind::AggregatorV2, &account)
			.unwrap();
		store.store_account(&account).await.unwrap();
		store.save(&feed).await.unwrap();

		let clock = Arc::new(ManualClock::new(900, 400));
		let transport = LocalTransport::new(feed.clone(), store.clone(), clock);
		let report = transport.refresh_many(&[5], &[account.key]).await.unwrap();
		assert!(report.all_updated());

		let reloaded = store.load("hubble").await.unwrap();
		let price = reloaded.prices().get(5).unwrap();
		assert_eq!(price.price.to_string(), "3.1415");
		assert_eq!(price.last_updated_marker, 900);
	}

	#[tokio::test]
	async fn test_missing_account_fails_only_its_slot() {
		let admin = AccountRef::new([1; 32]);
		let store = FeedStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let feed = ScopeProgram::new().initialize("hubble", admin, None).unwrap();
		let stored = AccountInfo::new(AccountRef::new([2; 32]), AggregatorV2Account::new(5, 0).pack());
		let absent = AccountInfo::new(AccountRef::new([3; 32]), AggregatorV2Account::new(7, 0).pack());
		let later = AccountInfo::new(AccountRef::new([4; 32]), AggregatorV2Account::new(9, 0).pack());
		for (slot, account) in [(0, &stored), (1, &absent), (2, &later)] {
			feed.update_mapping(&admin, slot, ProviderKind::AggregatorV2, account)
				.unwrap();
		}
		store.store_account(&stored).await.unwrap();
		store.store_account(&later).await.unwrap();
		store.save(&feed).await.unwrap();

		let transport = LocalTransport::new(feed.clone(), store.clone(), Arc::new(ManualClock::new(50, 400)));
		let report = transport
			.refresh_many(&[0, 1, 2], &[stored.key, absent.key, later.key])
			.await
			.unwrap();

		let order: Vec<u16> = report.results.iter().map(|(slot, _)| *slot).collect();
		assert_eq!(order, vec![0, 1, 2]);
		assert_eq!(report.updated().count(), 2);
		let failed: Vec<_> = report.failed().collect();
		assert_eq!(failed, vec![(1, &ScopeError::AccountNotFound(absent.key))]);
		assert!(!feed.prices().get(1).unwrap().is_set());

		let reloaded = store.load("hubble").await.unwrap();
		assert_eq!(reloaded.prices().get(0).unwrap().price.to_string(), "5");
		assert_eq!(reloaded.prices().get(2).unwrap().last_updated_marker, 50);
	}

	#[tokio::test]
	async fn test_missing_account() {
		let store = FeedStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))));
		let feed = ScopeProgram::new()
			.initialize("hubble", AccountRef::default(), None)
			.unwrap();
		let transport = LocalTransport::new(feed, store, Arc::new(ManualClock::new(0, 400)));
		let missing = AccountRef::new([3; 32]);
		let report = transport.refresh_many(&[0], &[missing]).await.unwrap();
		assert_eq!(
			report.results,
			vec![(0, SlotResult::Failed(ScopeError::AccountNotFound(missing)))]
		);
		assert!(matches!(
			transport.refresh_many(&[0, 1], &[missing]).await,
			Err(TransportError::Rejected(ScopeError::AccountsAndSlotsMismatch { .. }))
		));
		assert!(matches!(
			transport.refresh_vault_share(0).await,
			Err(TransportError::Rejected(ScopeError::VaultShareNotConfigured))
		));
	}
}
