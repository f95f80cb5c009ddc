//! Persistence of feeds and provider accounts.
//!
//! A feed is stored as three records under its id: the JSON configuration
//! and the two binary regions. Provider accounts are stored as raw bytes
//! keyed by their hex reference.

use super::{layout, Configuration, MappingTable, OracleFeed, PriceTable};
use crate::ScopeError;
use scope_storage::{StorageError, StorageService};
use scope_types::{AccountInfo, AccountRef, StorageKey};
use std::sync::Arc;

#[derive(Clone)]
pub struct FeedStore {
	storage: Arc<StorageService>,
}

impl FeedStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub async fn exists(&self, feed_id: &str) -> Result<bool, ScopeError> {
		Ok(self
			.storage
			.exists(StorageKey::Configurations.as_str(), feed_id)
			.await?)
	}

	/// Writes the configuration record and both regions.
	pub async fn save(&self, feed: &OracleFeed) -> Result<(), ScopeError> {
		self.storage
			.store(
				StorageKey::Configurations.as_str(),
				feed.feed_id(),
				feed.configuration(),
			)
			.await?;
		self.save_mappings(feed).await?;
		self.save_prices(feed).await
	}

	pub async fn save_prices(&self, feed: &OracleFeed) -> Result<(), ScopeError> {
		let region = layout::encode_prices(&feed.prices().snapshot())?;
		self.storage
			.store_bytes(StorageKey::Prices.as_str(), feed.feed_id(), region)
			.await?;
		Ok(())
	}

	pub async fn save_mappings(&self, feed: &OracleFeed) -> Result<(), ScopeError> {
		let region = layout::encode_mappings(&feed.mappings().snapshot())?;
		self.storage
			.store_bytes(StorageKey::Mappings.as_str(), feed.feed_id(), region)
			.await?;
		Ok(())
	}

	/// Loads a feed previously written by [`FeedStore::save`].
	pub async fn load(&self, feed_id: &str) -> Result<OracleFeed, ScopeError> {
		let configuration: Configuration = self
			.storage
			.retrieve(StorageKey::Configurations.as_str(), feed_id)
			.await
			.map_err(|e| not_found_as(e, || ScopeError::UnknownFeed(feed_id.to_string())))?;

		let mappings = self
			.storage
			.retrieve_bytes(StorageKey::Mappings.as_str(), feed_id)
			.await?;
		let prices = self
			.storage
			.retrieve_bytes(StorageKey::Prices.as_str(), feed_id)
			.await?;

		let feed = OracleFeed::restore(
			configuration,
			MappingTable::from_entries(layout::decode_mappings(&mappings)?),
			PriceTable::from_entries(layout::decode_prices(&prices)?),
		)?;
		tracing::debug!(feed = %feed_id, mapped = feed.mappings().mapped().len(), "Feed loaded");
		Ok(feed)
	}

	/// Loads a feed into `program` unless it is already registered there.
	pub async fn load_into(
		&self,
		program: &super::ScopeProgram,
		feed_id: &str,
	) -> Result<Arc<OracleFeed>, ScopeError> {
		if let Ok(feed) = program.feed(feed_id) {
			return Ok(feed);
		}
		let feed = Arc::new(self.load(feed_id).await?);
		program.insert(feed.clone())?;
		Ok(feed)
	}

	pub async fn list_feeds(&self) -> Result<Vec<String>, ScopeError> {
		Ok(self
			.storage
			.list(StorageKey::Configurations.as_str())
			.await?)
	}

	pub async fn store_account(&self, account: &AccountInfo) -> Result<(), ScopeError> {
		self.storage
			.store_bytes(
				StorageKey::Accounts.as_str(),
				&account.key.to_hex(),
				account.data.to_vec(),
			)
			.await?;
		Ok(())
	}

	/// Fetches an account snapshot; `Ok(None)` if it was never stored.
	pub async fn load_account(&self, key: &AccountRef) -> Result<Option<AccountInfo>, ScopeError> {
		match self
			.storage
			.retrieve_bytes(StorageKey::Accounts.as_str(), &key.to_hex())
			.await
		{
			Ok(data) => Ok(Some(AccountInfo::new(*key, data))),
			Err(StorageError::NotFound(_)) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	pub async fn list_accounts(&self) -> Result<Vec<AccountRef>, ScopeError> {
		let ids = self.storage.list(StorageKey::Accounts.as_str()).await?;
		let mut accounts = Vec::with_capacity(ids.len());
		for id in ids {
			match id.parse::<AccountRef>() {
				Ok(key) => accounts.push(key),
				Err(e) => tracing::warn!(id = %id, error = %e, "Skipping malformed account key"),
			}
		}
		Ok(accounts)
	}
}

fn not_found_as(err: StorageError, f: impl FnOnce() -> ScopeError) -> ScopeError {
	match err {
		StorageError::NotFound(_) => f(),
		other => other.into(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::program::ScopeProgram;
	use scope_storage::implementations::memory::MemoryStorage;
	use scope_types::{DatedPrice, MappingEntry, Price, ProviderKind, MAX_ENTRIES};

	fn store() -> FeedStore {
		FeedStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_save_and_load_feed() {
		let store = store();
		let program = ScopeProgram::new();
		let feed = program
			.initialize("hubble", AccountRef::new([1; 32]), None)
			.unwrap();
		let mapping = MappingEntry::new(ProviderKind::AggregatorV1, AccountRef::new([9; 32]));
		feed.mappings().set(3, mapping).unwrap();
		feed.prices()
			.write(
				3,
				DatedPrice {
					price: Price::new(150, 2).unwrap(),
					last_updated_marker: 12,
					unix_timestamp: 0,
					source_kind: Some(ProviderKind::AggregatorV1),
				},
			)
			.unwrap();

		store.save(&feed).await.unwrap();
		assert!(store.exists("hubble").await.unwrap());
		assert_eq!(store.list_feeds().await.unwrap(), vec!["hubble"]);

		let loaded = store.load("hubble").await.unwrap();
		assert_eq!(loaded.configuration(), feed.configuration());
		assert_eq!(loaded.capacity(), MAX_ENTRIES);
		assert_eq!(loaded.mappings().mapped(), vec![(3, mapping)]);
		assert_eq!(loaded.prices().get(3).unwrap().last_updated_marker, 12);
	}

	#[tokio::test]
	async fn test_load_unknown_feed() {
		assert!(matches!(
			store().load("missing").await,
			Err(ScopeError::UnknownFeed(_))
		));
	}

	#[tokio::test]
	async fn test_accounts() {
		let store = store();
		let key = AccountRef::new([4; 32]);
		assert!(store.load_account(&key).await.unwrap().is_none());

		store
			.store_account(&AccountInfo::new(key, vec![1u8, 2, 3]))
			.await
			.unwrap();
		let account = store.load_account(&key).await.unwrap().unwrap();
		assert_eq!(account.data.as_ref(), &[1, 2, 3]);
		assert_eq!(store.list_accounts().await.unwrap(), vec![key]);
	}
}
