//! Program state: feeds, their configuration and their two tables.

pub mod layout;
pub mod mappings;
pub mod prices;
pub mod store;

pub use mappings::MappingTable;
pub use prices::PriceTable;
pub use store::FeedStore;

use crate::ScopeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scope_types::{AccountRef, VaultShareAccounts, MAX_ENTRIES, MAX_FEED_ID_LEN};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration record written once at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
	pub feed_id: String,
	pub admin: AccountRef,
	pub vault_share: Option<VaultShareAccounts>,
}

/// A price feed: its configuration, its mapping table and its price table.
pub struct OracleFeed {
	configuration: Configuration,
	pub(crate) mappings: MappingTable,
	pub(crate) prices: PriceTable,
}

impl OracleFeed {
	/// Creates a feed with `capacity` unset slots in both tables.
	pub fn new(configuration: Configuration, capacity: usize) -> Self {
		Self {
			configuration,
			mappings: MappingTable::new(capacity),
			prices: PriceTable::new(capacity),
		}
	}

	/// Rebuilds a feed from persisted tables, which must have equal sizes.
	pub fn restore(
		configuration: Configuration,
		mappings: MappingTable,
		prices: PriceTable,
	) -> Result<Self, ScopeError> {
		if mappings.capacity() != prices.capacity() {
			return Err(ScopeError::CapacityMismatch {
				prices: prices.capacity(),
				mappings: mappings.capacity(),
			});
		}
		Ok(Self {
			configuration,
			mappings,
			prices,
		})
	}

	pub fn configuration(&self) -> &Configuration {
		&self.configuration
	}

	pub fn feed_id(&self) -> &str {
		&self.configuration.feed_id
	}

	pub fn capacity(&self) -> usize {
		self.prices.capacity()
	}

	/// Read-only view of the mapping table.
	pub fn mappings(&self) -> &MappingTable {
		&self.mappings
	}

	/// Read-only view of the price table.
	pub fn prices(&self) -> &PriceTable {
		&self.prices
	}
}

/// All feeds known to the program, keyed by feed id.
#[derive(Default)]
pub struct ScopeProgram {
	feeds: DashMap<String, Arc<OracleFeed>>,
}

impl ScopeProgram {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates a new feed with [`MAX_ENTRIES`] unset slots.
	pub fn initialize(
		&self,
		feed_id: &str,
		admin: AccountRef,
		vault_share: Option<VaultShareAccounts>,
	) -> Result<Arc<OracleFeed>, ScopeError> {
		validate_feed_id(feed_id)?;
		let configuration = Configuration {
			feed_id: feed_id.to_string(),
			admin,
			vault_share,
		};
		let feed = Arc::new(OracleFeed::new(configuration, MAX_ENTRIES));
		self.insert(feed.clone())?;
		tracing::info!(feed = %feed_id, admin = %admin.short(), capacity = MAX_ENTRIES, "Feed initialized");
		Ok(feed)
	}

	/// Registers an existing feed, e.g. one restored from storage.
	pub fn insert(&self, feed: Arc<OracleFeed>) -> Result<(), ScopeError> {
		match self.feeds.entry(feed.feed_id().to_string()) {
			Entry::Occupied(entry) => Err(ScopeError::AlreadyInitialized(entry.key().clone())),
			Entry::Vacant(entry) => {
				entry.insert(feed);
				Ok(())
			},
		}
	}

	pub fn feed(&self, feed_id: &str) -> Result<Arc<OracleFeed>, ScopeError> {
		self.feeds
			.get(feed_id)
			.map(|feed| feed.value().clone())
			.ok_or_else(|| ScopeError::UnknownFeed(feed_id.to_string()))
	}

	pub fn feed_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.feeds.iter().map(|feed| feed.key().clone()).collect();
		ids.sort();
		ids
	}
}

pub(crate) fn validate_feed_id(feed_id: &str) -> Result<(), ScopeError> {
	if feed_id.is_empty() {
		return Err(ScopeError::InvalidFeedId("feed id cannot be empty".into()));
	}
	if feed_id.len() > MAX_FEED_ID_LEN {
		return Err(ScopeError::InvalidFeedId(format!(
			"'{}' exceeds {} bytes",
			feed_id, MAX_FEED_ID_LEN
		)));
	}
	Ok(())
}
