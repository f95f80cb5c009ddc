//! Configuration builder for tests and embedded use.
//!
//! Produces a valid in-memory [`Config`] without going through TOML.

use crate::{
	ApiConfig, Config, CrankConfig, FeedConfig, StorageConfig, TokenConfig, TokensConfig,
};
use scope_types::{AccountRef, ProviderKind, VaultShareAccounts};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	feed_id: String,
	admin: AccountRef,
	vault_share: Option<VaultShareAccounts>,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	crank: CrankConfig,
	tokens: TokensConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a builder for feed `"test-feed"` on memory storage.
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);
		Self {
			feed_id: "test-feed".to_string(),
			admin: AccountRef::new([1u8; 32]),
			vault_share: None,
			storage_primary: "memory".to_string(),
			storage_implementations,
			crank: CrankConfig::default(),
			tokens: TokensConfig::new(),
			api: None,
		}
	}

	pub fn feed_id(mut self, id: impl Into<String>) -> Self {
		self.feed_id = id.into();
		self
	}

	pub fn admin(mut self, admin: AccountRef) -> Self {
		self.admin = admin;
		self
	}

	pub fn vault_share(mut self, mint: AccountRef, underlying: AccountRef) -> Self {
		self.vault_share = Some(VaultShareAccounts { mint, underlying });
		self
	}

	/// Uses file storage rooted at `path` as primary.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage_implementations
			.insert("file".to_string(), toml::Value::Table(table));
		self.storage_primary = "file".to_string();
		self
	}

	pub fn crank(mut self, crank: CrankConfig) -> Self {
		self.crank = crank;
		self
	}

	/// Adds a token at `slot`.
	pub fn token(mut self, slot: u16, kind: ProviderKind, account: AccountRef) -> Self {
		self.tokens.insert(
			slot,
			TokenConfig {
				label: None,
				kind,
				account,
				max_age: None,
			},
		);
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			feed: FeedConfig {
				id: self.feed_id,
				admin: self.admin,
				vault_share: self.vault_share,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			crank: self.crank,
			tokens: self.tokens,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_is_valid() {
		let mint = AccountRef::new([8u8; 32]);
		let config = ConfigBuilder::new()
			.feed_id("hubble")
			.vault_share(mint, AccountRef::new([9u8; 32]))
			.token(0, ProviderKind::LiveAggregator, AccountRef::new([2u8; 32]))
			.token(1, ProviderKind::VaultShare, mint)
			.build();
		assert!(config.validate().is_ok());
		assert_eq!(config.tokens.len(), 2);
	}

	#[test]
	fn test_file_storage_becomes_primary() {
		let config = ConfigBuilder::new().file_storage("/tmp/scope").build();
		assert_eq!(config.storage.primary, "file");
		assert!(config.validate().is_ok());
	}
}
