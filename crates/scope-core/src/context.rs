//! Feed-level operations driven by configuration.
//!
//! [`ScopeContext`] ties the configuration to the program and its store and
//! backs every subcommand of the binary.

use crate::engine::clock::Clock;
use crate::engine::event_bus::EventBus;
use crate::engine::CrankEngine;
use crate::program::{FeedStore, OracleFeed, ScopeProgram};
use crate::transport::LocalTransport;
use crate::ScopeError;
use scope_config::{Config, TokenConfig, TokensConfig};
use scope_types::{AccountInfo, AccountRef, Price, ProviderKind};
use serde::Serialize;
use std::sync::Arc;

/// One mapped slot and its current price, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceRow {
	pub slot: u16,
	pub token: String,
	pub kind: ProviderKind,
	pub account: AccountRef,
	/// `None` until the slot has been refreshed once.
	pub price: Option<Price>,
	pub value: Option<String>,
	pub last_updated_marker: u64,
	pub unix_timestamp: u64,
}

pub struct ScopeContext {
	config: Config,
	program: Arc<ScopeProgram>,
	store: FeedStore,
}

impl ScopeContext {
	pub fn new(config: Config, program: Arc<ScopeProgram>, store: FeedStore) -> Self {
		Self {
			config,
			program,
			store,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn program(&self) -> &Arc<ScopeProgram> {
		&self.program
	}

	pub fn store(&self) -> &FeedStore {
		&self.store
	}

	fn feed_id(&self) -> &str {
		&self.config.feed.id
	}

	/// Creates the configured feed and persists it.
	pub async fn init_feed(&self) -> Result<Arc<OracleFeed>, ScopeError> {
		if self.store.exists(self.feed_id()).await? {
			return Err(ScopeError::AlreadyInitialized(self.feed_id().to_string()));
		}
		let feed = self.program.initialize(
			self.feed_id(),
			self.config.feed.admin,
			self.config.feed.vault_share,
		)?;
		self.store.save(&feed).await?;
		Ok(feed)
	}

	/// The configured feed, loaded from the store on first use.
	pub async fn feed(&self) -> Result<Arc<OracleFeed>, ScopeError> {
		self.store.load_into(&self.program, self.feed_id()).await
	}

	/// Maps every configured token, signing as `signer`.
	///
	/// Provider accounts must already be in the account store. Returns the
	/// slots that were written.
	pub async fn upload_mappings(&self, signer: &AccountRef) -> Result<Vec<u16>, ScopeError> {
		let feed = self.feed().await?;
		let mut written = Vec::with_capacity(self.config.tokens.len());
		for (&slot, token) in &self.config.tokens {
			let account = self.mapping_account(token).await?;
			feed.update_mapping(signer, slot, token.kind, &account)?;
			written.push(slot);
		}
		self.store.save_mappings(&feed).await?;
		tracing::info!(feed = %self.feed_id(), slots = written.len(), "Mappings uploaded");
		Ok(written)
	}

	async fn mapping_account(&self, token: &TokenConfig) -> Result<AccountInfo, ScopeError> {
		match self.store.load_account(&token.account).await? {
			Some(account) => Ok(account),
			// Vault-share mappings only check the mint key.
			None if token.kind == ProviderKind::VaultShare => {
				Ok(AccountInfo::new(token.account, Vec::<u8>::new()))
			},
			None => Err(ScopeError::Storage(format!(
				"account {} is not in the account store",
				token.account
			))),
		}
	}

	/// The on-ledger mapping table expressed as token configuration.
	///
	/// Labels and max ages are carried over from the local configuration.
	pub async fn download_mappings(&self) -> Result<TokensConfig, ScopeError> {
		let feed = self.feed().await?;
		Ok(feed
			.mappings()
			.mapped()
			.into_iter()
			.map(|(slot, entry)| {
				let local = self.config.tokens.get(&slot);
				let token = TokenConfig {
					label: local.and_then(|token| token.label.clone()),
					kind: entry.provider_kind,
					account: entry.provider_account,
					max_age: local.and_then(|token| token.max_age),
				};
				(slot, token)
			})
			.collect())
	}

	/// Prices of all mapped slots, in slot order.
	pub async fn price_rows(&self) -> Result<Vec<PriceRow>, ScopeError> {
		let feed = self.feed().await?;
		let mut rows = Vec::new();
		for (slot, entry) in feed.mappings().mapped() {
			let dated = feed.prices().get(slot)?;
			let price = dated.is_set().then_some(dated.price);
			rows.push(PriceRow {
				slot,
				token: self.token_name(slot),
				kind: entry.provider_kind,
				account: entry.provider_account,
				price,
				value: price.map(|price| price.to_string()),
				last_updated_marker: dated.last_updated_marker,
				unix_timestamp: dated.unix_timestamp,
			});
		}
		Ok(rows)
	}

	/// Every account a refresh of this feed reads, without duplicates.
	pub async fn pubkeys(&self) -> Result<Vec<AccountRef>, ScopeError> {
		let feed = self.feed().await?;
		let mut keys: Vec<AccountRef> = feed
			.mappings()
			.mapped()
			.into_iter()
			.map(|(_, entry)| entry.provider_account)
			.collect();
		if let Some(pair) = feed.configuration().vault_share {
			keys.push(pair.mint);
			keys.push(pair.underlying);
		}
		keys.sort();
		keys.dedup();
		Ok(keys)
	}

	/// A crank over the configured feed, refreshing through the local store.
	pub async fn crank_engine(&self, clock: Arc<dyn Clock>) -> Result<CrankEngine, ScopeError> {
		let feed = self.feed().await?;
		let transport = LocalTransport::new(feed, self.store.clone(), clock.clone());
		Ok(CrankEngine::new(
			self.config.clone(),
			Arc::new(transport),
			clock,
			EventBus::new(1000),
		))
	}

	fn token_name(&self, slot: u16) -> String {
		self.config
			.tokens
			.get(&slot)
			.map(|token| token.display_name(slot))
			.unwrap_or_else(|| format!("slot-{}", slot))
	}
}
