//! Configuration module for the Scope price oracle.
//!
//! This module provides structures and utilities for managing oracle configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["tokens.toml", "storage.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders;
mod loader;

pub use builders::config::ConfigBuilder;

use regex::Regex;
use scope_types::{
	AccountRef, ProviderKind, VaultShareAccounts, MAX_BATCH_SIZE, MAX_ENTRIES, MAX_FEED_ID_LEN,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the oracle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity and authority of the price feed.
	pub feed: FeedConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Crank scheduler settings.
	#[serde(default)]
	pub crank: CrankConfig,
	/// Token universe, keyed by price slot.
	#[serde(
		default,
		deserialize_with = "deserialize_tokens",
		serialize_with = "serialize_tokens"
	)]
	pub tokens: TokensConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration of the price feed itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
	/// Feed identifier, at most 32 bytes.
	pub id: String,
	/// Account allowed to update mappings.
	pub admin: AccountRef,
	/// Account pair used to price vault-share slots.
	pub vault_share: Option<VaultShareAccounts>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Crank scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CrankConfig {
	/// Ledger slots between two refresh cycles.
	#[serde(default = "default_refresh_interval_slots")]
	pub refresh_interval_slots: u64,
	/// Duration of one ledger slot in milliseconds.
	#[serde(default = "default_ms_per_slot")]
	pub ms_per_slot: u64,
	/// Maximum number of slots per refresh call.
	#[serde(default = "default_batch_limit")]
	pub batch_limit: usize,
	/// Retries of a failed refresh call before it is logged and skipped.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Delay before the first retry; doubles on each further attempt.
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Upper bound on the retry delay.
	#[serde(default = "default_max_retry_delay_ms")]
	pub max_retry_delay_ms: u64,
	/// Age in slots below which a price is not refreshed. Unset means
	/// every mapped slot is refreshed on every cycle.
	#[serde(default)]
	pub default_max_age: Option<u64>,
	/// Prices older than this many slots are reported after each cycle.
	#[serde(default = "default_stale_warning_slots")]
	pub stale_warning_slots: u64,
	/// Report stale prices at error level instead of warning.
	#[serde(default)]
	pub stale_is_error: bool,
}

impl Default for CrankConfig {
	fn default() -> Self {
		Self {
			refresh_interval_slots: default_refresh_interval_slots(),
			ms_per_slot: default_ms_per_slot(),
			batch_limit: default_batch_limit(),
			max_retries: default_max_retries(),
			retry_delay_ms: default_retry_delay_ms(),
			max_retry_delay_ms: default_max_retry_delay_ms(),
			default_max_age: None,
			stale_warning_slots: default_stale_warning_slots(),
			stale_is_error: false,
		}
	}
}

fn default_refresh_interval_slots() -> u64 {
	10
}

fn default_ms_per_slot() -> u64 {
	scope_types::utils::DEFAULT_MS_PER_SLOT
}

fn default_batch_limit() -> usize {
	MAX_BATCH_SIZE
}

fn default_max_retries() -> u32 {
	3
}

fn default_retry_delay_ms() -> u64 {
	500
}

fn default_max_retry_delay_ms() -> u64 {
	5_000
}

/// Roughly one minute of slots.
fn default_stale_warning_slots() -> u64 {
	150
}

/// A token priced by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenConfig {
	/// Human-readable name used in logs.
	pub label: Option<String>,
	/// Provider kind decoding the account.
	pub kind: ProviderKind,
	/// Provider account; the share mint for vault shares.
	pub account: AccountRef,
	/// Per-token override of `crank.default_max_age`.
	pub max_age: Option<u64>,
}

impl TokenConfig {
	/// Label for logs, falling back to the slot number.
	pub fn display_name(&self, slot: u16) -> String {
		self.label.clone().unwrap_or_else(|| format!("slot-{}", slot))
	}
}

/// Tokens keyed by price slot.
pub type TokensConfig = BTreeMap<u16, TokenConfig>;

/// Deserializes `[tokens.<slot>]` tables, whose keys are TOML strings.
fn deserialize_tokens<'de, D>(deserializer: D) -> Result<TokensConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: BTreeMap<String, TokenConfig> = BTreeMap::deserialize(deserializer)?;
	let mut result = BTreeMap::new();

	for (key, value) in string_map {
		let slot = key
			.parse::<u16>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid token slot '{}': {}", key, e)))?;
		result.insert(slot, value);
	}

	Ok(result)
}

fn serialize_tokens<S>(tokens: &TokensConfig, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let string_map: BTreeMap<String, &TokenConfig> = tokens
		.iter()
		.map(|(slot, token)| (slot.to_string(), token))
		.collect();
	string_map.serialize(serializer)
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// Supports `include = [...]` directives; each top-level section must be
	/// unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Effective max age of a slot: the token override, else the crank default.
	pub fn max_age(&self, slot: u16) -> Option<u64> {
		self.tokens
			.get(&slot)
			.and_then(|token| token.max_age)
			.or(self.crank.default_max_age)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.feed.id.is_empty() {
			return Err(ConfigError::Validation("Feed id cannot be empty".into()));
		}
		if self.feed.id.len() > MAX_FEED_ID_LEN {
			return Err(ConfigError::Validation(format!(
				"Feed id '{}' exceeds {} bytes",
				self.feed.id, MAX_FEED_ID_LEN
			)));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		self.validate_crank()?;
		self.validate_tokens()?;

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
		}

		Ok(())
	}

	fn validate_crank(&self) -> Result<(), ConfigError> {
		let crank = &self.crank;
		if crank.refresh_interval_slots == 0 {
			return Err(ConfigError::Validation(
				"crank.refresh_interval_slots must be greater than 0".into(),
			));
		}
		if crank.ms_per_slot == 0 {
			return Err(ConfigError::Validation(
				"crank.ms_per_slot must be greater than 0".into(),
			));
		}
		if crank.batch_limit == 0 || crank.batch_limit > MAX_BATCH_SIZE {
			return Err(ConfigError::Validation(format!(
				"crank.batch_limit must be between 1 and {}",
				MAX_BATCH_SIZE
			)));
		}
		if crank.retry_delay_ms > crank.max_retry_delay_ms {
			return Err(ConfigError::Validation(
				"crank.retry_delay_ms cannot exceed crank.max_retry_delay_ms".into(),
			));
		}
		Ok(())
	}

	fn validate_tokens(&self) -> Result<(), ConfigError> {
		for (slot, token) in &self.tokens {
			if usize::from(*slot) >= MAX_ENTRIES {
				return Err(ConfigError::Validation(format!(
					"Token slot {} is out of range (capacity {})",
					slot, MAX_ENTRIES
				)));
			}
			if token.kind == ProviderKind::VaultShare {
				let Some(vault_share) = &self.feed.vault_share else {
					return Err(ConfigError::Validation(format!(
						"Token {} is a vault share but [feed.vault_share] is not configured",
						token.display_name(*slot)
					)));
				};
				if vault_share.mint != token.account {
					return Err(ConfigError::Validation(format!(
						"Token {} must use the configured vault share mint {}",
						token.display_name(*slot),
						vault_share.mint
					)));
				}
			}
		}
		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
