//! Assembly of storage, program state and the crank from configuration.
//!
//! Storage backends are created through factory functions keyed by
//! implementation name, so binaries decide which backends are linked in.

use crate::context::ScopeContext;
use crate::program::{FeedStore, ScopeProgram};
use crate::ScopeError;
use scope_config::Config;
use scope_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
	#[error("Program error: {0}")]
	Program(#[from] ScopeError),
}

/// Factory functions for every pluggable component.
pub struct ScopeFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

impl<SF> ScopeFactories<SF> {
	pub fn new(storage_factories: HashMap<String, SF>) -> Self {
		Self { storage_factories }
	}
}

pub struct ScopeBuilder {
	config: Config,
}

impl ScopeBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates the primary storage backend and the program around it.
	pub fn build<SF>(self, factories: ScopeFactories<SF>) -> Result<ScopeContext, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"no valid storage implementations available".into(),
			));
		}

		let primary = &self.config.storage.primary;
		let backend = storage_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let store = FeedStore::new(Arc::new(StorageService::new(backend)));
		Ok(ScopeContext::new(self.config, Arc::new(ScopeProgram::new()), store))
	}
}
