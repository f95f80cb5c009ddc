//! Multi-file configuration loading.
//!
//! The main file may name other files under `include` (a string or an array
//! of strings, relative to the main file's directory). Their top-level
//! sections are merged into one document; a section may only be defined once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Reads a main file plus its includes into a single [`Config`].
pub struct ConfigLoader {
	base_path: PathBuf,
	seen: HashSet<PathBuf>,
	/// Section name to the file that defined it.
	owners: BTreeMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			seen: HashSet::new(),
			owners: BTreeMap::new(),
		}
	}

	pub async fn load_config(&mut self, config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let main_path = self.locate(config_path.as_ref())?;
		let mut document = self.read_document(&main_path).await?;
		let includes = take_includes(&mut document)?;
		self.claim_sections(&document, &main_path)?;

		for include in includes {
			let path = self.locate(&include)?;
			let included = self.read_document(&path).await?;
			self.claim_sections(&included, &path)?;
			if let (Some(target), toml::Value::Table(source)) = (document.as_table_mut(), included) {
				target.extend(source);
			}
		}

		let merged = toml::to_string(&document)
			.map_err(|e| ConfigError::Parse(format!("Failed to serialize combined config: {}", e)))?;
		merged.parse()
	}

	/// Reads one file, substituting `${VAR}` references before parsing.
	async fn read_document(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.seen.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let raw = tokio::fs::read_to_string(path).await?;
		Ok(toml::from_str(&resolve_env_vars(&raw)?)?)
	}

	fn claim_sections(&mut self, document: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = document.as_table() else {
			return Ok(());
		};
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}",
					section,
					owner.display(),
					source.display()
				)));
			}
			self.owners.insert(section.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};
		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Removes the `include` key and returns the paths it listed.
fn take_includes(document: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let Some(value) = document.as_table_mut().and_then(|t| t.remove("include")) else {
		return Ok(Vec::new());
	};
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
