//! Storage-related types for the oracle.

/// Storage namespaces for the different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Provider account blobs, keyed by account reference
	Accounts,
	/// Persisted price regions, keyed by feed id
	Prices,
	/// Persisted mapping regions, keyed by feed id
	Mappings,
	/// Configuration records, keyed by feed id
	Configurations,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Accounts => "accounts",
			StorageKey::Prices => "prices",
			StorageKey::Mappings => "mappings",
			StorageKey::Configurations => "configurations",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Accounts,
			Self::Prices,
			Self::Mappings,
			Self::Configurations,
		]
		.into_iter()
	}
}
