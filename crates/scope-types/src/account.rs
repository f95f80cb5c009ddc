//! Account references and account snapshots.
//!
//! Provider accounts are opaque byte blobs addressed by a 32-byte reference.
//! Calls receive them as [`AccountInfo`] values.

use crate::utils::{truncate_id, with_0x_prefix, without_0x_prefix};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing an account reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountRefError {
	#[error("Invalid hex: {0}")]
	InvalidHex(String),
	#[error("Expected 32 bytes, got {0}")]
	InvalidLength(usize),
}

/// A 32-byte opaque account reference.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountRef(pub [u8; 32]);

impl AccountRef {
	pub const LEN: usize = 32;

	pub fn new(bytes: [u8; 32]) -> Self {
		Self(bytes)
	}

	/// Builds a reference from a slice, failing on any length but 32.
	pub fn from_slice(slice: &[u8]) -> Result<Self, AccountRefError> {
		let bytes: [u8; 32] = slice
			.try_into()
			.map_err(|_| AccountRefError::InvalidLength(slice.len()))?;
		Ok(Self(bytes))
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	/// Short form used in log fields.
	pub fn short(&self) -> String {
		truncate_id(&self.to_hex())
	}
}

impl fmt::Display for AccountRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&with_0x_prefix(&self.to_hex()))
	}
}

impl fmt::Debug for AccountRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "AccountRef({})", self.short())
	}
}

impl FromStr for AccountRef {
	type Err = AccountRefError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes =
			hex::decode(without_0x_prefix(s.trim())).map_err(|e| AccountRefError::InvalidHex(e.to_string()))?;
		Self::from_slice(&bytes)
	}
}

impl From<[u8; 32]> for AccountRef {
	fn from(bytes: [u8; 32]) -> Self {
		Self(bytes)
	}
}

impl Serialize for AccountRef {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for AccountRef {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// An account as presented to a refresh or admin call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
	pub key: AccountRef,
	pub data: Bytes,
}

impl AccountInfo {
	pub fn new(key: AccountRef, data: impl Into<Bytes>) -> Self {
		Self {
			key,
			data: data.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_with_and_without_prefix() {
		let text = "0x".to_string() + &"ab".repeat(32);
		let a: AccountRef = text.parse().unwrap();
		let b: AccountRef = "ab".repeat(32).parse().unwrap();
		assert_eq!(a, b);
		assert_eq!(a.to_string(), text);
	}

	#[test]
	fn test_parse_rejects_bad_input() {
		assert_eq!(
			"abcd".parse::<AccountRef>(),
			Err(AccountRefError::InvalidLength(2))
		);
		assert!(matches!(
			"zz".parse::<AccountRef>(),
			Err(AccountRefError::InvalidHex(_))
		));
	}

	#[test]
	fn test_serde_uses_hex_string() {
		let account = AccountRef::new([7u8; 32]);
		let json = serde_json::to_string(&account).unwrap();
		assert_eq!(json, format!("\"0x{}\"", "07".repeat(32)));
		let back: AccountRef = serde_json::from_str(&json).unwrap();
		assert_eq!(back, account);
	}
}
