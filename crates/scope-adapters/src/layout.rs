//! Shared helpers for fixed little-endian account layouts.

use crate::AdapterError;

/// Fails with [`AdapterError::Decode`] unless `data` holds at least `len` bytes.
pub(crate) fn ensure_len(data: &[u8], len: usize, what: &str) -> Result<(), AdapterError> {
	if data.len() < len {
		return Err(AdapterError::Decode(format!(
			"{} account too short: expected {} bytes, got {}",
			what,
			len,
			data.len()
		)));
	}
	Ok(())
}

/// Converts a signed provider value that must not be negative.
pub(crate) fn non_negative<T>(value: T, what: &str) -> Result<u128, AdapterError>
where
	T: TryInto<u128> + Copy + std::fmt::Display,
{
	value
		.try_into()
		.map_err(|_| AdapterError::Decode(format!("negative {}: {}", what, value)))
}
