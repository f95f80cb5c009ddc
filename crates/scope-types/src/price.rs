//! Fixed-point price representation shared by every provider adapter.
//!
//! A [`Price`] is a `(significand, exponent)` pair whose value is
//! `significand × 10^(−exponent)`. Adapters normalize their provider-specific
//! encodings into this form; the program stores it in dated entries.

use crate::utils::{format_fixed_point, MAX_EXPONENT};
use crate::ProviderKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors raised by price arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
	/// A multiplication needed to align or scale a significand overflowed.
	#[error("Arithmetic overflow while scaling price")]
	Overflow,
	/// The exponent is larger than [`MAX_EXPONENT`].
	#[error("Exponent {0} exceeds maximum of {max}", max = MAX_EXPONENT)]
	ExponentOutOfRange(i64),
	/// A ratio was requested with a zero denominator.
	#[error("Division by zero")]
	DivisionByZero,
}

/// A non-negative fixed-point decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
	/// Scaled integer value, e.g. `22841550900` for 228.415509 with exponent 8.
	pub significand: u128,
	/// Number of decimal digits carried by the significand.
	pub exponent: u8,
}

impl Price {
	/// Creates a price, rejecting exponents above [`MAX_EXPONENT`].
	pub fn new(significand: u128, exponent: u8) -> Result<Self, PriceError> {
		if exponent > MAX_EXPONENT {
			return Err(PriceError::ExponentOutOfRange(exponent.into()));
		}
		Ok(Self {
			significand,
			exponent,
		})
	}

	/// Converts a provider value `raw_value × 10^raw_exponent` without rounding.
	///
	/// Negative exponents (the usual provider convention) become the price
	/// exponent directly. A positive exponent is folded into the significand.
	pub fn normalize(raw_value: u128, raw_exponent: i32) -> Result<Self, PriceError> {
		if raw_exponent <= 0 {
			let exponent = u8::try_from(raw_exponent.unsigned_abs())
				.map_err(|_| PriceError::ExponentOutOfRange(raw_exponent.into()))?;
			return Self::new(raw_value, exponent);
		}

		let factor = pow10(raw_exponent.unsigned_abs())?;
		let significand = raw_value
			.checked_mul(factor)
			.ok_or(PriceError::Overflow)?;
		Self::new(significand, 0)
	}

	/// Computes `numerator / denominator` at a fixed number of decimals.
	///
	/// The result is floored at `precision` digits regardless of the
	/// precision of the inputs.
	pub fn from_ratio(numerator: u128, denominator: u128, precision: u8) -> Result<Self, PriceError> {
		if denominator == 0 {
			return Err(PriceError::DivisionByZero);
		}
		let scaled = numerator
			.checked_mul(pow10(precision.into())?)
			.ok_or(PriceError::Overflow)?;
		Self::new(scaled / denominator, precision)
	}

	/// Returns the significand expressed with `exponent` decimals.
	///
	/// Only scaling up is allowed; asking for fewer decimals than the price
	/// carries would drop digits.
	pub fn scaled_to(&self, exponent: u8) -> Result<u128, PriceError> {
		if exponent < self.exponent {
			return Err(PriceError::ExponentOutOfRange(exponent.into()));
		}
		let factor = pow10((exponent - self.exponent).into())?;
		self.significand
			.checked_mul(factor)
			.ok_or(PriceError::Overflow)
	}

	/// Compares two prices by value after aligning their exponents.
	pub fn checked_cmp(&self, other: &Price) -> Result<Ordering, PriceError> {
		let exponent = self.exponent.max(other.exponent);
		let lhs = self.scaled_to(exponent)?;
		let rhs = other.scaled_to(exponent)?;
		Ok(lhs.cmp(&rhs))
	}

	/// Value equality, so `1.50` equals `1.5`.
	pub fn value_eq(&self, other: &Price) -> Result<bool, PriceError> {
		Ok(self.checked_cmp(other)? == Ordering::Equal)
	}

	/// Converts to a [`Decimal`] when the value fits its 96-bit mantissa.
	pub fn to_decimal(&self) -> Option<Decimal> {
		let mantissa = i128::try_from(self.significand).ok()?;
		Decimal::try_from_i128_with_scale(mantissa, self.exponent.into()).ok()
	}
}

impl fmt::Display for Price {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&format_fixed_point(self.significand, self.exponent))
	}
}

/// `10^exp` as a `u128`.
pub fn pow10(exp: u32) -> Result<u128, PriceError> {
	10u128.checked_pow(exp).ok_or(PriceError::Overflow)
}

/// A price together with the marker of the refresh that wrote it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedPrice {
	pub price: Price,
	/// Ledger slot observed by the refresh that last wrote this entry.
	pub last_updated_marker: u64,
	/// Source timestamp reported by the provider, 0 when it reports none.
	pub unix_timestamp: u64,
	/// Provider kind that produced the price; `None` for never-written slots.
	pub source_kind: Option<ProviderKind>,
}

impl DatedPrice {
	/// Whether the entry has been written at least once.
	pub fn is_set(&self) -> bool {
		self.source_kind.is_some()
	}

	/// Number of slots elapsed since the last write.
	pub fn age(&self, current_slot: u64) -> u64 {
		current_slot.saturating_sub(self.last_updated_marker)
	}
}
