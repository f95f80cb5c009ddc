//! String formatting utilities.
//!
//! Provides functions for formatting strings for display, including
//! hex string prefix management, fixed-point rendering and truncation for readability.

/// Utility function to truncate a hex string for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Renders a fixed-point integer with exactly `exponent` fractional digits.
///
/// Unlike a display-oriented amount formatter, trailing zeros are kept so the
/// precision reported by the provider stays visible:
/// `format_fixed_point(22841550900, 8)` is `"228.41550900"`.
pub fn format_fixed_point(significand: u128, exponent: u8) -> String {
	let digits = significand.to_string();
	if exponent == 0 {
		return digits;
	}

	let decimal_places = exponent as usize;
	let (integer_part, decimal_part) = if digits.len() <= decimal_places {
		("0".to_string(), format!("{:0>width$}", digits, width = decimal_places))
	} else {
		let split_pos = digits.len() - decimal_places;
		(digits[..split_pos].to_string(), digits[split_pos..].to_string())
	};

	format!("{}.{}", integer_part, decimal_part)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789"), "12345678..");
	}

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("ab01"), "0xab01");
		assert_eq!(with_0x_prefix("0Xab01"), "0Xab01");
		assert_eq!(without_0x_prefix("0xab01"), "ab01");
		assert_eq!(without_0x_prefix("ab01"), "ab01");
	}

	#[test]
	fn test_format_fixed_point() {
		assert_eq!(format_fixed_point(22841550900, 8), "228.41550900");
		assert_eq!(format_fixed_point(5, 3), "0.005");
		assert_eq!(format_fixed_point(1000, 0), "1000");
		assert_eq!(format_fixed_point(0, 2), "0.00");
	}
}
