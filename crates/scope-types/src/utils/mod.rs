//! Utility functions and constants shared across the workspace.

pub mod constants;
pub mod formatting;

pub use constants::{
	DEFAULT_MS_PER_SLOT, MAX_BATCH_SIZE, MAX_ENTRIES, MAX_EXPONENT, MAX_FEED_ID_LEN,
	SLOTS_PER_EPOCH,
};
pub use formatting::{format_fixed_point, truncate_id, with_0x_prefix, without_0x_prefix};
