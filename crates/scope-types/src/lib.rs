//! Common types module for the Scope price oracle.
//!
//! This module defines the core data types shared by the adapters, the
//! program and the crank. It provides a centralized location for shared types
//! to ensure consistency across all workspace crates.

/// Account references and account snapshots presented to calls.
pub mod account;
/// Event types emitted by the crank.
pub mod events;
/// Slot mapping entries.
pub mod mapping;
/// Fixed-point price representation.
pub mod price;
/// Provider kinds known to the program.
pub mod provider;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions and shared constants.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use account::*;
pub use events::*;
pub use mapping::*;
pub use price::*;
pub use provider::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{
	format_fixed_point, truncate_id, with_0x_prefix, without_0x_prefix, DEFAULT_MS_PER_SLOT,
	MAX_BATCH_SIZE, MAX_ENTRIES, MAX_EXPONENT, MAX_FEED_ID_LEN, SLOTS_PER_EPOCH,
};
pub use validation::*;
