//! Program operations.
//!
//! Administrative operations mutate the mapping table under admin authority.
//! Refresh operations are permissionless and only write the price table.

pub mod admin;
pub mod refresh;

pub use refresh::{BatchReport, RefreshOutcome, SlotResult, VaultShareOutcome};
