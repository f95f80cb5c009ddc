//! Constants shared by the program, the adapters and the crank.

/// Number of slots in every price table and mapping table.
pub const MAX_ENTRIES: usize = 512;

/// Maximum number of slots refreshed by a single `refresh_many` call.
///
/// Bounded by the number of accounts a host transaction can carry.
pub const MAX_BATCH_SIZE: usize = 27;

/// Largest supported price exponent; `10^38` is the largest power of ten
/// representable in a `u128`.
pub const MAX_EXPONENT: u8 = 38;

/// Maximum length in bytes of a feed identifier.
pub const MAX_FEED_ID_LEN: usize = 32;

/// Number of ledger slots in one epoch.
pub const SLOTS_PER_EPOCH: u64 = 432_000;

/// Default duration of a ledger slot in milliseconds.
pub const DEFAULT_MS_PER_SLOT: u64 = 400;
