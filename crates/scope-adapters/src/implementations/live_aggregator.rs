//! Live aggregator adapter.
//!
//! Live aggregator accounts publish a price with a confidence interval and a
//! trading status. Only trading prices whose confidence is within 2% of the
//! price are accepted.
//!
//! Layout (56 bytes, little-endian):
//!
//! | offset | field        | type |
//! |--------|--------------|------|
//! | 0      | magic        | u32  |
//! | 4      | version      | u32  |
//! | 8      | account type | u32  |
//! | 12     | exponent     | i32  |
//! | 16     | price        | i64  |
//! | 24     | confidence   | u64  |
//! | 32     | status       | u32  |
//! | 40     | valid slot   | u64  |
//! | 48     | timestamp    | i64  |

use crate::layout::{ensure_len, non_negative};
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, Price, ProviderKind};

pub const MAGIC: u32 = 0xa1b2_c3d4;
pub const VERSION: u32 = 2;
pub const ACCOUNT_TYPE_PRICE: u32 = 3;
pub const STATUS_TRADING: u32 = 1;
pub const LEN: usize = 56;

/// Confidence must satisfy `confidence * CONFIDENCE_FACTOR <= price`.
pub const CONFIDENCE_FACTOR: u128 = 50;

/// Decoded live aggregator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveAggregatorAccount {
	pub magic: u32,
	pub version: u32,
	pub account_type: u32,
	pub exponent: i32,
	pub price: i64,
	pub confidence: u64,
	pub status: u32,
	pub valid_slot: u64,
	pub timestamp: i64,
}

impl LiveAggregatorAccount {
	/// A trading account with a valid header.
	pub fn trading(price: i64, exponent: i32, confidence: u64) -> Self {
		Self {
			magic: MAGIC,
			version: VERSION,
			account_type: ACCOUNT_TYPE_PRICE,
			exponent,
			price,
			confidence,
			status: STATUS_TRADING,
			valid_slot: 0,
			timestamp: 0,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(LEN);
		buf.put_u32_le(self.magic);
		buf.put_u32_le(self.version);
		buf.put_u32_le(self.account_type);
		buf.put_i32_le(self.exponent);
		buf.put_i64_le(self.price);
		buf.put_u64_le(self.confidence);
		buf.put_u32_le(self.status);
		buf.put_bytes(0, 4);
		buf.put_u64_le(self.valid_slot);
		buf.put_i64_le(self.timestamp);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, LEN, "live aggregator")?;
		let mut buf = data;
		let magic = buf.get_u32_le();
		let version = buf.get_u32_le();
		let account_type = buf.get_u32_le();
		let exponent = buf.get_i32_le();
		let price = buf.get_i64_le();
		let confidence = buf.get_u64_le();
		let status = buf.get_u32_le();
		buf.advance(4);
		let valid_slot = buf.get_u64_le();
		let timestamp = buf.get_i64_le();
		Ok(Self {
			magic,
			version,
			account_type,
			exponent,
			price,
			confidence,
			status,
			valid_slot,
			timestamp,
		})
	}

	fn check_header(&self) -> Result<(), AdapterError> {
		if self.magic != MAGIC {
			return Err(AdapterError::kind_mismatch(
				ProviderKind::LiveAggregator,
				format!("bad magic {:#x}", self.magic),
			));
		}
		if self.version != VERSION {
			return Err(AdapterError::kind_mismatch(
				ProviderKind::LiveAggregator,
				format!("unsupported version {}", self.version),
			));
		}
		if self.account_type != ACCOUNT_TYPE_PRICE {
			return Err(AdapterError::kind_mismatch(
				ProviderKind::LiveAggregator,
				format!("not a price account (type {})", self.account_type),
			));
		}
		Ok(())
	}

	fn check_trading(&self) -> Result<(), AdapterError> {
		if self.status != STATUS_TRADING {
			return Err(AdapterError::NotReady(format!(
				"status {} is not trading",
				self.status
			)));
		}
		Ok(())
	}
}

pub struct LiveAggregatorAdapter;

impl PriceAdapter for LiveAggregatorAdapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::LiveAggregator
	}

	fn decode(&self, account: &AccountInfo, _ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		let feed = LiveAggregatorAccount::unpack(&account.data)?;
		feed.check_header()?;
		let raw_price = non_negative(feed.price, "price")?;
		feed.check_trading()?;

		if raw_price == 0 {
			return Err(AdapterError::NotReady("price is zero".to_string()));
		}
		if u128::from(feed.confidence) * CONFIDENCE_FACTOR > raw_price {
			return Err(AdapterError::NotReady(format!(
				"confidence {} too wide for price {}",
				feed.confidence, raw_price
			)));
		}

		let price = Price::normalize(raw_price, feed.exponent)?;
		Ok(Observation {
			price,
			source_timestamp: u64::try_from(feed.timestamp).ok().filter(|ts| *ts > 0),
		})
	}

	fn validate(&self, account: &AccountInfo) -> Result<(), AdapterError> {
		let feed = LiveAggregatorAccount::unpack(&account.data)?;
		feed.check_header()?;
		feed.check_trading()
	}
}
