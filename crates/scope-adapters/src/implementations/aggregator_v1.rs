//! Round-based aggregator adapter, first account format.
//!
//! Layout (40 bytes): type byte `1` at 0, mantissa i64 at 8, scale u32 at 16,
//! round slot u64 at 24, round timestamp i64 at 32.

use crate::layout::{ensure_len, non_negative};
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, Price, ProviderKind, MAX_EXPONENT};

pub const ACCOUNT_TYPE_AGGREGATOR: u8 = 1;
pub const LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorV1Account {
	pub account_type: u8,
	pub mantissa: i64,
	pub scale: u32,
	pub round_slot: u64,
	pub round_timestamp: i64,
}

impl AggregatorV1Account {
	pub fn new(mantissa: i64, scale: u32) -> Self {
		Self {
			account_type: ACCOUNT_TYPE_AGGREGATOR,
			mantissa,
			scale,
			round_slot: 0,
			round_timestamp: 0,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(LEN);
		buf.put_u8(self.account_type);
		buf.put_bytes(0, 7);
		buf.put_i64_le(self.mantissa);
		buf.put_u32_le(self.scale);
		buf.put_bytes(0, 4);
		buf.put_u64_le(self.round_slot);
		buf.put_i64_le(self.round_timestamp);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, LEN, "aggregator v1")?;
		let mut buf = data;
		let account_type = buf.get_u8();
		buf.advance(7);
		let mantissa = buf.get_i64_le();
		let scale = buf.get_u32_le();
		buf.advance(4);
		Ok(Self {
			account_type,
			mantissa,
			scale,
			round_slot: buf.get_u64_le(),
			round_timestamp: buf.get_i64_le(),
		})
	}
}

/// Converts a round result into a price. Shared by both aggregator formats.
pub(crate) fn round_price(mantissa: u128, scale: u32) -> Result<Price, AdapterError> {
	if scale > u32::from(MAX_EXPONENT) {
		return Err(AdapterError::Decode(format!("scale {} out of range", scale)));
	}
	// scale <= MAX_EXPONENT, so the cast to i32 is lossless
	Ok(Price::normalize(mantissa, -(scale as i32))?)
}

pub struct AggregatorV1Adapter;

impl PriceAdapter for AggregatorV1Adapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::AggregatorV1
	}

	fn decode(&self, account: &AccountInfo, _ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		let aggregator = AggregatorV1Account::unpack(&account.data)?;
		if aggregator.account_type != ACCOUNT_TYPE_AGGREGATOR {
			return Err(AdapterError::kind_mismatch(
				self.kind(),
				format!("unexpected account type {}", aggregator.account_type),
			));
		}
		let mantissa = non_negative(aggregator.mantissa, "mantissa")?;
		Ok(Observation {
			price: round_price(mantissa, aggregator.scale)?,
			source_timestamp: u64::try_from(aggregator.round_timestamp)
				.ok()
				.filter(|ts| *ts > 0),
		})
	}
}
