//! Round-based aggregator adapter, second account format.
//!
//! Layout (48 bytes): 8-byte discriminator, mantissa i128 at 8, scale u32 at
//! 24, round slot u64 at 32, round timestamp i64 at 40.

use super::aggregator_v1::round_price;
use crate::layout::{ensure_len, non_negative};
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, ProviderKind};

pub const DISCRIMINATOR: [u8; 8] = [217, 230, 65, 101, 201, 162, 27, 125];
pub const LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorV2Account {
	pub discriminator: [u8; 8],
	pub mantissa: i128,
	pub scale: u32,
	pub round_slot: u64,
	pub round_timestamp: i64,
}

impl AggregatorV2Account {
	pub fn new(mantissa: i128, scale: u32) -> Self {
		Self {
			discriminator: DISCRIMINATOR,
			mantissa,
			scale,
			round_slot: 0,
			round_timestamp: 0,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(LEN);
		buf.put_slice(&self.discriminator);
		buf.put_i128_le(self.mantissa);
		buf.put_u32_le(self.scale);
		buf.put_bytes(0, 4);
		buf.put_u64_le(self.round_slot);
		buf.put_i64_le(self.round_timestamp);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, LEN, "aggregator v2")?;
		let mut buf = data;
		let mut discriminator = [0u8; 8];
		buf.copy_to_slice(&mut discriminator);
		let mantissa = buf.get_i128_le();
		let scale = buf.get_u32_le();
		buf.advance(4);
		Ok(Self {
			discriminator,
			mantissa,
			scale,
			round_slot: buf.get_u64_le(),
			round_timestamp: buf.get_i64_le(),
		})
	}
}

pub struct AggregatorV2Adapter;

impl PriceAdapter for AggregatorV2Adapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::AggregatorV2
	}

	fn decode(&self, account: &AccountInfo, _ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		let aggregator = AggregatorV2Account::unpack(&account.data)?;
		if aggregator.discriminator != DISCRIMINATOR {
			return Err(AdapterError::kind_mismatch(
				self.kind(),
				"unexpected account discriminator",
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
