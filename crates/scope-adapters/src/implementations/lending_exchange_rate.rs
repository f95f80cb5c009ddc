//! Lending reserve exchange-rate adapter.
//!
//! The price of a collateral token is the amount of liquidity it redeems for:
//! `(available + borrowed) / collateral supply`, at 10 decimals.
//!
//! Layout (40 bytes): version byte `1` at 0, last update slot u64 at 8,
//! available liquidity u64 at 16, borrowed liquidity u64 at 24, collateral
//! mint supply u64 at 32.

use crate::layout::ensure_len;
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, Price, ProviderKind};

pub const RESERVE_VERSION: u8 = 1;
pub const LEN: usize = 40;
pub const PRECISION: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingReserveAccount {
	pub version: u8,
	pub last_update_slot: u64,
	pub available_liquidity: u64,
	pub borrowed_liquidity: u64,
	pub collateral_mint_supply: u64,
}

impl LendingReserveAccount {
	pub fn new(available_liquidity: u64, borrowed_liquidity: u64, collateral_mint_supply: u64) -> Self {
		Self {
			version: RESERVE_VERSION,
			last_update_slot: 0,
			available_liquidity,
			borrowed_liquidity,
			collateral_mint_supply,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(LEN);
		buf.put_u8(self.version);
		buf.put_bytes(0, 7);
		buf.put_u64_le(self.last_update_slot);
		buf.put_u64_le(self.available_liquidity);
		buf.put_u64_le(self.borrowed_liquidity);
		buf.put_u64_le(self.collateral_mint_supply);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, LEN, "lending reserve")?;
		let mut buf = data;
		let version = buf.get_u8();
		buf.advance(7);
		Ok(Self {
			version,
			last_update_slot: buf.get_u64_le(),
			available_liquidity: buf.get_u64_le(),
			borrowed_liquidity: buf.get_u64_le(),
			collateral_mint_supply: buf.get_u64_le(),
		})
	}

	/// Total liquidity backing the collateral supply.
	pub fn total_liquidity(&self) -> u128 {
		u128::from(self.available_liquidity) + u128::from(self.borrowed_liquidity)
	}
}

pub struct LendingExchangeRateAdapter;

impl PriceAdapter for LendingExchangeRateAdapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::LendingExchangeRate
	}

	fn decode(&self, account: &AccountInfo, _ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		let reserve = LendingReserveAccount::unpack(&account.data)?;
		if reserve.version != RESERVE_VERSION {
			return Err(AdapterError::kind_mismatch(
				self.kind(),
				format!("unsupported reserve version {}", reserve.version),
			));
		}
		if reserve.collateral_mint_supply == 0 {
			return Err(AdapterError::NotReady(
				"collateral supply is zero".to_string(),
			));
		}

		let price = Price::from_ratio(
			reserve.total_liquidity(),
			reserve.collateral_mint_supply.into(),
			PRECISION,
		)?;
		Ok(Observation {
			price,
			source_timestamp: None,
		})
	}
}
