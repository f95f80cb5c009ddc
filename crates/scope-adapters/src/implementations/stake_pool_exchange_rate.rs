//! Stake pool exchange-rate adapter.
//!
//! A pool token is worth `total_lamports / pool_token_supply`, at 10
//! decimals. Pools only update their totals once per epoch; a pool that has
//! not been updated in the current epoch is not priced.
//!
//! Layout (32 bytes): account type byte `1` at 0, total lamports u64 at 8,
//! pool token supply u64 at 16, last update epoch u64 at 24.

use crate::layout::ensure_len;
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, Price, ProviderKind};

pub const ACCOUNT_TYPE_STAKE_POOL: u8 = 1;
pub const LEN: usize = 32;
pub const PRECISION: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakePoolAccount {
	pub account_type: u8,
	pub total_lamports: u64,
	pub pool_token_supply: u64,
	pub last_update_epoch: u64,
}

impl StakePoolAccount {
	pub fn new(total_lamports: u64, pool_token_supply: u64, last_update_epoch: u64) -> Self {
		Self {
			account_type: ACCOUNT_TYPE_STAKE_POOL,
			total_lamports,
			pool_token_supply,
			last_update_epoch,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(LEN);
		buf.put_u8(self.account_type);
		buf.put_bytes(0, 7);
		buf.put_u64_le(self.total_lamports);
		buf.put_u64_le(self.pool_token_supply);
		buf.put_u64_le(self.last_update_epoch);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, LEN, "stake pool")?;
		let mut buf = data;
		let account_type = buf.get_u8();
		buf.advance(7);
		Ok(Self {
			account_type,
			total_lamports: buf.get_u64_le(),
			pool_token_supply: buf.get_u64_le(),
			last_update_epoch: buf.get_u64_le(),
		})
	}
}

pub struct StakePoolExchangeRateAdapter;

impl PriceAdapter for StakePoolExchangeRateAdapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::StakePoolExchangeRate
	}

	fn decode(&self, account: &AccountInfo, ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		let pool = StakePoolAccount::unpack(&account.data)?;
		if pool.account_type != ACCOUNT_TYPE_STAKE_POOL {
			return Err(AdapterError::kind_mismatch(
				self.kind(),
				format!("unexpected account type {}", pool.account_type),
			));
		}
		if pool.last_update_epoch < ctx.epoch {
			return Err(AdapterError::NotReady(format!(
				"pool last updated in epoch {}, current epoch is {}",
				pool.last_update_epoch, ctx.epoch
			)));
		}
		if pool.pool_token_supply == 0 {
			return Err(AdapterError::NotReady("pool token supply is zero".to_string()));
		}

		let price = Price::from_ratio(
			pool.total_lamports.into(),
			pool.pool_token_supply.into(),
			PRECISION,
		)?;
		Ok(Observation {
			price,
			source_timestamp: None,
		})
	}
}
