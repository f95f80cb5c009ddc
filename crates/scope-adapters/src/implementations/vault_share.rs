//! Vault-share adapter.
//!
//! A vault share is priced from two accounts: the share mint, which carries
//! the outstanding supply, and the token account holding the vault's
//! underlying tokens. Price = underlying amount / share supply, at 8 decimals.
//!
//! Mint layout (82 bytes): supply u64 at 36, decimals u8 at 44, initialized
//! flag at 45. Token account layout (165 bytes): mint at 0, owner at 32,
//! amount u64 at 64, state u8 at 108.

use crate::layout::ensure_len;
use crate::{AdapterError, DecodeContext, Observation, PriceAdapter};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use scope_types::{AccountInfo, AccountRef, Price, ProviderKind};

pub const MINT_LEN: usize = 82;
pub const TOKEN_ACCOUNT_LEN: usize = 165;
pub const PRECISION: u8 = 8;

const TOKEN_STATE_UNINITIALIZED: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintAccount {
	pub supply: u64,
	pub decimals: u8,
	pub is_initialized: bool,
}

impl MintAccount {
	pub fn new(supply: u64, decimals: u8) -> Self {
		Self {
			supply,
			decimals,
			is_initialized: true,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(MINT_LEN);
		buf.put_bytes(0, 36);
		buf.put_u64_le(self.supply);
		buf.put_u8(self.decimals);
		buf.put_u8(self.is_initialized.into());
		buf.put_bytes(0, MINT_LEN - 46);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, MINT_LEN, "mint")?;
		let mut buf = &data[36..];
		Ok(Self {
			supply: buf.get_u64_le(),
			decimals: buf.get_u8(),
			is_initialized: buf.get_u8() != 0,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccount {
	pub mint: AccountRef,
	pub owner: AccountRef,
	pub amount: u64,
	pub state: u8,
}

impl TokenAccount {
	pub fn new(mint: AccountRef, owner: AccountRef, amount: u64) -> Self {
		Self {
			mint,
			owner,
			amount,
			state: 1,
		}
	}

	pub fn pack(&self) -> Bytes {
		let mut buf = BytesMut::with_capacity(TOKEN_ACCOUNT_LEN);
		buf.put_slice(self.mint.as_bytes());
		buf.put_slice(self.owner.as_bytes());
		buf.put_u64_le(self.amount);
		buf.put_bytes(0, 108 - 72);
		buf.put_u8(self.state);
		buf.put_bytes(0, TOKEN_ACCOUNT_LEN - 109);
		buf.freeze()
	}

	pub fn unpack(data: &[u8]) -> Result<Self, AdapterError> {
		ensure_len(data, TOKEN_ACCOUNT_LEN, "token")?;
		let mut buf = data;
		let mut mint = [0u8; 32];
		buf.copy_to_slice(&mut mint);
		let mut owner = [0u8; 32];
		buf.copy_to_slice(&mut owner);
		let amount = buf.get_u64_le();
		Ok(Self {
			mint: AccountRef::new(mint),
			owner: AccountRef::new(owner),
			amount,
			state: data[108],
		})
	}
}

/// Prices a vault share from its mint and underlying token account.
pub fn decode_vault_share(
	mint: &AccountInfo,
	underlying: &AccountInfo,
	_ctx: &DecodeContext,
) -> Result<Observation, AdapterError> {
	let share_mint = MintAccount::unpack(&mint.data)?;
	if !share_mint.is_initialized {
		return Err(AdapterError::Decode("share mint is not initialized".to_string()));
	}
	let holdings = TokenAccount::unpack(&underlying.data)?;
	if holdings.state == TOKEN_STATE_UNINITIALIZED {
		return Err(AdapterError::Decode(
			"underlying token account is not initialized".to_string(),
		));
	}
	if share_mint.supply == 0 {
		return Err(AdapterError::NotReady("share supply is zero".to_string()));
	}

	let price = Price::from_ratio(holdings.amount.into(), share_mint.supply.into(), PRECISION)?;
	Ok(Observation {
		price,
		source_timestamp: None,
	})
}

/// Single-account entry point; vault shares need two accounts and are only
/// priced through [`decode_vault_share`].
pub struct VaultShareAdapter;

impl PriceAdapter for VaultShareAdapter {
	fn kind(&self) -> ProviderKind {
		ProviderKind::VaultShare
	}

	fn decode(&self, _account: &AccountInfo, _ctx: &DecodeContext) -> Result<Observation, AdapterError> {
		Err(AdapterError::kind_mismatch(
			self.kind(),
			"vault shares are refreshed from a mint and an underlying account",
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn accounts(amount: u64, supply: u64) -> (AccountInfo, AccountInfo) {
		let mint_key = AccountRef::new([5u8; 32]);
		let mint = AccountInfo::new(mint_key, MintAccount::new(supply, 6).pack());
		let underlying = AccountInfo::new(
			AccountRef::new([6u8; 32]),
			TokenAccount::new(AccountRef::new([9u8; 32]), AccountRef::new([7u8; 32]), amount).pack(),
		);
		(mint, underlying)
	}

	#[test]
	fn test_share_price() {
		let (mint, underlying) = accounts(1_500_000, 1_000_000);
		let observation = decode_vault_share(&mint, &underlying, &DecodeContext::default()).unwrap();
		assert_eq!(observation.price.to_string(), "1.50000000");
	}

	#[test]
	fn test_price_increases_with_underlying() {
		let ctx = DecodeContext::default();
		let (mint, before) = accounts(1_000_000, 1_000_000);
		let (_, after) = accounts(1_000_001, 1_000_000);
		let p0 = decode_vault_share(&mint, &before, &ctx).unwrap().price;
		let p1 = decode_vault_share(&mint, &after, &ctx).unwrap().price;
		assert_eq!(p0.checked_cmp(&p1).unwrap(), std::cmp::Ordering::Less);
	}

	#[test]
	fn test_zero_supply_is_not_ready() {
		let (mint, underlying) = accounts(10, 0);
		assert!(matches!(
			decode_vault_share(&mint, &underlying, &DecodeContext::default()),
			Err(AdapterError::NotReady(_))
		));
	}

	#[test]
	fn test_layouts() {
		let mint = MintAccount::new(77, 9);
		let bytes = mint.pack();
		assert_eq!(bytes.len(), MINT_LEN);
		assert_eq!(&bytes[36..44], &77u64.to_le_bytes());
		assert_eq!(MintAccount::unpack(&bytes).unwrap(), mint);

		let token = TokenAccount::new(AccountRef::new([1; 32]), AccountRef::new([2; 32]), 33);
		let bytes = token.pack();
		assert_eq!(bytes.len(), TOKEN_ACCOUNT_LEN);
		assert_eq!(bytes[108], 1);
		assert_eq!(TokenAccount::unpack(&bytes).unwrap(), token);
	}

	#[test]
	fn test_uninitialized_accounts_are_rejected() {
		let (_, underlying) = accounts(1, 1);
		let mut raw = MintAccount::new(1, 6);
		raw.is_initialized = false;
		let mint = AccountInfo::new(AccountRef::default(), raw.pack());
		assert!(matches!(
			decode_vault_share(&mint, &underlying, &DecodeContext::default()),
			Err(AdapterError::Decode(_))
		));
	}

	#[test]
	fn test_single_account_decode_is_kind_mismatch() {
		let (mint, _) = accounts(1, 1);
		assert!(matches!(
			VaultShareAdapter.decode(&mint, &DecodeContext::default()),
			Err(AdapterError::KindMismatch { .. })
		));
	}
}
