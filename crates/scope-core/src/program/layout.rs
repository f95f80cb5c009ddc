//! Binary encoding of the persisted price and mapping regions.
//!
//! Both regions start with a 16-byte header:
//!
//! | offset | field    | type    |
//! |--------|----------|---------|
//! | 0      | magic    | [u8; 4] |
//! | 4      | version  | u16     |
//! | 8      | capacity | u32     |
//!
//! followed by `capacity` fixed-size entries.
//!
//! Price entry (48 bytes): significand u128, exponent u8, kind u8
//! (`0xFF` = never written), 6 bytes padding, marker u64, unix timestamp u64,
//! 8 reserved bytes.
//!
//! Mapping entry (40 bytes): provider account (32 bytes), kind u8
//! (`0xFF` = unset), 7 bytes padding.

use crate::ScopeError;
use bytes::{Buf, BufMut, BytesMut};
use scope_types::{
	AccountRef, DatedPrice, MappingEntry, Price, ProviderKind, MAX_EXPONENT,
};

pub const PRICE_MAGIC: &[u8; 4] = b"SCPP";
pub const MAPPING_MAGIC: &[u8; 4] = b"SCPM";
pub const REGION_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 16;
pub const PRICE_ENTRY_LEN: usize = 48;
pub const MAPPING_ENTRY_LEN: usize = 40;

const NO_KIND: u8 = 0xFF;

fn put_header(buf: &mut BytesMut, magic: &[u8; 4], capacity: usize) -> Result<(), ScopeError> {
	let capacity = u32::try_from(capacity)
		.map_err(|_| ScopeError::Layout(format!("capacity {} does not fit a header", capacity)))?;
	buf.put_slice(magic);
	buf.put_u16_le(REGION_VERSION);
	buf.put_bytes(0, 2);
	buf.put_u32_le(capacity);
	buf.put_bytes(0, 4);
	Ok(())
}

/// Validates the header and returns the declared capacity and the entries.
fn read_header<'a>(
	data: &'a [u8],
	magic: &[u8; 4],
	entry_len: usize,
) -> Result<(usize, &'a [u8]), ScopeError> {
	if data.len() < HEADER_LEN {
		return Err(ScopeError::Layout("region shorter than its header".into()));
	}
	let mut header = &data[..HEADER_LEN];
	let mut found = [0u8; 4];
	header.copy_to_slice(&mut found);
	if &found != magic {
		return Err(ScopeError::Layout(format!(
			"bad region magic {:?}, expected {:?}",
			String::from_utf8_lossy(&found),
			String::from_utf8_lossy(magic)
		)));
	}
	let version = header.get_u16_le();
	if version != REGION_VERSION {
		return Err(ScopeError::Layout(format!("unsupported region version {}", version)));
	}
	header.advance(2);
	let capacity = header.get_u32_le() as usize;

	let body = &data[HEADER_LEN..];
	if body.len() != capacity * entry_len {
		return Err(ScopeError::Layout(format!(
			"region declares {} entries but holds {} bytes",
			capacity,
			body.len()
		)));
	}
	Ok((capacity, body))
}

fn kind_from_tag(tag: u8) -> Result<Option<ProviderKind>, ScopeError> {
	if tag == NO_KIND {
		return Ok(None);
	}
	ProviderKind::try_from(tag)
		.map(Some)
		.map_err(|e| ScopeError::Layout(e.to_string()))
}

pub fn encode_prices(entries: &[DatedPrice]) -> Result<Vec<u8>, ScopeError> {
	let mut buf = BytesMut::with_capacity(HEADER_LEN + entries.len() * PRICE_ENTRY_LEN);
	put_header(&mut buf, PRICE_MAGIC, entries.len())?;
	for entry in entries {
		buf.put_u128_le(entry.price.significand);
		buf.put_u8(entry.price.exponent);
		buf.put_u8(entry.source_kind.map(u8::from).unwrap_or(NO_KIND));
		buf.put_bytes(0, 6);
		buf.put_u64_le(entry.last_updated_marker);
		buf.put_u64_le(entry.unix_timestamp);
		buf.put_bytes(0, 8);
	}
	Ok(buf.to_vec())
}

pub fn decode_prices(data: &[u8]) -> Result<Vec<DatedPrice>, ScopeError> {
	let (capacity, mut body) = read_header(data, PRICE_MAGIC, PRICE_ENTRY_LEN)?;
	let mut entries = Vec::with_capacity(capacity);
	for _ in 0..capacity {
		let significand = body.get_u128_le();
		let exponent = body.get_u8();
		let source_kind = kind_from_tag(body.get_u8())?;
		body.advance(6);
		let last_updated_marker = body.get_u64_le();
		let unix_timestamp = body.get_u64_le();
		body.advance(8);

		if exponent > MAX_EXPONENT {
			return Err(ScopeError::Layout(format!("stored exponent {} out of range", exponent)));
		}
		entries.push(DatedPrice {
			price: Price {
				significand,
				exponent,
			},
			last_updated_marker,
			unix_timestamp,
			source_kind,
		});
	}
	Ok(entries)
}

pub fn encode_mappings(entries: &[Option<MappingEntry>]) -> Result<Vec<u8>, ScopeError> {
	let mut buf = BytesMut::with_capacity(HEADER_LEN + entries.len() * MAPPING_ENTRY_LEN);
	put_header(&mut buf, MAPPING_MAGIC, entries.len())?;
	for entry in entries {
		match entry {
			Some(mapping) => {
				buf.put_slice(mapping.provider_account.as_bytes());
				buf.put_u8(mapping.provider_kind.into());
			},
			None => {
				buf.put_bytes(0, AccountRef::LEN);
				buf.put_u8(NO_KIND);
			},
		}
		buf.put_bytes(0, 7);
	}
	Ok(buf.to_vec())
}

pub fn decode_mappings(data: &[u8]) -> Result<Vec<Option<MappingEntry>>, ScopeError> {
	let (capacity, mut body) = read_header(data, MAPPING_MAGIC, MAPPING_ENTRY_LEN)?;
	let mut entries = Vec::with_capacity(capacity);
	for _ in 0..capacity {
		let mut account = [0u8; 32];
		body.copy_to_slice(&mut account);
		let kind = kind_from_tag(body.get_u8())?;
		body.advance(7);
		entries.push(kind.map(|kind| MappingEntry::new(kind, AccountRef::new(account))));
	}
	Ok(entries)
}
