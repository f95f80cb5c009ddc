//! Price endpoints.

use super::ApiError;
use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use scope_core::{PriceRow, ScopeContext, ScopeError};
use scope_types::{AccountRef, Price, ProviderKind};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct PriceResponse {
	pub slot: u16,
	pub token: String,
	pub kind: ProviderKind,
	pub account: AccountRef,
	/// Exact value with every digit of the exponent.
	pub value: Option<String>,
	/// Same value as a decimal, when it fits.
	pub decimal: Option<Decimal>,
	pub price: Option<Price>,
	pub last_updated_marker: u64,
	pub unix_timestamp: u64,
}

impl From<PriceRow> for PriceResponse {
	fn from(row: PriceRow) -> Self {
		Self {
			slot: row.slot,
			token: row.token,
			kind: row.kind,
			account: row.account,
			decimal: row.price.and_then(|price| price.to_decimal()),
			value: row.value,
			price: row.price,
			last_updated_marker: row.last_updated_marker,
			unix_timestamp: row.unix_timestamp,
		}
	}
}

/// GET /api/prices
pub async fn list_prices(
	State(context): State<Arc<ScopeContext>>,
) -> Result<Json<Vec<PriceResponse>>, ApiError> {
	let rows = context.price_rows().await?;
	Ok(Json(rows.into_iter().map(PriceResponse::from).collect()))
}

/// GET /api/prices/{slot}
pub async fn get_price(
	Path(slot): Path<u16>,
	State(context): State<Arc<ScopeContext>>,
) -> Result<Json<PriceResponse>, ApiError> {
	let feed = context.feed().await?;
	if usize::from(slot) >= feed.capacity() {
		return Err(ScopeError::BadSlot {
			slot,
			capacity: feed.capacity(),
		}
		.into());
	}
	let row = context
		.price_rows()
		.await?
		.into_iter()
		.find(|row| row.slot == slot)
		.ok_or(ScopeError::NoMapping(slot))?;
	Ok(Json(row.into()))
}
