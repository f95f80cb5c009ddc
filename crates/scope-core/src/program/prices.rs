//! Fixed-capacity table of dated prices.
//!
//! Each slot sits behind its own mutex, so refreshes of disjoint slots never
//! contend and a slot always has a single writer.

use crate::ScopeError;
use scope_types::DatedPrice;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct PriceTable {
	entries: Box<[Mutex<DatedPrice>]>,
}

impl PriceTable {
	/// Creates a table of `capacity` unset entries.
	pub fn new(capacity: usize) -> Self {
		Self::from_entries((0..capacity).map(|_| DatedPrice::default()).collect())
	}

	pub(crate) fn from_entries(entries: Vec<DatedPrice>) -> Self {
		Self {
			entries: entries.into_iter().map(Mutex::new).collect(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.entries.len()
	}

	fn slot(&self, slot: u16) -> Result<MutexGuard<'_, DatedPrice>, ScopeError> {
		let entry = self
			.entries
			.get(usize::from(slot))
			.ok_or(ScopeError::BadSlot {
				slot,
				capacity: self.capacity(),
			})?;
		// A poisoned slot still holds a whole DatedPrice; writes are a single assignment.
		Ok(entry.lock().unwrap_or_else(PoisonError::into_inner))
	}

	/// Reads the entry at `slot`.
	pub fn get(&self, slot: u16) -> Result<DatedPrice, ScopeError> {
		Ok(*self.slot(slot)?)
	}

	/// Writes `price` into `slot` unless its marker is older than the stored one.
	///
	/// Returns the entry that was replaced.
	pub fn write(&self, slot: u16, price: DatedPrice) -> Result<DatedPrice, ScopeError> {
		let mut entry = self.slot(slot)?;
		if price.last_updated_marker < entry.last_updated_marker {
			return Err(ScopeError::StaleMarker {
				slot,
				stored: entry.last_updated_marker,
				attempted: price.last_updated_marker,
			});
		}
		Ok(std::mem::replace(&mut *entry, price))
	}

	/// Copies every entry, slot by slot.
	pub fn snapshot(&self) -> Vec<DatedPrice> {
		self.entries
			.iter()
			.map(|entry| *entry.lock().unwrap_or_else(PoisonError::into_inner))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use scope_types::{Price, ProviderKind};

	fn dated(significand: u128, marker: u64) -> DatedPrice {
		DatedPrice {
			price: Price::new(significand, 2).unwrap(),
			last_updated_marker: marker,
			unix_timestamp: 0,
			source_kind: Some(ProviderKind::AggregatorV1),
		}
	}

	#[test]
	fn test_new_table_is_unset() {
		let table = PriceTable::new(4);
		assert_eq!(table.capacity(), 4);
		assert!(table.snapshot().iter().all(|entry| !entry.is_set()));
	}

	#[test]
	fn test_marker_is_monotonic() {
		let table = PriceTable::new(4);
		table.write(1, dated(100, 10)).unwrap();
		// Equal marker is accepted.
		table.write(1, dated(101, 10)).unwrap();

		let err = table.write(1, dated(50, 9)).unwrap_err();
		assert_eq!(
			err,
			ScopeError::StaleMarker {
				slot: 1,
				stored: 10,
				attempted: 9
			}
		);
		assert_eq!(table.get(1).unwrap(), dated(101, 10));
	}

	#[test]
	fn test_out_of_range() {
		let table = PriceTable::new(4);
		assert!(matches!(table.get(4), Err(ScopeError::BadSlot { slot: 4, .. })));
		assert!(table.write(9, dated(1, 1)).is_err());
	}
}
