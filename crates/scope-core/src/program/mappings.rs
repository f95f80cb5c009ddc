//! Slot to provider mapping.
//!
//! Entries are replaced whole through [`ArcSwapOption`], so a reader always
//! sees either the previous or the new mapping, never a mix of the two.

use crate::ScopeError;
use arc_swap::ArcSwapOption;
use scope_types::MappingEntry;
use std::sync::Arc;

pub struct MappingTable {
	entries: Box<[ArcSwapOption<MappingEntry>]>,
}

impl MappingTable {
	/// Creates a table of `capacity` unset entries.
	pub fn new(capacity: usize) -> Self {
		Self::from_entries(vec![None; capacity])
	}

	pub(crate) fn from_entries(entries: Vec<Option<MappingEntry>>) -> Self {
		Self {
			entries: entries
				.into_iter()
				.map(|entry| ArcSwapOption::new(entry.map(Arc::new)))
				.collect(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.entries.len()
	}

	fn slot(&self, slot: u16) -> Result<&ArcSwapOption<MappingEntry>, ScopeError> {
		self.entries
			.get(usize::from(slot))
			.ok_or(ScopeError::BadSlot {
				slot,
				capacity: self.capacity(),
			})
	}

	/// Loads one consistent snapshot of the entry at `slot`.
	pub fn get(&self, slot: u16) -> Result<Option<Arc<MappingEntry>>, ScopeError> {
		Ok(self.slot(slot)?.load_full())
	}

	/// Replaces the entry at `slot`, returning the previous one.
	pub fn set(&self, slot: u16, entry: MappingEntry) -> Result<Option<Arc<MappingEntry>>, ScopeError> {
		Ok(self.slot(slot)?.swap(Some(Arc::new(entry))))
	}

	/// All mapped slots in index order.
	pub fn mapped(&self) -> Vec<(u16, MappingEntry)> {
		self.entries
			.iter()
			.enumerate()
			.filter_map(|(index, entry)| {
				let slot = u16::try_from(index).ok()?;
				entry.load_full().map(|mapping| (slot, *mapping))
			})
			.collect()
	}

	pub fn snapshot(&self) -> Vec<Option<MappingEntry>> {
		self.entries
			.iter()
			.map(|entry| entry.load_full().map(|mapping| *mapping))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use scope_types::{AccountRef, ProviderKind};

	#[test]
	fn test_set_replaces_whole_entry() {
		let table = MappingTable::new(8);
		let first = MappingEntry::new(ProviderKind::LiveAggregator, AccountRef::new([1; 32]));
		let second = MappingEntry::new(ProviderKind::AggregatorV2, AccountRef::new([2; 32]));

		assert!(table.set(3, first).unwrap().is_none());
		let held = table.get(3).unwrap().unwrap();

		let previous = table.set(3, second).unwrap().unwrap();
		assert_eq!(*previous, first);
		// A snapshot taken before the swap is unaffected by it.
		assert_eq!(*held, first);
		assert_eq!(*table.get(3).unwrap().unwrap(), second);
	}

	#[test]
	fn test_mapped_lists_only_set_slots() {
		let table = MappingTable::new(8);
		let entry = MappingEntry::new(ProviderKind::AggregatorV1, AccountRef::new([4; 32]));
		table.set(5, entry).unwrap();
		table.set(1, entry).unwrap();
		let slots: Vec<u16> = table.mapped().into_iter().map(|(slot, _)| slot).collect();
		assert_eq!(slots, vec![1, 5]);
		assert!(table.get(0).unwrap().is_none());
		assert!(table.set(8, entry).is_err());
	}
}
