// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{cmp::Ordering, collections::HashMap, hash::Hash, sync::Arc};

/// Comparator over map values.
pub type ValueComparator<V> = Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>;

struct Slot<V> {
	value: V,
	seq: u64,
}

/// A key → value map iterated in value-comparator order, ties broken by
/// insertion order. `set` repositions an existing key when its value's
/// ordering changes.
pub struct OrderedMap<K, V> {
	slots: HashMap<K, Slot<V>>,
	order: Vec<K>,
	comparator: ValueComparator<V>,
	next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
	pub fn new(comparator: ValueComparator<V>) -> Self {
		Self {
			slots: HashMap::new(),
			order: Vec::new(),
			comparator,
			next_seq: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn get(&self, key: &K) -> Option<&V> {
		self.slots.get(key).map(|slot| &slot.value)
	}

	pub fn has(&self, key: &K) -> bool {
		self.slots.contains_key(key)
	}

	pub fn set(&mut self, key: K, value: V) {
		if let Some(slot) = self.slots.get(&key) {
			let position = self
				.position_of(&slot.value, slot.seq)
				.expect("ordered map key present but not positioned");
			self.order.remove(position);
		}
		let seq = self.next_seq;
		self.next_seq += 1;
		let position = self.insertion_point(&value, seq);
		self.order.insert(position, key.clone());
		self.slots.insert(key, Slot {
			value,
			seq,
		});
	}

	pub fn delete(&mut self, key: &K) -> Option<V> {
		// The position must be resolved while the slot is still in
		// place; the comparator reads it through the order array.
		let position = {
			let slot = self.slots.get(key)?;
			self.position_of(&slot.value, slot.seq)
		};
		if let Some(position) = position {
			self.order.remove(position);
		}
		self.slots.remove(key).map(|slot| slot.value)
	}

	/// Keep only the entries the predicate accepts, preserving order.
	pub fn retain(&mut self, keep: impl Fn(&K, &V) -> bool) {
		let dropped: Vec<K> = self
			.entries()
			.filter(|(key, value)| !keep(key, value))
			.map(|(key, _)| key.clone())
			.collect();
		for key in dropped {
			self.delete(&key);
		}
	}

	pub fn clear(&mut self) {
		self.slots.clear();
		self.order.clear();
	}

	/// Keys in value order.
	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.order.iter()
	}

	/// Values in value order.
	pub fn values(&self) -> impl Iterator<Item = &V> {
		self.order.iter().map(|key| &self.slots[key].value)
	}

	/// Entries in value order.
	pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
		self.order.iter().map(|key| (key, &self.slots[key].value))
	}

	fn compare(&self, value: &V, seq: u64, key: &K) -> Ordering {
		let other = &self.slots[key];
		(self.comparator)(value, &other.value).then_with(|| seq.cmp(&other.seq))
	}

	fn insertion_point(&self, value: &V, seq: u64) -> usize {
		self.order
			.binary_search_by(|key| self.compare(value, seq, key).reverse())
			.unwrap_or_else(|position| position)
	}

	fn position_of(&self, value: &V, seq: u64) -> Option<usize> {
		self.order
			.binary_search_by(|key| self.compare(value, seq, key).reverse())
			.ok()
	}
}
