// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	ops::Bound,
};

use riffle_type::{Key, OrdKey, Row, Value};

use super::{CollectionIndex, IndexLookup, IndexRange};
use crate::{
	Error, Result,
	expression::{Expression, evaluate},
};

/// The default index: extracted value → keys, ordered by the total value
/// order, with a reverse map for O(log n) maintenance.
pub struct OrderedIndex {
	expression: Expression,
	entries: BTreeMap<OrdKey, BTreeSet<Key>>,
	value_map: HashMap<Key, OrdKey>,
}

impl OrderedIndex {
	/// Create an index over a row extractor expression. Aggregates cannot
	/// be extracted from a single row and are rejected here.
	pub fn new(expression: Expression) -> Result<Self> {
		if expression.contains_aggregate() {
			return Err(Error::InvalidIndexExpression {
				reason: "extractor contains an aggregate".to_string(),
			});
		}
		Ok(Self {
			expression,
			entries: BTreeMap::new(),
			value_map: HashMap::new(),
		})
	}

	pub fn expression(&self) -> &Expression {
		&self.expression
	}

	fn extract(&self, row: &Row) -> OrdKey {
		// The extractor was validated aggregate-free in `new`, so
		// evaluation cannot fail.
		OrdKey(evaluate(&self.expression, row).unwrap_or(Value::Undefined))
	}

	pub fn eq(&self, value: &Value) -> BTreeSet<Key> {
		self.entries.get(&OrdKey(value.clone())).cloned().unwrap_or_default()
	}

	pub fn in_values(&self, values: &[Value]) -> BTreeSet<Key> {
		let mut keys = BTreeSet::new();
		for value in values {
			keys.extend(self.eq(value));
		}
		keys
	}

	pub fn range(&self, range: &IndexRange) -> BTreeSet<Key> {
		let lower = match &range.from {
			Some(value) if range.from_inclusive => Bound::Included(OrdKey(value.clone())),
			Some(value) => Bound::Excluded(OrdKey(value.clone())),
			None => Bound::Unbounded,
		};
		let upper = match &range.to {
			Some(value) if range.to_inclusive => Bound::Included(OrdKey(value.clone())),
			Some(value) => Bound::Excluded(OrdKey(value.clone())),
			None => Bound::Unbounded,
		};
		let mut keys = BTreeSet::new();
		for (value, bucket) in self.entries.range((lower, upper)) {
			// Open-ended ranges do not match rows without the
			// indexed field.
			if value.0.is_undefined() {
				continue;
			}
			keys.extend(bucket.iter().cloned());
		}
		keys
	}
}

impl CollectionIndex for OrderedIndex {
	fn build(&mut self, entries: &mut dyn Iterator<Item = (Key, Row)>) {
		self.clear();
		for (key, row) in entries {
			self.add(&key, &row);
		}
	}

	fn add(&mut self, key: &Key, row: &Row) {
		let value = self.extract(row);
		self.value_map.insert(key.clone(), value.clone());
		self.entries.entry(value).or_default().insert(key.clone());
	}

	fn remove(&mut self, key: &Key, _row: &Row) {
		let Some(value) = self.value_map.remove(key) else {
			return;
		};
		if let Some(bucket) = self.entries.get_mut(&value) {
			bucket.remove(key);
			if bucket.is_empty() {
				self.entries.remove(&value);
			}
		}
	}

	fn update(&mut self, key: &Key, prev: &Row, next: &Row) {
		let next_value = self.extract(next);
		if self.value_map.get(key) == Some(&next_value) {
			return;
		}
		self.remove(key, prev);
		self.value_map.insert(key.clone(), next_value.clone());
		self.entries.entry(next_value).or_default().insert(key.clone());
	}

	fn clear(&mut self) {
		self.entries.clear();
		self.value_map.clear();
	}

	fn lookup(&self, lookup: &IndexLookup) -> BTreeSet<Key> {
		match lookup {
			IndexLookup::Eq(value) => self.eq(value),
			IndexLookup::In(values) => self.in_values(values),
			IndexLookup::Range(range) => self.range(range),
		}
	}

	fn value_count(&self) -> usize {
		self.entries.len()
	}
}
