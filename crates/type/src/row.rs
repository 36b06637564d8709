// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	fmt::{Display, Formatter},
	hash::{Hash, Hasher},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Value;

/// A row of named values. Field order is insertion order and is preserved
/// through clones, merges and serialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, Value>);

impl Hash for Row {
	fn hash<H: Hasher>(&self, state: &mut H) {
		// IndexMap's `Eq` ignores field order, so the hash must too: combine
		// each entry's hash order-independently instead of hashing the map
		// as a sequence.
		let mut combined: u64 = 0;
		for (key, value) in self.0.iter() {
			let mut entry_hasher = std::collections::hash_map::DefaultHasher::new();
			(key, value).hash(&mut entry_hasher);
			combined ^= entry_hasher.finish();
		}
		combined.hash(state);
	}
}

impl Row {
	pub fn new() -> Self {
		Self(IndexMap::new())
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	/// Resolve a dotted path into nested rows.
	pub fn get_path(&self, path: &[String]) -> Option<&Value> {
		let (first, rest) = path.split_first()?;
		let value = self.0.get(first)?;
		if rest.is_empty() {
			return Some(value);
		}
		match value {
			Value::Row(row) => row.get_path(rest),
			_ => None,
		}
	}

	pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(field.into(), value.into())
	}

	pub fn remove(&mut self, field: &str) -> Option<Value> {
		self.0.shift_remove(field)
	}

	pub fn contains_field(&self, field: &str) -> bool {
		self.0.contains_key(field)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn fields(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Merge `patch` over this row, field by field. Later fields win;
	/// nested rows are replaced, not recursed into.
	pub fn merge(&self, patch: &Row) -> Row {
		let mut merged = self.clone();
		for (field, value) in patch.iter() {
			merged.set(field, value.clone());
		}
		merged
	}

	/// Keep only the given fields, in this row's order.
	pub fn project(&self, fields: &[&str]) -> Row {
		self.0
			.iter()
			.filter(|(field, _)| fields.contains(&field.as_str()))
			.map(|(field, value)| (field.clone(), value.clone()))
			.collect()
	}

	/// Fields of `self` whose values differ from `other`, plus fields
	/// missing from `other` entirely.
	pub fn diff_fields(&self, other: &Row) -> Vec<String> {
		self.0
			.iter()
			.filter(|(field, value)| other.get(field) != Some(value))
			.map(|(field, _)| field.clone())
			.collect()
	}
}

impl Display for Row {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str("{")?;
		for (i, (field, value)) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{field}: {value}")?;
		}
		f.write_str("}")
	}
}

impl FromIterator<(String, Value)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl From<IndexMap<String, Value>> for Row {
	fn from(fields: IndexMap<String, Value>) -> Self {
		Self(fields)
	}
}

impl IntoIterator for Row {
	type Item = (String, Value);
	type IntoIter = indexmap::map::IntoIter<String, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
