// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	cmp::Ordering,
	fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::Value;

/// Sort direction for ordered reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
	Asc,
	Desc,
}

/// A collection key, derived from a row. Keys are either integers or text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
	Int(i64),
	Text(String),
}

impl PartialOrd for Key {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Key {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Key::Int(l), Key::Int(r)) => l.cmp(r),
			(Key::Text(l), Key::Text(r)) => l.cmp(r),
			(Key::Int(_), Key::Text(_)) => Ordering::Less,
			(Key::Text(_), Key::Int(_)) => Ordering::Greater,
		}
	}
}

impl Display for Key {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Key::Int(value) => Display::fmt(value, f),
			Key::Text(value) => Display::fmt(value, f),
		}
	}
}

impl From<i64> for Key {
	fn from(value: i64) -> Self {
		Key::Int(value)
	}
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Key::Text(value.to_string())
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Key::Text(value)
	}
}

impl TryFrom<Value> for Key {
	type Error = crate::Error;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Int(v) => Ok(Key::Int(v)),
			Value::Text(v) => Ok(Key::Text(v)),
			other => Err(crate::Error::InvalidKey {
				kind: other.kind(),
			}),
		}
	}
}

impl From<Key> for Value {
	fn from(key: Key) -> Self {
		match key {
			Key::Int(v) => Value::Int(v),
			Key::Text(v) => Value::Text(v),
		}
	}
}
