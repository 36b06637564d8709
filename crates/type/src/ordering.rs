// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Total order over values, used by indexes and ORDER BY.
///
/// Same-kind values compare natively: numbers numerically (integers and
/// floats compare with each other), text lexicographically, booleans with
/// false before true, lists element-wise. Undefined values are equal to each
/// other and sort after everything else. Any remaining combination falls
/// back to comparing the rendered text of both values.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
	match (left, right) {
		(Value::Undefined, Value::Undefined) => Ordering::Equal,
		(Value::Undefined, _) => Ordering::Greater,
		(_, Value::Undefined) => Ordering::Less,
		(Value::Bool(l), Value::Bool(r)) => l.cmp(r),
		(Value::Int(l), Value::Int(r)) => l.cmp(r),
		(Value::Float(l), Value::Float(r)) => l.cmp(r),
		(Value::Int(l), Value::Float(r)) => (*l as f64).total_cmp(&r.value()),
		(Value::Float(l), Value::Int(r)) => l.value().total_cmp(&(*r as f64)),
		(Value::Text(l), Value::Text(r)) => l.cmp(r),
		(Value::List(l), Value::List(r)) => {
			for (lv, rv) in l.iter().zip(r.iter()) {
				match compare_values(lv, rv) {
					Ordering::Equal => continue,
					other => return other,
				}
			}
			l.len().cmp(&r.len())
		}
		(l, r) => l.to_string().cmp(&r.to_string()),
	}
}

/// A value wrapper whose `Ord` is [`compare_values`], usable as an ordered
/// index key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrdKey(pub Value);

impl PartialOrd for OrdKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for OrdKey {
	fn cmp(&self, other: &Self) -> Ordering {
		compare_values(&self.0, &other.0)
	}
}

impl From<Value> for OrdKey {
	fn from(value: Value) -> Self {
		Self(value)
	}
}
