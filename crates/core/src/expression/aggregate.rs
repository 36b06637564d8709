// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeMap;

use riffle_type::{OrdKey, Value, compare_values};
use serde::{Deserialize, Serialize};

/// Aggregate functions computable per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
	Sum,
	Count,
	Avg,
	Min,
	Max,
	Median,
	Mode,
}

impl AggregateFunction {
	/// Compute the aggregate over the argument values of one group.
	/// Undefined values are skipped; `Count` with no argument counts rows
	/// and is handled by the caller passing every row's marker value.
	pub fn compute(&self, values: &[Value]) -> Value {
		let defined: Vec<&Value> = values.iter().filter(|v| !v.is_undefined()).collect();
		match self {
			AggregateFunction::Count => Value::Int(defined.len() as i64),
			AggregateFunction::Sum => sum(&defined),
			AggregateFunction::Avg => {
				if defined.is_empty() {
					return Value::Undefined;
				}
				let total = match sum(&defined).as_f64() {
					Some(total) => total,
					None => return Value::Undefined,
				};
				Value::float(total / defined.len() as f64)
			}
			AggregateFunction::Min => defined
				.iter()
				.min_by(|a, b| compare_values(a, b))
				.map(|v| (*v).clone())
				.unwrap_or(Value::Undefined),
			AggregateFunction::Max => defined
				.iter()
				.max_by(|a, b| compare_values(a, b))
				.map(|v| (*v).clone())
				.unwrap_or(Value::Undefined),
			AggregateFunction::Median => median(&defined),
			AggregateFunction::Mode => mode(&defined),
		}
	}
}

fn sum(defined: &[&Value]) -> Value {
	if defined.is_empty() {
		return Value::Int(0);
	}
	if defined.iter().all(|v| matches!(v, Value::Int(_))) {
		let mut total = 0i64;
		for value in defined {
			if let Value::Int(v) = value {
				total = total.wrapping_add(*v);
			}
		}
		return Value::Int(total);
	}
	let mut total = 0f64;
	for value in defined {
		match value.as_f64() {
			Some(v) => total += v,
			None => return Value::Undefined,
		}
	}
	Value::float(total)
}

fn median(defined: &[&Value]) -> Value {
	if defined.is_empty() {
		return Value::Undefined;
	}
	let mut sorted: Vec<&Value> = defined.to_vec();
	sorted.sort_by(|a, b| compare_values(a, b));
	let mid = sorted.len() / 2;
	if sorted.len() % 2 == 1 {
		return sorted[mid].clone();
	}
	match (sorted[mid - 1].as_f64(), sorted[mid].as_f64()) {
		(Some(lo), Some(hi)) => Value::float((lo + hi) / 2.0),
		// Even count of non-numeric values: take the lower middle.
		_ => sorted[mid - 1].clone(),
	}
}

fn mode(defined: &[&Value]) -> Value {
	if defined.is_empty() {
		return Value::Undefined;
	}
	let mut counts: BTreeMap<OrdKey, usize> = BTreeMap::new();
	for value in defined {
		*counts.entry(OrdKey((*value).clone())).or_default() += 1;
	}
	// Ties resolve to the smallest value.
	let mut best: Option<(Value, usize)> = None;
	for (value, count) in counts {
		if best.as_ref().is_none_or(|(_, best_count)| count > *best_count) {
			best = Some((value.0, count));
		}
	}
	best.map(|(value, _)| value).unwrap_or(Value::Undefined)
}
