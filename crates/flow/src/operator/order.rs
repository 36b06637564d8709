// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	cmp::Ordering,
	collections::{BTreeMap, HashMap},
};

use indexmap::IndexMap;
use riffle_core::expression::evaluate;
use riffle_type::{Key, OrdKey, SortDirection, Value};

use super::{DiffKind, FlowDiff, PipeRow};
use crate::ir::{OrderByClause, OrderIndexKind};

/// Composite sort key: compares column by column, honoring each column's
/// direction, with the row key as the final tie-break (held by the map
/// key tuple).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortKey(Vec<(OrdKey, SortDirection)>);

impl PartialOrd for SortKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for SortKey {
	fn cmp(&self, other: &Self) -> Ordering {
		for ((left, direction), (right, _)) in self.0.iter().zip(other.0.iter()) {
			let ordering = left.cmp(right);
			let ordering = match direction {
				SortDirection::Asc => ordering,
				SortDirection::Desc => ordering.reverse(),
			};
			if ordering != Ordering::Equal {
				return ordering;
			}
		}
		self.0.len().cmp(&other.0.len())
	}
}

/// Incremental ORDER BY with LIMIT / OFFSET. Keeps the whole ordered row
/// set; every tick re-derives the visible window and diffs it against the
/// previously emitted one, tagging rows with a numeric or fractional
/// order index.
pub(crate) struct OrderExec {
	order_by: Vec<OrderByClause>,
	kind: OrderIndexKind,
	limit: Option<usize>,
	offset: usize,
	default_alias: String,

	rows: BTreeMap<(SortKey, Key), PipeRow>,
	key_sort: HashMap<Key, SortKey>,
	emitted: IndexMap<Key, (PipeRow, Value)>,
	fractional: HashMap<Key, f64>,
}

impl OrderExec {
	pub(crate) fn new(
		order_by: Vec<OrderByClause>,
		kind: OrderIndexKind,
		limit: Option<usize>,
		offset: Option<usize>,
		default_alias: String,
	) -> Self {
		Self {
			order_by,
			kind,
			limit,
			offset: offset.unwrap_or(0),
			default_alias,
			rows: BTreeMap::new(),
			key_sort: HashMap::new(),
			emitted: IndexMap::new(),
			fractional: HashMap::new(),
		}
	}

	pub(crate) fn apply(&mut self, diffs: Vec<FlowDiff>) -> Vec<FlowDiff> {
		for diff in diffs {
			let key = diff.key;
			match diff.kind {
				DiffKind::Insert {
					post,
				}
				| DiffKind::Update {
					post,
					..
				} => {
					self.remove_row(&key);
					let sort = self.sort_key(&post);
					self.key_sort.insert(key.clone(), sort.clone());
					self.rows.insert((sort, key), post);
				}
				DiffKind::Remove {
					..
				} => self.remove_row(&key),
			}
		}
		self.rediff_window()
	}

	fn remove_row(&mut self, key: &Key) {
		if let Some(sort) = self.key_sort.remove(key) {
			self.rows.remove(&(sort, key.clone()));
		}
	}

	fn sort_key(&self, pipe: &PipeRow) -> SortKey {
		let columns = self
			.order_by
			.iter()
			.map(|clause| {
				// The namespace survives SELECT; fall back to the
				// projection for references to select aliases.
				let mut value = evaluate(
					&clause.expression,
					&pipe.namespace(&self.default_alias),
				)
				.unwrap_or(Value::Undefined);
				if value.is_undefined() {
					if let Some(selected) = &pipe.selected {
						value = evaluate(&clause.expression, selected)
							.unwrap_or(Value::Undefined);
					}
				}
				(OrdKey(value), clause.direction)
			})
			.collect();
		SortKey(columns)
	}

	fn rediff_window(&mut self) -> Vec<FlowDiff> {
		let window: Vec<(Key, PipeRow)> = self
			.rows
			.iter()
			.skip(self.offset)
			.take(self.limit.unwrap_or(usize::MAX))
			.map(|((_, key), pipe)| (key.clone(), pipe.clone()))
			.collect();

		let mut fresh: IndexMap<Key, (PipeRow, Value)> = IndexMap::new();
		match self.kind {
			OrderIndexKind::Numeric => {
				for (position, (key, mut pipe)) in window.into_iter().enumerate() {
					let index = Value::Int(position as i64);
					pipe.order_index = Some(index.clone());
					fresh.insert(key, (pipe, index));
				}
			}
			OrderIndexKind::Fractional => {
				let assigned = self.assign_fractional(&window);
				for ((key, mut pipe), index) in window.into_iter().zip(assigned) {
					let index = Value::float(index);
					pipe.order_index = Some(index.clone());
					fresh.insert(key, (pipe, index));
				}
			}
		}

		let mut out = Vec::new();
		for (key, (pre, _)) in &self.emitted {
			if !fresh.contains_key(key) {
				out.push(FlowDiff::remove(key.clone(), pre.clone()));
			}
		}
		for (key, (post, index)) in &fresh {
			match self.emitted.get(key) {
				None => out.push(FlowDiff::insert(key.clone(), post.clone())),
				Some((pre, pre_index)) if pre != post || pre_index != index => {
					out.push(FlowDiff::update(key.clone(), pre.clone(), post.clone()));
				}
				Some(_) => {}
			}
		}
		self.emitted = fresh;
		out
	}

	/// Keep a row's fractional index while its relative position holds;
	/// newcomers take the midpoint to the next kept index.
	fn assign_fractional(&mut self, window: &[(Key, PipeRow)]) -> Vec<f64> {
		let mut assigned = Vec::with_capacity(window.len());
		let mut last = 0.0f64;
		for (position, (key, _)) in window.iter().enumerate() {
			let keep = self.fractional.get(key).copied().filter(|f| *f > last);
			let index = match keep {
				Some(index) => index,
				None => {
					let next_kept = window[position + 1..]
						.iter()
						.filter_map(|(k, _)| self.fractional.get(k).copied())
						.find(|f| *f > last);
					match next_kept {
						Some(next) => (last + next) / 2.0,
						None => last + 1.0,
					}
				}
			};
			assigned.push(index);
			last = index;
		}
		self.fractional = window
			.iter()
			.zip(assigned.iter())
			.map(|((key, _), index)| (key.clone(), *index))
			.collect();
		assigned
	}
}
