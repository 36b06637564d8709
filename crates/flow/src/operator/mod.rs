// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The incremental operators a query compiles to. Every operator consumes
//! and produces keyed diffs; stateful operators keep just enough state to
//! re-derive the outputs affected by a change.

pub(crate) use distinct::DistinctExec;
pub(crate) use group::GroupExec;
pub(crate) use join::JoinExec;
pub(crate) use order::OrderExec;
pub(crate) use select::SelectOp;

mod distinct;
mod group;
mod join;
mod order;
mod select;

use indexmap::IndexMap;
use riffle_core::{
	ChangeEvent, ChangeType,
	expression::{Expression, Namespace, evaluate},
};
use riffle_type::{Key, Row, Value};

/// The row flowing through a pipeline: the alias → row namespace, the
/// projected sidecar once SELECT ran, and the order index once ORDER BY
/// ran. The namespace survives SELECT so ORDER BY can still reach the
/// source tables.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PipeRow {
	pub tables: IndexMap<String, Row>,
	pub selected: Option<Row>,
	pub order_index: Option<Value>,
}

impl PipeRow {
	pub(crate) fn single(alias: &str, row: Row) -> Self {
		let mut tables = IndexMap::new();
		tables.insert(alias.to_string(), row);
		Self {
			tables,
			selected: None,
			order_index: None,
		}
	}

	pub(crate) fn namespace<'a>(&'a self, default_alias: &'a str) -> Namespace<'a> {
		Namespace {
			rows: &self.tables,
			default_alias,
		}
	}

	/// The row this pipe row delivers: the projection when one ran, the
	/// single source row otherwise, or the namespace nested row by row.
	pub(crate) fn output_row(&self) -> Row {
		if let Some(selected) = &self.selected {
			return selected.clone();
		}
		if self.tables.len() == 1 {
			return self.tables.values().next().cloned().unwrap_or_default();
		}
		self.tables
			.iter()
			.map(|(alias, row)| (alias.clone(), Value::Row(row.clone())))
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DiffKind {
	Insert { post: PipeRow },
	Update { pre: PipeRow, post: PipeRow },
	Remove { pre: PipeRow },
}

/// One keyed change moving through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlowDiff {
	pub key: Key,
	pub kind: DiffKind,
}

impl FlowDiff {
	pub(crate) fn insert(key: Key, post: PipeRow) -> Self {
		Self {
			key,
			kind: DiffKind::Insert {
				post,
			},
		}
	}

	pub(crate) fn update(key: Key, pre: PipeRow, post: PipeRow) -> Self {
		Self {
			key,
			kind: DiffKind::Update {
				pre,
				post,
			},
		}
	}

	pub(crate) fn remove(key: Key, pre: PipeRow) -> Self {
		Self {
			key,
			kind: DiffKind::Remove {
				pre,
			},
		}
	}
}

/// Wrap upstream collection change events for the pipeline.
pub(crate) fn wrap_events(alias: &str, events: &[ChangeEvent]) -> Vec<FlowDiff> {
	events.iter()
		.map(|event| {
			let key = event.key.clone();
			match event.change_type {
				ChangeType::Insert => {
					FlowDiff::insert(key, PipeRow::single(alias, event.value.clone()))
				}
				ChangeType::Update => FlowDiff::update(
					key,
					PipeRow::single(alias, event.previous.clone().unwrap_or_default()),
					PipeRow::single(alias, event.value.clone()),
				),
				ChangeType::Delete => {
					FlowDiff::remove(key, PipeRow::single(alias, event.value.clone()))
				}
			}
		})
		.collect()
}

/// Incremental filter: updates crossing the predicate boundary become
/// inserts (entering) or removes (leaving).
pub(crate) fn filter_diffs(diffs: Vec<FlowDiff>, matches: impl Fn(&PipeRow) -> bool) -> Vec<FlowDiff> {
	diffs.into_iter()
		.filter_map(|diff| match diff.kind {
			DiffKind::Insert {
				post,
			} => matches(&post).then(|| FlowDiff::insert(diff.key, post)),
			DiffKind::Remove {
				pre,
			} => matches(&pre).then(|| FlowDiff::remove(diff.key, pre)),
			DiffKind::Update {
				pre,
				post,
			} => match (matches(&pre), matches(&post)) {
				(true, true) => Some(FlowDiff::update(diff.key, pre, post)),
				(false, true) => Some(FlowDiff::insert(diff.key, post)),
				(true, false) => Some(FlowDiff::remove(diff.key, pre)),
				(false, false) => None,
			},
		})
		.collect()
}

/// Evaluate a predicate expression against a pipe row; anything that does
/// not evaluate to true filters out.
pub(crate) fn expression_matches(expression: &Expression, pipe: &PipeRow, default_alias: &str) -> bool {
	evaluate(expression, &pipe.namespace(default_alias))
		.map(|value| value.is_truthy())
		.unwrap_or(false)
}
