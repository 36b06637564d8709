// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_core::expression::evaluate;
use riffle_type::{Row, Value};

use super::{DiffKind, FlowDiff, PipeRow};
use crate::ir::{RowProjection, SelectEntry};

/// Stateless projection. Spread entries splice a whole table without
/// overwriting explicitly selected fields; the namespace stays on the pipe
/// row for downstream ORDER BY.
pub(crate) struct SelectOp {
	entries: Vec<SelectEntry>,
	fn_select: Option<RowProjection>,
	default_alias: String,
}

impl SelectOp {
	pub(crate) fn new(
		entries: Vec<SelectEntry>,
		fn_select: Option<RowProjection>,
		default_alias: String,
	) -> Self {
		Self {
			entries,
			fn_select,
			default_alias,
		}
	}

	pub(crate) fn project(&self, pipe: &PipeRow) -> Row {
		let mut out = project_entries(&self.entries, pipe, &self.default_alias);
		if let Some(fn_select) = &self.fn_select {
			let projected = fn_select(&pipe.tables);
			for (field, value) in projected {
				out.set(field, value);
			}
		}
		out
	}

	pub(crate) fn apply(&self, diffs: Vec<FlowDiff>) -> Vec<FlowDiff> {
		diffs.into_iter()
			.map(|diff| {
				let kind = match diff.kind {
					DiffKind::Insert {
						post,
					} => DiffKind::Insert {
						post: self.with_selection(post),
					},
					DiffKind::Update {
						pre,
						post,
					} => DiffKind::Update {
						pre: self.with_selection(pre),
						post: self.with_selection(post),
					},
					DiffKind::Remove {
						pre,
					} => DiffKind::Remove {
						pre: self.with_selection(pre),
					},
				};
				FlowDiff {
					key: diff.key,
					kind,
				}
			})
			.collect()
	}

	fn with_selection(&self, mut pipe: PipeRow) -> PipeRow {
		pipe.selected = Some(self.project(&pipe));
		pipe
	}
}

/// Evaluate the select entries against a pipe row. Explicit fields win
/// over spreads regardless of listing order.
pub(crate) fn project_entries(entries: &[SelectEntry], pipe: &PipeRow, default_alias: &str) -> Row {
	let explicit: Vec<&str> = entries
		.iter()
		.filter_map(|entry| match entry {
			SelectEntry::Field(name, _) => Some(name.as_str()),
			SelectEntry::Spread(_) => None,
		})
		.collect();

	let mut out = Row::new();
	for entry in entries {
		match entry {
			SelectEntry::Field(name, expression) => {
				let value = evaluate(expression, &pipe.namespace(default_alias))
					.unwrap_or(Value::Undefined);
				out.set(name.clone(), value);
			}
			SelectEntry::Spread(alias) => {
				let Some(table) = pipe.tables.get(alias) else {
					continue;
				};
				for (field, value) in table.iter() {
					if !explicit.contains(&field) && !out.contains_field(field) {
						out.set(field, value.clone());
					}
				}
			}
		}
	}
	out
}
