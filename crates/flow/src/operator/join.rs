// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use riffle_core::expression::{Expression, evaluate};
use riffle_type::{Key, OrdKey, Row, Value};

use super::{DiffKind, FlowDiff, PipeRow};
use crate::{
	Result,
	compile::FromExec,
	ir::JoinType,
};

/// An incremental binary join. State is the full row set per side plus a
/// join-value index; a change re-derives the outputs of the affected join
/// values only and diffs them against what was last emitted for those
/// values.
pub(crate) struct JoinExec {
	pub(crate) from: FromExec,
	join_type: JoinType,
	/// Extractor evaluated over the accumulated left namespace.
	left_key: Option<Expression>,
	/// Extractor evaluated over the right row alone.
	right_key: Option<Expression>,
	right_alias: String,
	left_aliases: Vec<String>,
	default_alias: String,

	left_rows: IndexMap<Key, (OrdKey, PipeRow)>,
	right_rows: IndexMap<Key, (OrdKey, Row)>,
	left_index: HashMap<OrdKey, BTreeSet<Key>>,
	right_index: HashMap<OrdKey, BTreeSet<Key>>,
	emitted: HashMap<OrdKey, IndexMap<Key, PipeRow>>,
}

impl JoinExec {
	pub(crate) fn new(
		from: FromExec,
		join_type: JoinType,
		left_key: Option<Expression>,
		right_key: Option<Expression>,
		left_aliases: Vec<String>,
		default_alias: String,
	) -> Self {
		let right_alias = from.alias().to_string();
		Self {
			from,
			join_type,
			left_key,
			right_key,
			right_alias,
			left_aliases,
			default_alias,
			left_rows: IndexMap::new(),
			right_rows: IndexMap::new(),
			left_index: HashMap::new(),
			right_index: HashMap::new(),
			emitted: HashMap::new(),
		}
	}

	pub(crate) fn apply(
		&mut self,
		left_diffs: Vec<FlowDiff>,
		right_diffs: Vec<FlowDiff>,
	) -> Result<Vec<FlowDiff>> {
		let mut affected: BTreeSet<OrdKey> = BTreeSet::new();

		for diff in left_diffs {
			let key = diff.key;
			match diff.kind {
				DiffKind::Insert {
					post,
				} => {
					let value = self.left_value(&post);
					affected.insert(value.clone());
					self.left_index.entry(value.clone()).or_default().insert(key.clone());
					self.left_rows.insert(key, (value, post));
				}
				DiffKind::Update {
					post,
					..
				} => {
					if let Some((old_value, _)) = self.left_rows.get(&key) {
						let old_value = old_value.clone();
						affected.insert(old_value.clone());
						remove_index(&mut self.left_index, &old_value, &key);
					}
					let value = self.left_value(&post);
					affected.insert(value.clone());
					self.left_index.entry(value.clone()).or_default().insert(key.clone());
					self.left_rows.insert(key, (value, post));
				}
				DiffKind::Remove {
					..
				} => {
					if let Some((old_value, _)) = self.left_rows.shift_remove(&key) {
						affected.insert(old_value.clone());
						remove_index(&mut self.left_index, &old_value, &key);
					}
				}
			}
		}

		for diff in right_diffs {
			let key = diff.key;
			match diff.kind {
				DiffKind::Insert {
					post,
				} => {
					let row = table_row(&post, &self.right_alias);
					let value = self.right_value(&row);
					affected.insert(value.clone());
					self.right_index.entry(value.clone()).or_default().insert(key.clone());
					self.right_rows.insert(key, (value, row));
				}
				DiffKind::Update {
					post,
					..
				} => {
					if let Some((old_value, _)) = self.right_rows.get(&key) {
						let old_value = old_value.clone();
						affected.insert(old_value.clone());
						remove_index(&mut self.right_index, &old_value, &key);
					}
					let row = table_row(&post, &self.right_alias);
					let value = self.right_value(&row);
					affected.insert(value.clone());
					self.right_index.entry(value.clone()).or_default().insert(key.clone());
					self.right_rows.insert(key, (value, row));
				}
				DiffKind::Remove {
					..
				} => {
					if let Some((old_value, _)) = self.right_rows.shift_remove(&key) {
						affected.insert(old_value.clone());
						remove_index(&mut self.right_index, &old_value, &key);
					}
				}
			}
		}

		let mut out = Vec::new();
		for value in affected {
			let fresh = self.outputs_for(&value);
			let previous = self.emitted.remove(&value).unwrap_or_default();

			for (key, pre) in &previous {
				if !fresh.contains_key(key) {
					out.push(FlowDiff::remove(key.clone(), pre.clone()));
				}
			}
			for (key, post) in &fresh {
				match previous.get(key) {
					None => out.push(FlowDiff::insert(key.clone(), post.clone())),
					Some(pre) if pre != post => {
						out.push(FlowDiff::update(key.clone(), pre.clone(), post.clone()))
					}
					Some(_) => {}
				}
			}
			if !fresh.is_empty() {
				self.emitted.insert(value, fresh);
			}
		}
		Ok(out)
	}

	fn outputs_for(&self, value: &OrdKey) -> IndexMap<Key, PipeRow> {
		let lefts: Vec<&Key> = self.left_index.get(value).into_iter().flatten().collect();
		let rights: Vec<&Key> = self.right_index.get(value).into_iter().flatten().collect();

		let mut outputs = IndexMap::new();
		for &left_key in &lefts {
			let (_, left) = &self.left_rows[left_key];
			let mut matched = false;
			for &right_key in &rights {
				let (_, right) = &self.right_rows[right_key];
				matched = true;
				let mut joined = left.clone();
				joined.tables.insert(self.right_alias.clone(), right.clone());
				outputs.insert(combine_keys(Some(left_key), Some(right_key)), joined);
			}
			if !matched && matches!(self.join_type, JoinType::Left | JoinType::Full) {
				let mut padded = left.clone();
				padded.tables.insert(self.right_alias.clone(), Row::new());
				outputs.insert(combine_keys(Some(left_key), None), padded);
			}
		}
		if matches!(self.join_type, JoinType::Right | JoinType::Full) {
			for &right_key in &rights {
				if !lefts.is_empty() {
					continue;
				}
				let (_, right) = &self.right_rows[right_key];
				let mut padded = PipeRow {
					tables: IndexMap::new(),
					selected: None,
					order_index: None,
				};
				for alias in &self.left_aliases {
					padded.tables.insert(alias.clone(), Row::new());
				}
				padded.tables.insert(self.right_alias.clone(), right.clone());
				outputs.insert(combine_keys(None, Some(right_key)), padded);
			}
		}
		outputs
	}

	fn left_value(&self, pipe: &PipeRow) -> OrdKey {
		match &self.left_key {
			Some(expression) => OrdKey(
				evaluate(expression, &pipe.namespace(&self.default_alias))
					.unwrap_or(Value::Undefined),
			),
			None => OrdKey(Value::Bool(true)),
		}
	}

	fn right_value(&self, row: &Row) -> OrdKey {
		match &self.right_key {
			Some(expression) => {
				OrdKey(evaluate(expression, row).unwrap_or(Value::Undefined))
			}
			None => OrdKey(Value::Bool(true)),
		}
	}
}

fn table_row(pipe: &PipeRow, alias: &str) -> Row {
	pipe.tables.get(alias).cloned().unwrap_or_else(|| pipe.output_row())
}

fn remove_index(index: &mut HashMap<OrdKey, BTreeSet<Key>>, value: &OrdKey, key: &Key) {
	if let Some(bucket) = index.get_mut(value) {
		bucket.remove(key);
		if bucket.is_empty() {
			index.remove(value);
		}
	}
}

fn combine_keys(left: Option<&Key>, right: Option<&Key>) -> Key {
	match (left, right) {
		(Some(left), Some(right)) => Key::Text(format!("{left}/{right}")),
		(Some(left), None) => Key::Text(format!("{left}/-")),
		(None, Some(right)) => Key::Text(format!("-/{right}")),
		(None, None) => Key::Text("-/-".to_string()),
	}
}
