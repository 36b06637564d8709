// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use riffle_core::expression::{
	AggregateExpression, ArithExpression, CallExpression, CompareExpression, Expression, InExpression,
	evaluate,
};
use riffle_type::{Key, OrdKey, Row, Value};

use super::{DiffKind, FlowDiff, PipeRow};
use crate::{
	Result,
	ir::{ProjectedPredicate, SelectEntry},
};

/// Incremental GROUP BY with aggregates and HAVING. Groups re-aggregate
/// when their membership changes; everything else stays untouched. An
/// empty `group_by` is the implicit single group induced by aggregates in
/// SELECT.
pub(crate) struct GroupExec {
	group_by: Vec<Expression>,
	select: Vec<SelectEntry>,
	having: Vec<Expression>,
	fn_having: Vec<ProjectedPredicate>,
	default_alias: String,

	rows: HashMap<Key, (OrdKey, PipeRow)>,
	members: HashMap<OrdKey, IndexMap<Key, ()>>,
	emitted: HashMap<OrdKey, (Row, PipeRow)>,
}

impl GroupExec {
	pub(crate) fn new(
		group_by: Vec<Expression>,
		select: Vec<SelectEntry>,
		having: Vec<Expression>,
		fn_having: Vec<ProjectedPredicate>,
		default_alias: String,
	) -> Self {
		Self {
			group_by,
			select,
			having,
			fn_having,
			default_alias,
			rows: HashMap::new(),
			members: HashMap::new(),
			emitted: HashMap::new(),
		}
	}

	pub(crate) fn apply(&mut self, diffs: Vec<FlowDiff>) -> Result<Vec<FlowDiff>> {
		let mut affected: BTreeSet<OrdKey> = BTreeSet::new();

		for diff in diffs {
			let key = diff.key;
			match diff.kind {
				DiffKind::Insert {
					post,
				} => self.upsert_row(key, post, &mut affected),
				DiffKind::Update {
					post,
					..
				} => self.upsert_row(key, post, &mut affected),
				DiffKind::Remove {
					..
				} => {
					if let Some((group, _)) = self.rows.remove(&key) {
						affected.insert(group.clone());
						if let Some(members) = self.members.get_mut(&group) {
							members.shift_remove(&key);
							if members.is_empty() {
								self.members.remove(&group);
							}
						}
					}
				}
			}
		}

		let mut out = Vec::new();
		for group in affected {
			let fresh = self.compute_group(&group)?;
			let previous = self.emitted.remove(&group);
			match (previous, fresh) {
				(None, None) => {}
				(None, Some((row, pipe))) => {
					out.push(FlowDiff::insert(group_key(&group), pipe.clone()));
					self.emitted.insert(group, (row, pipe));
				}
				(Some((_, pre_pipe)), None) => {
					out.push(FlowDiff::remove(group_key(&group), pre_pipe));
				}
				(Some((pre_row, pre_pipe)), Some((row, pipe))) => {
					if pre_row != row {
						out.push(FlowDiff::update(
							group_key(&group),
							pre_pipe,
							pipe.clone(),
						));
					}
					self.emitted.insert(group, (row, pipe));
				}
			}
		}
		Ok(out)
	}

	fn upsert_row(&mut self, key: Key, post: PipeRow, affected: &mut BTreeSet<OrdKey>) {
		let group = self.group_of(&post);
		if let Some((old_group, _)) = self.rows.get(&key) {
			let old_group = old_group.clone();
			affected.insert(old_group.clone());
			if let Some(members) = self.members.get_mut(&old_group) {
				members.shift_remove(&key);
				if members.is_empty() {
					self.members.remove(&old_group);
				}
			}
		}
		affected.insert(group.clone());
		self.members.entry(group.clone()).or_default().insert(key.clone(), ());
		self.rows.insert(key, (group, post));
	}

	fn group_of(&self, pipe: &PipeRow) -> OrdKey {
		if self.group_by.is_empty() {
			return OrdKey(Value::Bool(true));
		}
		let values: Vec<Value> = self
			.group_by
			.iter()
			.map(|expression| {
				evaluate(expression, &pipe.namespace(&self.default_alias))
					.unwrap_or(Value::Undefined)
			})
			.collect();
		if values.len() == 1 {
			OrdKey(values.into_iter().next().unwrap_or(Value::Undefined))
		} else {
			OrdKey(Value::List(values))
		}
	}

	/// Aggregate one group into its output row, or `None` when the group
	/// is empty or HAVING rejects it.
	fn compute_group(&self, group: &OrdKey) -> Result<Option<(Row, PipeRow)>> {
		let Some(members) = self.members.get(group) else {
			return Ok(None);
		};
		let rows: Vec<&PipeRow> = members.keys().filter_map(|key| self.rows.get(key)).map(|(_, pipe)| pipe).collect();
		let Some(representative) = rows.first() else {
			return Ok(None);
		};

		let mut out = Row::new();
		let explicit: Vec<&str> = self
			.select
			.iter()
			.filter_map(|entry| match entry {
				SelectEntry::Field(name, _) => Some(name.as_str()),
				SelectEntry::Spread(_) => None,
			})
			.collect();
		for entry in &self.select {
			match entry {
				SelectEntry::Field(name, expression) => {
					let value = self.eval_aggregated(expression, &rows, representative)?;
					out.set(name.clone(), value);
				}
				SelectEntry::Spread(alias) => {
					let Some(table) = representative.tables.get(alias) else {
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

		for predicate in &self.having {
			let keep = evaluate(predicate, &out).map(|v| v.is_truthy()).unwrap_or(false);
			if !keep {
				return Ok(None);
			}
		}
		for predicate in &self.fn_having {
			if !predicate(&out) {
				return Ok(None);
			}
		}

		let pipe = PipeRow {
			tables: representative.tables.clone(),
			selected: Some(out.clone()),
			order_index: None,
		};
		Ok(Some((out, pipe)))
	}

	/// Evaluate a select expression over a group: aggregate nodes compute
	/// over every member, everything else over the representative row.
	fn eval_aggregated(
		&self,
		expression: &Expression,
		rows: &[&PipeRow],
		representative: &PipeRow,
	) -> Result<Value> {
		if !expression.contains_aggregate() {
			return Ok(evaluate(expression, &representative.namespace(&self.default_alias))
				.unwrap_or(Value::Undefined));
		}
		match expression {
			Expression::Aggregate(AggregateExpression {
				func,
				arg,
			}) => match arg {
				None => Ok(Value::Int(rows.len() as i64)),
				Some(arg) => {
					let values: Vec<Value> = rows
						.iter()
						.map(|pipe| {
							evaluate(arg, &pipe.namespace(&self.default_alias))
								.unwrap_or(Value::Undefined)
						})
						.collect();
					Ok(func.compute(&values))
				}
			},
			Expression::Arith(ArithExpression {
				op,
				left,
				right,
			}) => {
				let left = self.eval_aggregated(left, rows, representative)?;
				let right = self.eval_aggregated(right, rows, representative)?;
				let rewritten = Expression::Arith(ArithExpression {
					op: *op,
					left: Box::new(Expression::Constant(left)),
					right: Box::new(Expression::Constant(right)),
				});
				Ok(evaluate(&rewritten, &Row::new()).unwrap_or(Value::Undefined))
			}
			Expression::Compare(CompareExpression {
				op,
				left,
				right,
			}) => {
				let left = self.eval_aggregated(left, rows, representative)?;
				let right = self.eval_aggregated(right, rows, representative)?;
				let rewritten = Expression::Compare(CompareExpression {
					op: *op,
					left: Box::new(Expression::Constant(left)),
					right: Box::new(Expression::Constant(right)),
				});
				Ok(evaluate(&rewritten, &Row::new()).unwrap_or(Value::Undefined))
			}
			Expression::Call(CallExpression {
				func,
				args,
			}) => {
				let args = args
					.iter()
					.map(|arg| {
						self.eval_aggregated(arg, rows, representative)
							.map(|value| Expression::Constant(value))
					})
					.collect::<Result<Vec<_>>>()?;
				let rewritten = Expression::Call(CallExpression {
					func: *func,
					args,
				});
				Ok(evaluate(&rewritten, &Row::new()).unwrap_or(Value::Undefined))
			}
			Expression::And(left, right) | Expression::Or(left, right) => {
				let is_and = matches!(expression, Expression::And(..));
				let left = self.eval_aggregated(left, rows, representative)?.is_truthy();
				let right = self.eval_aggregated(right, rows, representative)?.is_truthy();
				Ok(Value::Bool(if is_and {
					left && right
				} else {
					left || right
				}))
			}
			Expression::Not(inner) => {
				let value = self.eval_aggregated(inner, rows, representative)?;
				Ok(Value::Bool(!value.is_truthy()))
			}
			Expression::In(InExpression {
				expression: needle,
				list,
			}) => {
				let needle = self.eval_aggregated(needle, rows, representative)?;
				let list = list.iter()
					.map(|e| {
						self.eval_aggregated(e, rows, representative)
							.map(Expression::Constant)
					})
					.collect::<Result<Vec<_>>>()?;
				let rewritten = Expression::In(InExpression {
					expression: Box::new(Expression::Constant(needle)),
					list,
				});
				Ok(evaluate(&rewritten, &Row::new()).unwrap_or(Value::Undefined))
			}
			other => Ok(evaluate(other, &representative.namespace(&self.default_alias))
				.unwrap_or(Value::Undefined)),
		}
	}
}

fn group_key(group: &OrdKey) -> Key {
	Key::Text(group.0.to_string())
}
