// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeSet;

use riffle_type::{Key, Value};

use super::{CollectionIndex, IndexLookup, IndexRange};
use crate::expression::{ColumnPath, CompareOp, Expression};

/// Answer an index-convertible WHERE expression from indexes.
///
/// `resolve` maps a column path to the index over that extractor, if one
/// exists. Returns `None` when the expression is not convertible or a
/// needed index is missing; the caller then falls back to a scan.
pub fn match_expression<'a>(
	expression: &Expression,
	resolve: &impl Fn(&ColumnPath) -> Option<&'a dyn CollectionIndex>,
) -> Option<BTreeSet<Key>> {
	match expression {
		Expression::And(l, r) => {
			let left = match_expression(l, resolve)?;
			let right = match_expression(r, resolve)?;
			Some(left.intersection(&right).cloned().collect())
		}
		Expression::Or(l, r) => {
			let left = match_expression(l, resolve)?;
			let right = match_expression(r, resolve)?;
			Some(left.union(&right).cloned().collect())
		}
		Expression::Compare(c) => {
			let (path, value, op) = match (&*c.left, &*c.right) {
				(Expression::Column(column), Expression::Constant(value)) => {
					(&column.path, value, c.op)
				}
				(Expression::Constant(value), Expression::Column(column)) => {
					(&column.path, value, flip(c.op)?)
				}
				_ => return None,
			};
			let lookup = match op {
				CompareOp::Eq => IndexLookup::Eq(value.clone()),
				CompareOp::Gt => IndexLookup::Range(IndexRange::from(value.clone(), false)),
				CompareOp::Gte => IndexLookup::Range(IndexRange::from(value.clone(), true)),
				CompareOp::Lt => IndexLookup::Range(IndexRange::to(value.clone(), false)),
				CompareOp::Lte => IndexLookup::Range(IndexRange::to(value.clone(), true)),
				CompareOp::Ne => return None,
			};
			Some(resolve(path)?.lookup(&lookup))
		}
		Expression::In(i) => {
			let Expression::Column(column) = &*i.expression else {
				return None;
			};
			let mut values: Vec<Value> = Vec::with_capacity(i.list.len());
			for candidate in &i.list {
				let Expression::Constant(value) = candidate else {
					return None;
				};
				values.push(value.clone());
			}
			Some(resolve(&column.path)?.lookup(&IndexLookup::In(values)))
		}
		_ => None,
	}
}

/// `const op col` reads as `col flipped-op const`.
fn flip(op: CompareOp) -> Option<CompareOp> {
	Some(match op {
		CompareOp::Eq => CompareOp::Eq,
		CompareOp::Gt => CompareOp::Lt,
		CompareOp::Gte => CompareOp::Lte,
		CompareOp::Lt => CompareOp::Gt,
		CompareOp::Lte => CompareOp::Gte,
		CompareOp::Ne => return None,
	})
}
