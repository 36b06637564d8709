// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Predicate analysis: conjunct splitting, source tracking and
//! index-convertibility.

use std::collections::BTreeSet;

use super::{ColumnPath, CompareOp, Expression};
use crate::{Error, Result};

/// The source aliases an expression references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
	/// First segments of alias-qualified paths (length >= 2).
	pub aliases: BTreeSet<String>,
	/// Whether any single-segment (default-table) reference occurs.
	pub has_unqualified: bool,
}

impl SourceSet {
	/// The single alias this expression is confined to, if any.
	pub fn single(&self) -> Option<&str> {
		if self.has_unqualified || self.aliases.len() != 1 {
			return None;
		}
		self.aliases.iter().next().map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.aliases.is_empty() && !self.has_unqualified
	}
}

impl Expression {
	/// Collect the source aliases referenced by this expression.
	pub fn touched_sources(&self) -> SourceSet {
		let mut sources = SourceSet::default();
		self.visit_columns(&mut |column| {
			if column.path.len() >= 2 {
				sources.aliases.insert(column.path[0].clone());
			} else {
				sources.has_unqualified = true;
			}
		});
		sources
	}

	/// True when this expression can be answered from ordered indexes of
	/// the collection behind `alias`: every column is rooted at `alias`
	/// (or unqualified when `alias` is `None`) and only
	/// eq/gt/gte/lt/lte/in/and/or combinators occur.
	pub fn is_index_convertible(&self, alias: Option<&str>) -> bool {
		match self {
			Expression::And(l, r) | Expression::Or(l, r) => {
				l.is_index_convertible(alias) && r.is_index_convertible(alias)
			}
			Expression::Compare(c) => {
				if c.op == CompareOp::Ne {
					return false;
				}
				column_vs_constant(&c.left, &c.right, alias).is_some()
			}
			Expression::In(i) => {
				matches!(&*i.expression, Expression::Column(c) if rooted_at(&c.path, alias))
					&& i.list.iter().all(|e| matches!(e, Expression::Constant(_)))
			}
			_ => false,
		}
	}

	/// Rewrite `[alias, field, ...]` paths to `[field, ...]` for
	/// single-collection index use.
	pub fn normalize_for_alias(&self, alias: &str) -> Expression {
		self.map_columns(&|path: &ColumnPath| {
			if path.len() >= 2 && path[0] == alias {
				path.iter().skip(1).cloned().collect()
			} else {
				path.clone()
			}
		})
	}
}

/// One side must be an `alias`-rooted column, the other a constant. Returns
/// the column path.
fn column_vs_constant<'a>(
	left: &'a Expression,
	right: &'a Expression,
	alias: Option<&str>,
) -> Option<&'a ColumnPath> {
	match (left, right) {
		(Expression::Column(c), Expression::Constant(_)) if rooted_at(&c.path, alias) => Some(&c.path),
		(Expression::Constant(_), Expression::Column(c)) if rooted_at(&c.path, alias) => Some(&c.path),
		_ => None,
	}
}

fn rooted_at(path: &ColumnPath, alias: Option<&str>) -> bool {
	match alias {
		Some(alias) => path.len() >= 2 && path[0] == alias,
		None => !path.is_empty(),
	}
}

/// Flatten nested ANDs into their conjuncts. OR is never split.
pub fn split_conjuncts(expression: &Expression) -> Vec<&Expression> {
	let mut conjuncts = Vec::new();
	collect_conjuncts(expression, &mut conjuncts);
	conjuncts
}

fn collect_conjuncts<'a>(expression: &'a Expression, out: &mut Vec<&'a Expression>) {
	match expression {
		Expression::And(l, r) => {
			collect_conjuncts(l, out);
			collect_conjuncts(r, out);
		}
		other => out.push(other),
	}
}

/// Combine expressions into a right-leaning AND chain. Errors on an empty
/// list.
pub fn combine_and(expressions: Vec<Expression>) -> Result<Expression> {
	let mut iter = expressions.into_iter().rev();
	let Some(last) = iter.next() else {
		return Err(Error::EmptyExpressionList);
	};
	Ok(iter.fold(last, |acc, e| Expression::And(Box::new(e), Box::new(acc))))
}

/// The column paths an index-convertible expression needs indexes for.
pub fn index_columns(expression: &Expression) -> Vec<ColumnPath> {
	let mut paths: Vec<ColumnPath> = Vec::new();
	expression.visit_columns(&mut |column| {
		if !paths.contains(&column.path) {
			paths.push(column.path.clone());
		}
	});
	paths
}

/// Drop a leading alias segment from a path.
pub fn strip_alias(path: &ColumnPath, alias: &str) -> ColumnPath {
	if path.len() >= 2 && path[0] == alias {
		path.iter().skip(1).cloned().collect()
	} else {
		path.clone()
	}
}
