// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The expression tree shared by WHERE filters, index extractors,
//! projections and aggregations.

pub use aggregate::AggregateFunction;
pub use analyze::{SourceSet, combine_and, index_columns, split_conjuncts, strip_alias};
pub use evaluate::{EvalContext, Namespace, evaluate};

mod aggregate;
mod analyze;
pub mod dsl;
mod evaluate;

use riffle_type::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A reference path into a row. A single segment names a field of the
/// default table; the first of two or more segments may name a source alias.
pub type ColumnPath = SmallVec<[String; 2]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
	/// A constant value.
	Constant(Value),
	/// A reference to a row field, optionally alias-qualified.
	Column(ColumnExpression),
	/// lhs AND rhs: logical AND of two booleans
	And(Box<Expression>, Box<Expression>),
	/// lhs OR rhs: logical OR of two booleans
	Or(Box<Expression>, Box<Expression>),
	/// NOT a: logical NOT of a boolean
	Not(Box<Expression>),
	Compare(CompareExpression),
	/// expr IN (a, b, ...)
	In(InExpression),
	Arith(ArithExpression),
	Call(CallExpression),
	Aggregate(AggregateExpression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnExpression {
	pub path: ColumnPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareExpression {
	pub op: CompareOp,
	pub left: Box<Expression>,
	pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InExpression {
	pub expression: Box<Expression>,
	pub list: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
	Add,
	Sub,
	Mul,
	Div,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithExpression {
	pub op: ArithOp,
	pub left: Box<Expression>,
	pub right: Box<Expression>,
}

/// Scalar functions usable in any row context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarFunction {
	Upper,
	Lower,
	Length,
	Coalesce,
	Concat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
	pub func: ScalarFunction,
	pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExpression {
	pub func: AggregateFunction,
	/// `None` is only meaningful for `Count`, which then counts rows.
	pub arg: Option<Box<Expression>>,
}

impl Expression {
	pub fn column(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Expression::Column(ColumnExpression {
			path: path.into_iter().map(Into::into).collect(),
		})
	}

	pub fn constant(value: impl Into<Value>) -> Self {
		Expression::Constant(value.into())
	}

	/// Does any node of this tree contain an aggregate?
	pub fn contains_aggregate(&self) -> bool {
		match self {
			Expression::Aggregate(_) => true,
			Expression::Constant(_) | Expression::Column(_) => false,
			Expression::And(l, r) | Expression::Or(l, r) => {
				l.contains_aggregate() || r.contains_aggregate()
			}
			Expression::Not(e) => e.contains_aggregate(),
			Expression::Compare(c) => c.left.contains_aggregate() || c.right.contains_aggregate(),
			Expression::In(i) => {
				i.expression.contains_aggregate()
					|| i.list.iter().any(Expression::contains_aggregate)
			}
			Expression::Arith(a) => a.left.contains_aggregate() || a.right.contains_aggregate(),
			Expression::Call(c) => c.args.iter().any(Expression::contains_aggregate),
		}
	}

	/// Visit every column reference in the tree.
	pub fn visit_columns<'a>(&'a self, visit: &mut impl FnMut(&'a ColumnExpression)) {
		match self {
			Expression::Column(column) => visit(column),
			Expression::Constant(_) => {}
			Expression::And(l, r) | Expression::Or(l, r) => {
				l.visit_columns(visit);
				r.visit_columns(visit);
			}
			Expression::Not(e) => e.visit_columns(visit),
			Expression::Compare(c) => {
				c.left.visit_columns(visit);
				c.right.visit_columns(visit);
			}
			Expression::In(i) => {
				i.expression.visit_columns(visit);
				for e in &i.list {
					e.visit_columns(visit);
				}
			}
			Expression::Arith(a) => {
				a.left.visit_columns(visit);
				a.right.visit_columns(visit);
			}
			Expression::Call(c) => {
				for e in &c.args {
					e.visit_columns(visit);
				}
			}
			Expression::Aggregate(a) => {
				if let Some(arg) = &a.arg {
					arg.visit_columns(visit);
				}
			}
		}
	}

	/// Rewrite every column path with `rewrite`, leaving the rest of the
	/// tree untouched.
	pub fn map_columns(&self, rewrite: &impl Fn(&ColumnPath) -> ColumnPath) -> Expression {
		match self {
			Expression::Column(column) => Expression::Column(ColumnExpression {
				path: rewrite(&column.path),
			}),
			Expression::Constant(value) => Expression::Constant(value.clone()),
			Expression::And(l, r) => Expression::And(
				Box::new(l.map_columns(rewrite)),
				Box::new(r.map_columns(rewrite)),
			),
			Expression::Or(l, r) => Expression::Or(
				Box::new(l.map_columns(rewrite)),
				Box::new(r.map_columns(rewrite)),
			),
			Expression::Not(e) => Expression::Not(Box::new(e.map_columns(rewrite))),
			Expression::Compare(c) => Expression::Compare(CompareExpression {
				op: c.op,
				left: Box::new(c.left.map_columns(rewrite)),
				right: Box::new(c.right.map_columns(rewrite)),
			}),
			Expression::In(i) => Expression::In(InExpression {
				expression: Box::new(i.expression.map_columns(rewrite)),
				list: i.list.iter().map(|e| e.map_columns(rewrite)).collect(),
			}),
			Expression::Arith(a) => Expression::Arith(ArithExpression {
				op: a.op,
				left: Box::new(a.left.map_columns(rewrite)),
				right: Box::new(a.right.map_columns(rewrite)),
			}),
			Expression::Call(c) => Expression::Call(CallExpression {
				func: c.func,
				args: c.args.iter().map(|e| e.map_columns(rewrite)).collect(),
			}),
			Expression::Aggregate(a) => Expression::Aggregate(AggregateExpression {
				func: a.func,
				arg: a.arg.as_ref().map(|arg| Box::new(arg.map_columns(rewrite))),
			}),
		}
	}
}
