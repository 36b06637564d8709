// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use indexmap::IndexMap;
use riffle_type::{Row, Value, compare_values};

use super::{ArithOp, CallExpression, CompareOp, Expression, ScalarFunction};
use crate::{Error, Result};

/// Resolves column paths to values. Implemented by a plain row (paths are
/// field paths) and by [`Namespace`] (the first segment may name a source
/// alias).
pub trait EvalContext {
	fn resolve(&self, path: &[String]) -> Option<&Value>;
}

impl EvalContext for Row {
	fn resolve(&self, path: &[String]) -> Option<&Value> {
		self.get_path(path)
	}
}

/// An alias → row namespace, as produced by joins. Single-segment paths
/// resolve against the default alias.
pub struct Namespace<'a> {
	pub rows: &'a IndexMap<String, Row>,
	pub default_alias: &'a str,
}

impl EvalContext for Namespace<'_> {
	fn resolve(&self, path: &[String]) -> Option<&Value> {
		let (first, rest) = path.split_first()?;
		if rest.is_empty() {
			return self.rows.get(self.default_alias)?.get(first);
		}
		match self.rows.get(first) {
			Some(row) => row.get_path(rest),
			// Unknown alias: treat the whole path as a nested field
			// of the default table.
			None => self.rows.get(self.default_alias)?.get_path(path),
		}
	}
}

/// Evaluate an expression against a row context. Missing fields evaluate to
/// `Undefined`. Aggregates have no meaning here and error.
pub fn evaluate(expression: &Expression, ctx: &impl EvalContext) -> Result<Value> {
	match expression {
		Expression::Constant(value) => Ok(value.clone()),
		Expression::Column(column) => {
			Ok(ctx.resolve(&column.path).cloned().unwrap_or(Value::Undefined))
		}
		Expression::And(l, r) => {
			let left = evaluate(l, ctx)?;
			if !left.is_truthy() {
				return Ok(Value::Bool(false));
			}
			Ok(Value::Bool(evaluate(r, ctx)?.is_truthy()))
		}
		Expression::Or(l, r) => {
			let left = evaluate(l, ctx)?;
			if left.is_truthy() {
				return Ok(Value::Bool(true));
			}
			Ok(Value::Bool(evaluate(r, ctx)?.is_truthy()))
		}
		Expression::Not(e) => Ok(Value::Bool(!evaluate(e, ctx)?.is_truthy())),
		Expression::Compare(c) => {
			let left = evaluate(&c.left, ctx)?;
			let right = evaluate(&c.right, ctx)?;
			Ok(Value::Bool(compare(c.op, &left, &right)))
		}
		Expression::In(i) => {
			let needle = evaluate(&i.expression, ctx)?;
			for candidate in &i.list {
				let value = evaluate(candidate, ctx)?;
				if compare(CompareOp::Eq, &needle, &value) {
					return Ok(Value::Bool(true));
				}
			}
			Ok(Value::Bool(false))
		}
		Expression::Arith(a) => {
			let left = evaluate(&a.left, ctx)?;
			let right = evaluate(&a.right, ctx)?;
			Ok(arith(a.op, &left, &right))
		}
		Expression::Call(call) => scalar_call(call, ctx),
		Expression::Aggregate(_) => Err(Error::AggregateInRowContext),
	}
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
	// Undefined never satisfies an ordering comparison; equality still
	// holds between two undefined values.
	if left.is_undefined() || right.is_undefined() {
		return match op {
			CompareOp::Eq => left.is_undefined() && right.is_undefined(),
			CompareOp::Ne => left.is_undefined() != right.is_undefined(),
			_ => false,
		};
	}
	let ordering = compare_values(left, right);
	match op {
		CompareOp::Eq => ordering.is_eq(),
		CompareOp::Ne => ordering.is_ne(),
		CompareOp::Gt => ordering.is_gt(),
		CompareOp::Gte => ordering.is_ge(),
		CompareOp::Lt => ordering.is_lt(),
		CompareOp::Lte => ordering.is_le(),
	}
}

fn arith(op: ArithOp, left: &Value, right: &Value) -> Value {
	match (left, right) {
		(Value::Int(l), Value::Int(r)) => match op {
			ArithOp::Add => Value::Int(l.wrapping_add(*r)),
			ArithOp::Sub => Value::Int(l.wrapping_sub(*r)),
			ArithOp::Mul => Value::Int(l.wrapping_mul(*r)),
			ArithOp::Div => {
				if *r == 0 {
					Value::Undefined
				} else {
					Value::Int(l.wrapping_div(*r))
				}
			}
		},
		_ => {
			let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
				return Value::Undefined;
			};
			match op {
				ArithOp::Add => Value::float(l + r),
				ArithOp::Sub => Value::float(l - r),
				ArithOp::Mul => Value::float(l * r),
				ArithOp::Div => {
					if r == 0.0 {
						Value::Undefined
					} else {
						Value::float(l / r)
					}
				}
			}
		}
	}
}

fn scalar_call(call: &CallExpression, ctx: &impl EvalContext) -> Result<Value> {
	let mut args = Vec::with_capacity(call.args.len());
	for arg in &call.args {
		args.push(evaluate(arg, ctx)?);
	}
	Ok(match call.func {
		ScalarFunction::Upper => match args.first() {
			Some(Value::Text(v)) => Value::Text(v.to_uppercase()),
			_ => Value::Undefined,
		},
		ScalarFunction::Lower => match args.first() {
			Some(Value::Text(v)) => Value::Text(v.to_lowercase()),
			_ => Value::Undefined,
		},
		ScalarFunction::Length => match args.first() {
			Some(Value::Text(v)) => Value::Int(v.chars().count() as i64),
			Some(Value::List(v)) => Value::Int(v.len() as i64),
			_ => Value::Undefined,
		},
		ScalarFunction::Coalesce => args
			.iter()
			.find(|v| !v.is_undefined())
			.cloned()
			.unwrap_or(Value::Undefined),
		ScalarFunction::Concat => {
			let mut out = String::new();
			for arg in &args {
				if !arg.is_undefined() {
					out.push_str(&arg.to_string());
				}
			}
			Value::Text(out)
		}
	})
}
