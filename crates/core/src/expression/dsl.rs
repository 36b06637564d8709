// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Shorthand constructors for building expression trees by hand.

use riffle_type::Value;

use super::{
	AggregateExpression, AggregateFunction, ArithExpression, ArithOp, CallExpression, CompareExpression,
	CompareOp, Expression, InExpression, ScalarFunction,
};

/// A column reference; `col("age")` or `col("users.age")`.
pub fn col(path: &str) -> Expression {
	Expression::column(path.split('.'))
}

pub fn lit(value: impl Into<Value>) -> Expression {
	Expression::Constant(value.into())
}

fn compare(op: CompareOp, left: Expression, right: Expression) -> Expression {
	Expression::Compare(CompareExpression {
		op,
		left: Box::new(left),
		right: Box::new(right),
	})
}

pub fn eq(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Eq, left, right)
}

pub fn ne(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Ne, left, right)
}

pub fn gt(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Gt, left, right)
}

pub fn gte(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Gte, left, right)
}

pub fn lt(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Lt, left, right)
}

pub fn lte(left: Expression, right: Expression) -> Expression {
	compare(CompareOp::Lte, left, right)
}

pub fn in_list(expression: Expression, list: impl IntoIterator<Item = Expression>) -> Expression {
	Expression::In(InExpression {
		expression: Box::new(expression),
		list: list.into_iter().collect(),
	})
}

pub fn and(left: Expression, right: Expression) -> Expression {
	Expression::And(Box::new(left), Box::new(right))
}

pub fn or(left: Expression, right: Expression) -> Expression {
	Expression::Or(Box::new(left), Box::new(right))
}

pub fn not(expression: Expression) -> Expression {
	Expression::Not(Box::new(expression))
}

fn arith(op: ArithOp, left: Expression, right: Expression) -> Expression {
	Expression::Arith(ArithExpression {
		op,
		left: Box::new(left),
		right: Box::new(right),
	})
}

pub fn add(left: Expression, right: Expression) -> Expression {
	arith(ArithOp::Add, left, right)
}

pub fn sub(left: Expression, right: Expression) -> Expression {
	arith(ArithOp::Sub, left, right)
}

pub fn mul(left: Expression, right: Expression) -> Expression {
	arith(ArithOp::Mul, left, right)
}

pub fn div(left: Expression, right: Expression) -> Expression {
	arith(ArithOp::Div, left, right)
}

pub fn call(func: ScalarFunction, args: impl IntoIterator<Item = Expression>) -> Expression {
	Expression::Call(CallExpression {
		func,
		args: args.into_iter().collect(),
	})
}

fn aggregate(func: AggregateFunction, arg: Expression) -> Expression {
	Expression::Aggregate(AggregateExpression {
		func,
		arg: Some(Box::new(arg)),
	})
}

pub fn sum(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Sum, arg)
}

/// `count()` counts rows; use [`count_of`] to count defined values.
pub fn count() -> Expression {
	Expression::Aggregate(AggregateExpression {
		func: AggregateFunction::Count,
		arg: None,
	})
}

pub fn count_of(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Count, arg)
}

pub fn avg(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Avg, arg)
}

pub fn min(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Min, arg)
}

pub fn max(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Max, arg)
}

pub fn median(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Median, arg)
}

pub fn mode(arg: Expression) -> Expression {
	aggregate(AggregateFunction::Mode, arg)
}
