// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The relational query IR consumed by the optimizer and compiler.

use std::sync::Arc;

use riffle_collection::Collection;
use riffle_core::expression::Expression;
use riffle_type::{Row, SortDirection};

/// Opaque predicate over the namespaced pipeline row (alias → row).
pub type RowPredicate = Arc<dyn Fn(&indexmap::IndexMap<String, Row>) -> bool + Send + Sync>;

/// Opaque predicate over a projected row.
pub type ProjectedPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Opaque projection over the namespaced pipeline row.
pub type RowProjection = Arc<dyn Fn(&indexmap::IndexMap<String, Row>) -> Row + Send + Sync>;

#[derive(Clone)]
pub enum From {
	/// A base collection under an alias.
	Collection { alias: String, collection: Collection },
	/// A sub-query under an alias. Shared `Arc`s compile once.
	Query { alias: String, query: Arc<Query> },
}

impl From {
	pub fn alias(&self) -> &str {
		match self {
			From::Collection { alias, .. } | From::Query { alias, .. } => alias,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
	Inner,
	Left,
	Right,
	Full,
	Cross,
}

#[derive(Clone)]
pub struct JoinClause {
	pub join_type: JoinType,
	pub from: From,
	/// Equality expression between the joined sources; ignored for
	/// cross joins.
	pub on: Option<Expression>,
}

#[derive(Clone)]
pub struct OrderByClause {
	pub expression: Expression,
	pub direction: SortDirection,
}

/// How ORDER BY indexes are materialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderIndexKind {
	/// Dense integer positions, reassigned as the window moves.
	#[default]
	Numeric,
	/// Floating-point keys that stay stable for unmoved rows.
	Fractional,
}

/// One SELECT output entry.
#[derive(Clone)]
pub enum SelectEntry {
	/// `name: expression`
	Field(String, Expression),
	/// Splice every field of the aliased table, without overwriting
	/// explicitly selected fields.
	Spread(String),
}

#[derive(Clone, Default)]
pub struct Query {
	pub from: Option<From>,
	pub joins: Vec<JoinClause>,
	pub where_clauses: Vec<Expression>,
	pub fn_where: Vec<RowPredicate>,
	pub group_by: Vec<Expression>,
	pub having: Vec<Expression>,
	pub fn_having: Vec<ProjectedPredicate>,
	pub select: Option<Vec<SelectEntry>>,
	pub fn_select: Option<RowProjection>,
	pub distinct: bool,
	pub order_by: Vec<OrderByClause>,
	pub order_index: OrderIndexKind,
	pub limit: Option<usize>,
	pub offset: Option<usize>,
}

impl Query {
	/// Whether the select projection computes any aggregate.
	pub fn select_has_aggregates(&self) -> bool {
		self.select.as_ref().is_some_and(|entries| {
			entries.iter().any(|entry| match entry {
				SelectEntry::Field(_, expression) => expression.contains_aggregate(),
				SelectEntry::Spread(_) => false,
			})
		})
	}

	/// Aliases declared by FROM and JOINs, in declaration order.
	pub fn aliases(&self) -> Vec<&str> {
		let mut aliases = Vec::with_capacity(1 + self.joins.len());
		if let Some(from) = &self.from {
			aliases.push(from.alias());
		}
		for join in &self.joins {
			aliases.push(join.from.alias());
		}
		aliases
	}

	/// True when this query adds nothing over its FROM source.
	pub fn is_passthrough(&self) -> bool {
		self.joins.is_empty()
			&& self.where_clauses.is_empty()
			&& self.fn_where.is_empty()
			&& self.group_by.is_empty()
			&& self.having.is_empty()
			&& self.fn_having.is_empty()
			&& self.select.is_none()
			&& self.fn_select.is_none()
			&& !self.distinct
			&& self.order_by.is_empty()
			&& self.limit.is_none()
			&& self.offset.is_none()
	}
}

/// Fluent construction of the query IR.
pub struct QueryBuilder {
	query: Query,
}

impl QueryBuilder {
	pub fn from_collection(alias: impl Into<String>, collection: Collection) -> Self {
		Self {
			query: Query {
				from: Some(From::Collection {
					alias: alias.into(),
					collection,
				}),
				..Query::default()
			},
		}
	}

	pub fn from_query(alias: impl Into<String>, query: Arc<Query>) -> Self {
		Self {
			query: Query {
				from: Some(From::Query {
					alias: alias.into(),
					query,
				}),
				..Query::default()
			},
		}
	}

	fn join(mut self, join_type: JoinType, from: From, on: Option<Expression>) -> Self {
		self.query.joins.push(JoinClause {
			join_type,
			from,
			on,
		});
		self
	}

	pub fn inner_join(self, alias: impl Into<String>, collection: Collection, on: Expression) -> Self {
		self.join(
			JoinType::Inner,
			From::Collection {
				alias: alias.into(),
				collection,
			},
			Some(on),
		)
	}

	pub fn left_join(self, alias: impl Into<String>, collection: Collection, on: Expression) -> Self {
		self.join(
			JoinType::Left,
			From::Collection {
				alias: alias.into(),
				collection,
			},
			Some(on),
		)
	}

	pub fn right_join(self, alias: impl Into<String>, collection: Collection, on: Expression) -> Self {
		self.join(
			JoinType::Right,
			From::Collection {
				alias: alias.into(),
				collection,
			},
			Some(on),
		)
	}

	pub fn full_join(self, alias: impl Into<String>, collection: Collection, on: Expression) -> Self {
		self.join(
			JoinType::Full,
			From::Collection {
				alias: alias.into(),
				collection,
			},
			Some(on),
		)
	}

	pub fn cross_join(self, alias: impl Into<String>, collection: Collection) -> Self {
		self.join(
			JoinType::Cross,
			From::Collection {
				alias: alias.into(),
				collection,
			},
			None,
		)
	}

	pub fn where_(mut self, expression: Expression) -> Self {
		self.query.where_clauses.push(expression);
		self
	}

	pub fn fn_where(
		mut self,
		predicate: impl Fn(&indexmap::IndexMap<String, Row>) -> bool + Send + Sync + 'static,
	) -> Self {
		self.query.fn_where.push(Arc::new(predicate));
		self
	}

	pub fn group_by(mut self, expression: Expression) -> Self {
		self.query.group_by.push(expression);
		self
	}

	pub fn having(mut self, expression: Expression) -> Self {
		self.query.having.push(expression);
		self
	}

	pub fn fn_having(mut self, predicate: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
		self.query.fn_having.push(Arc::new(predicate));
		self
	}

	pub fn select(mut self, entries: impl IntoIterator<Item = (&'static str, Expression)>) -> Self {
		let fields = entries
			.into_iter()
			.map(|(name, expression)| SelectEntry::Field(name.to_string(), expression))
			.collect();
		self.query.select = Some(fields);
		self
	}

	pub fn select_entries(mut self, entries: Vec<SelectEntry>) -> Self {
		self.query.select = Some(entries);
		self
	}

	pub fn fn_select(
		mut self,
		projection: impl Fn(&indexmap::IndexMap<String, Row>) -> Row + Send + Sync + 'static,
	) -> Self {
		self.query.fn_select = Some(Arc::new(projection));
		self
	}

	pub fn distinct(mut self) -> Self {
		self.query.distinct = true;
		self
	}

	pub fn order_by(mut self, expression: Expression, direction: SortDirection) -> Self {
		self.query.order_by.push(OrderByClause {
			expression,
			direction,
		});
		self
	}

	pub fn order_index(mut self, kind: OrderIndexKind) -> Self {
		self.query.order_index = kind;
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.query.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: usize) -> Self {
		self.query.offset = Some(offset);
		self
	}

	pub fn build(self) -> Arc<Query> {
		Arc::new(self.query)
	}
}
