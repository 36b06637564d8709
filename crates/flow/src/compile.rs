// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Compilation of the optimized IR into an executable operator tree.
//! Sub-queries shared by `Arc` reference compile once and memoize their
//! output per input batch, so fan-out costs nothing extra.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use parking_lot::Mutex;
use riffle_collection::Collection;
use riffle_core::{
	ChangeEvent,
	expression::{CompareOp, Expression},
};

use crate::{
	Error, Result,
	ir::{From, Query, SelectEntry},
	operator::{
		DistinctExec, FlowDiff, GroupExec, JoinExec, OrderExec, PipeRow, SelectOp, expression_matches,
		filter_diffs, wrap_events,
	},
	optimize::OptimizedQuery,
};

/// One tick of input: a batch of change events from one bound source.
pub(crate) struct Bundle<'a> {
	pub batch: u64,
	pub source: usize,
	pub events: &'a [ChangeEvent],
}

/// An upstream collection the pipeline must subscribe to.
pub(crate) struct SourceBinding {
	pub id: usize,
	pub collection: Collection,
	/// Index-convertible predicate recorded by the optimizer, already
	/// normalized for plain-row evaluation.
	pub where_expression: Option<Expression>,
}

pub(crate) struct Compiled {
	pub root: QueryExec,
	pub sources: Vec<SourceBinding>,
}

/// A compiled sub-query shared by every referencing consumer. Output is
/// memoized per batch so a diamond-shaped plan applies each change once.
pub(crate) struct SharedSub {
	exec: QueryExec,
	memo: Option<(u64, Vec<FlowDiff>)>,
}

impl SharedSub {
	fn apply(&mut self, bundle: &Bundle) -> Result<Vec<FlowDiff>> {
		if let Some((batch, cached)) = &self.memo {
			if *batch == bundle.batch {
				return Ok(cached.clone());
			}
		}
		let fresh = self.exec.apply(bundle)?;
		self.memo = Some((bundle.batch, fresh.clone()));
		Ok(fresh)
	}
}

pub(crate) enum FromExec {
	Source { id: usize, alias: String },
	Sub { alias: String, shared: Arc<Mutex<SharedSub>> },
}

impl FromExec {
	pub(crate) fn alias(&self) -> &str {
		match self {
			FromExec::Source { alias, .. } | FromExec::Sub { alias, .. } => alias,
		}
	}

	pub(crate) fn pull(&self, bundle: &Bundle) -> Result<Vec<FlowDiff>> {
		match self {
			FromExec::Source { id, alias } => {
				if bundle.source == *id {
					Ok(wrap_events(alias, bundle.events))
				} else {
					Ok(Vec::new())
				}
			}
			FromExec::Sub { alias, shared } => {
				let diffs = shared.lock().apply(bundle)?;
				Ok(diffs.into_iter()
					.map(|diff| {
						let rewrap = |pipe: PipeRow| PipeRow::single(alias, pipe.output_row());
						let kind = match diff.kind {
							crate::operator::DiffKind::Insert { post } => {
								crate::operator::DiffKind::Insert { post: rewrap(post) }
							}
							crate::operator::DiffKind::Update { pre, post } => {
								crate::operator::DiffKind::Update {
									pre: rewrap(pre),
									post: rewrap(post),
								}
							}
							crate::operator::DiffKind::Remove { pre } => {
								crate::operator::DiffKind::Remove { pre: rewrap(pre) }
							}
						};
						FlowDiff { key: diff.key, kind }
					})
					.collect())
			}
		}
	}
}

/// The executable form of one query level.
pub(crate) struct QueryExec {
	from: FromExec,
	joins: Vec<JoinExec>,
	where_clauses: Vec<Expression>,
	fn_where: Vec<crate::ir::RowPredicate>,
	default_alias: String,
	select: Option<SelectOp>,
	group: Option<GroupExec>,
	distinct: Option<DistinctExec>,
	order: Option<OrderExec>,
}

impl QueryExec {
	pub(crate) fn apply(&mut self, bundle: &Bundle) -> Result<Vec<FlowDiff>> {
		let mut diffs = self.from.pull(bundle)?;
		for join in &mut self.joins {
			let right = join.from.pull(bundle)?;
			if diffs.is_empty() && right.is_empty() {
				continue;
			}
			diffs = join.apply(diffs, right)?;
		}
		if diffs.is_empty() {
			return Ok(diffs);
		}
		for clause in &self.where_clauses {
			diffs = filter_diffs(diffs, |pipe| {
				expression_matches(clause, pipe, &self.default_alias)
			});
		}
		for predicate in &self.fn_where {
			diffs = filter_diffs(diffs, |pipe| predicate(&pipe.tables));
		}
		if let Some(group) = &mut self.group {
			diffs = group.apply(diffs)?;
		} else if let Some(select) = &self.select {
			diffs = select.apply(diffs);
		}
		if let Some(distinct) = &mut self.distinct {
			diffs = distinct.apply(diffs);
		}
		if let Some(order) = &mut self.order {
			diffs = order.apply(diffs);
		}
		Ok(diffs)
	}
}

pub(crate) fn compile(optimized: &OptimizedQuery) -> Result<Compiled> {
	let mut ctx = CompileCtx {
		collection_where: &optimized.collection_where,
		cache: HashMap::new(),
		sources: Vec::new(),
		next_source: 0,
	};
	let root = ctx.compile_query(&optimized.query, true)?;
	Ok(Compiled {
		root,
		sources: ctx.sources,
	})
}

struct CompileCtx<'a> {
	collection_where: &'a HashMap<String, Expression>,
	cache: HashMap<usize, Arc<Mutex<SharedSub>>>,
	sources: Vec<SourceBinding>,
	next_source: usize,
}

impl CompileCtx<'_> {
	fn compile_query(&mut self, query: &Query, top: bool) -> Result<QueryExec> {
		let Some(from) = &query.from else {
			return Err(Error::UnsupportedFromType);
		};

		// Alias sanity: unique declarations, no references to unknown
		// sources.
		let declared: Vec<&str> = query.aliases();
		let mut seen: HashSet<&str> = HashSet::new();
		for alias in &declared {
			if !seen.insert(alias) {
				return Err(Error::DuplicateAlias {
					alias: alias.to_string(),
				});
			}
		}
		let check_refs = |expression: &Expression| -> Result<()> {
			for alias in expression.touched_sources().aliases {
				if !declared.contains(&alias.as_str()) {
					return Err(Error::CollectionInputNotFound {
						alias,
					});
				}
			}
			Ok(())
		};
		for clause in &query.where_clauses {
			check_refs(clause)?;
		}
		for join in &query.joins {
			if let Some(on) = &join.on {
				check_refs(on)?;
			}
		}
		for expression in &query.group_by {
			check_refs(expression)?;
		}
		if let Some(entries) = &query.select {
			for entry in entries {
				if let SelectEntry::Field(_, expression) = entry {
					check_refs(expression)?;
				}
			}
		}

		if query.distinct && query.select.is_none() && query.fn_select.is_none() {
			return Err(Error::DistinctRequiresSelect);
		}
		if (!query.having.is_empty() || !query.fn_having.is_empty()) && query.group_by.is_empty() {
			return Err(Error::HavingRequiresGroupBy);
		}
		if (query.limit.is_some() || query.offset.is_some()) && query.order_by.is_empty() {
			return Err(Error::LimitOffsetRequireOrderBy);
		}

		let default_alias = from.alias().to_string();
		let from_exec = self.compile_from(from, top)?;

		let mut where_clauses = query.where_clauses.clone();
		let mut joins = Vec::with_capacity(query.joins.len());
		let mut left_aliases: Vec<String> = vec![default_alias.clone()];
		for join in &query.joins {
			let right_alias = join.from.alias().to_string();
			let right_from = self.compile_from(&join.from, top)?;
			let (left_key, right_key) = match &join.on {
				None => (None, None),
				Some(on) => match split_equi_join(on, &right_alias) {
					Some((left, right)) => (Some(left), Some(right)),
					// Not a plain equality: join everything and
					// filter afterwards.
					None => {
						where_clauses.insert(0, on.clone());
						(None, None)
					}
				},
			};
			joins.push(JoinExec::new(
				right_from,
				join.join_type,
				left_key,
				right_key,
				left_aliases.clone(),
				default_alias.clone(),
			));
			left_aliases.push(right_alias);
		}

		let grouped = !query.group_by.is_empty() || query.select_has_aggregates();
		let group = grouped.then(|| {
			let entries = query.select.clone().unwrap_or_else(|| default_group_select(query));
			GroupExec::new(
				query.group_by.clone(),
				entries,
				query.having.clone(),
				query.fn_having.clone(),
				default_alias.clone(),
			)
		});
		let select = (!grouped && (query.select.is_some() || query.fn_select.is_some())).then(|| {
			SelectOp::new(
				query.select.clone().unwrap_or_default(),
				query.fn_select.clone(),
				default_alias.clone(),
			)
		});
		let distinct = query.distinct.then(DistinctExec::new);
		let order = (!query.order_by.is_empty()).then(|| {
			OrderExec::new(
				query.order_by.clone(),
				query.order_index,
				query.limit,
				query.offset,
				default_alias.clone(),
			)
		});

		Ok(QueryExec {
			from: from_exec,
			joins,
			where_clauses,
			fn_where: query.fn_where.clone(),
			default_alias,
			select,
			group,
			distinct,
			order,
		})
	}

	fn compile_from(&mut self, from: &From, top: bool) -> Result<FromExec> {
		match from {
			From::Collection {
				alias,
				collection,
			} => {
				let id = self.next_source;
				self.next_source += 1;
				let where_expression = top
					.then(|| self.collection_where.get(alias))
					.flatten()
					.map(|expression| expression.normalize_for_alias(alias));
				self.sources.push(SourceBinding {
					id,
					collection: collection.clone(),
					where_expression,
				});
				Ok(FromExec::Source {
					id,
					alias: alias.clone(),
				})
			}
			From::Query {
				alias,
				query,
			} => {
				let ptr = Arc::as_ptr(query) as usize;
				let shared = match self.cache.get(&ptr) {
					Some(shared) => shared.clone(),
					None => {
						// Pushdown wrappers stay transparent for
						// upstream subscription filters.
						let sub_top = top && is_filter_wrapper(query);
						let exec = self.compile_query(query, sub_top)?;
						let shared = Arc::new(Mutex::new(SharedSub {
							exec,
							memo: None,
						}));
						self.cache.insert(ptr, shared.clone());
						shared
					}
				};
				Ok(FromExec::Sub {
					alias: alias.clone(),
					shared,
				})
			}
		}
	}
}

/// The shape pushdown produces: a bare filter over a collection.
fn is_filter_wrapper(query: &Query) -> bool {
	query.joins.is_empty()
		&& query.fn_where.is_empty()
		&& query.group_by.is_empty()
		&& query.having.is_empty()
		&& query.fn_having.is_empty()
		&& query.select.is_none()
		&& query.fn_select.is_none()
		&& !query.distinct
		&& query.order_by.is_empty()
		&& query.limit.is_none()
		&& query.offset.is_none()
		&& matches!(query.from, Some(From::Collection { .. }))
}

/// Split `eq(a, b)` into the side evaluated over the accumulated left
/// namespace and the side evaluated over the right row (alias stripped).
fn split_equi_join(on: &Expression, right_alias: &str) -> Option<(Expression, Expression)> {
	let Expression::Compare(compare) = on else {
		return None;
	};
	if compare.op != CompareOp::Eq {
		return None;
	}
	let left_touches = compare.left.touched_sources().aliases.contains(right_alias);
	let right_touches = compare.right.touched_sources().aliases.contains(right_alias);
	match (left_touches, right_touches) {
		(false, true) => Some((
			(*compare.left).clone(),
			compare.right.normalize_for_alias(right_alias),
		)),
		(true, false) => Some((
			(*compare.right).clone(),
			compare.left.normalize_for_alias(right_alias),
		)),
		_ => None,
	}
}

fn default_group_select(query: &Query) -> Vec<SelectEntry> {
	query.group_by
		.iter()
		.enumerate()
		.map(|(position, expression)| {
			let name = match expression {
				Expression::Column(column) => {
					column.path.last().cloned().unwrap_or_else(|| format!("col{position}"))
				}
				_ => format!("col{position}"),
			};
			SelectEntry::Field(name, expression.clone())
		})
		.collect()
}
