// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Predicate pushdown. Single-source WHERE conjuncts move into sub-queries
//! wrapping their collection; index-convertible ones are additionally
//! recorded per alias so the live-query runner can subscribe upstream with
//! an indexable filter.

use std::{collections::HashMap, sync::Arc};

use riffle_core::expression::{Expression, combine_and, split_conjuncts};
use tracing::trace;

use crate::ir::{From, Query};

const PUSHDOWN_ITERATION_CAP: usize = 10;

/// The result of optimization.
pub struct OptimizedQuery {
	pub query: Arc<Query>,
	/// Alias → conjunction of the index-convertible predicates that
	/// apply to that alias's collection, recorded from the original
	/// query before any rewrite.
	pub collection_where: HashMap<String, Expression>,
}

pub fn optimize(query: &Arc<Query>) -> OptimizedQuery {
	let collection_where = extract_collection_where(query);
	let mut current: Query = (**query).clone();
	for _ in 0..PUSHDOWN_ITERATION_CAP {
		let (rewritten, changed) = push_down(&current);
		current = rewritten;
		if !changed {
			break;
		}
	}
	OptimizedQuery {
		query: Arc::new(remove_redundant_refs(&current)),
		collection_where,
	}
}

/// Conjuncts of the top-level WHERE that touch exactly one alias whose
/// source is a direct collection and that indexes can answer.
fn extract_collection_where(query: &Query) -> HashMap<String, Expression> {
	let mut clauses: HashMap<String, Vec<Expression>> = HashMap::new();
	for clause in &query.where_clauses {
		for conjunct in split_conjuncts(clause) {
			let sources = conjunct.touched_sources();
			let Some(alias) = sources.single() else {
				continue;
			};
			if !is_direct_collection(query, alias) {
				continue;
			}
			if conjunct.is_index_convertible(Some(alias)) {
				clauses.entry(alias.to_string()).or_default().push(conjunct.clone());
			}
		}
	}
	clauses.into_iter()
		.filter_map(|(alias, conjuncts)| combine_and(conjuncts).ok().map(|e| (alias, e)))
		.collect()
}

fn is_direct_collection(query: &Query, alias: &str) -> bool {
	let matches_from =
		|from: &From| matches!(from, From::Collection { alias: a, .. } if a == alias);
	query.from.as_ref().is_some_and(&matches_from)
		|| query.joins.iter().any(|join| matches_from(&join.from))
}

/// One bottom-up pushdown pass. Returns the rewritten query and whether
/// anything moved.
fn push_down(query: &Query) -> (Query, bool) {
	let mut changed = false;
	let mut rewritten = query.clone();

	// Bottom-up: optimize sub-queries first.
	if let Some(From::Query {
		alias,
		query: sub,
	}) = &rewritten.from
	{
		let (sub_rewritten, sub_changed) = push_down(sub);
		if sub_changed {
			rewritten.from = Some(From::Query {
				alias: alias.clone(),
				query: Arc::new(sub_rewritten),
			});
			changed = true;
		}
	}
	for join in &mut rewritten.joins {
		if let From::Query {
			alias,
			query: sub,
		} = &join.from
		{
			let (sub_rewritten, sub_changed) = push_down(sub);
			if sub_changed {
				join.from = From::Query {
					alias: alias.clone(),
					query: Arc::new(sub_rewritten),
				};
				changed = true;
			}
		}
	}

	// Partition the conjuncts: single-source ones whose source accepts
	// them move; the rest stay. Wrapping the collection of a query that
	// is already a plain filter over it gains nothing and would keep
	// the fixed-point iteration from converging.
	let minimal_filter = is_minimal_filter(&rewritten);
	let mut remaining: Vec<Expression> = Vec::new();
	let mut pushed: Vec<(String, Expression)> = Vec::new();
	for clause in &rewritten.where_clauses {
		for conjunct in split_conjuncts(clause) {
			match conjunct.touched_sources().single() {
				Some(alias) => match source_pushdown_target(&rewritten, alias) {
					Some(PushTarget::WrapCollection) if !minimal_filter => {
						pushed.push((alias.to_string(), conjunct.clone()));
					}
					Some(PushTarget::IntoSubquery) => {
						pushed.push((alias.to_string(), conjunct.clone()));
					}
					_ => remaining.push(conjunct.clone()),
				},
				_ => remaining.push(conjunct.clone()),
			}
		}
	}

	if pushed.is_empty() {
		return (rewritten, changed);
	}
	changed = true;
	rewritten.where_clauses = remaining;
	for (alias, conjunct) in pushed {
		push_into_source(&mut rewritten, &alias, conjunct);
	}
	trace!("pushdown pass moved conjuncts; query rewritten");
	(rewritten, changed)
}

enum PushTarget {
	WrapCollection,
	IntoSubquery,
}

/// A query that only filters its single FROM source; predicates are
/// already evaluated as close to the collection as they can get.
fn is_minimal_filter(query: &Query) -> bool {
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

/// Creating a new sub-query around a collection is always safe. Pushing
/// into an existing sub-query is safe only when the sub-query neither
/// aggregates nor projects nor truncates its rows.
fn source_pushdown_target(query: &Query, alias: &str) -> Option<PushTarget> {
	let check = |from: &From| match from {
		From::Collection {
			alias: a,
			..
		} => (a == alias).then_some(PushTarget::WrapCollection),
		From::Query {
			alias: a,
			query: sub,
		} => (a == alias && subquery_accepts_pushdown(sub)).then_some(PushTarget::IntoSubquery),
	};
	if let Some(target) = query.from.as_ref().and_then(check) {
		return Some(target);
	}
	query.joins.iter().find_map(|join| check(&join.from))
}

fn subquery_accepts_pushdown(sub: &Query) -> bool {
	!sub.select_has_aggregates()
		&& sub.group_by.is_empty()
		&& sub.having.is_empty()
		&& sub.fn_having.is_empty()
		&& !(!sub.order_by.is_empty() && (sub.limit.is_some() || sub.offset.is_some()))
		&& sub.select.is_none()
		&& sub.fn_select.is_none()
		&& sub.fn_where.is_empty()
}

fn push_into_source(query: &mut Query, alias: &str, conjunct: Expression) {
	let rewrite = |from: &From| -> Option<From> {
		match from {
			From::Collection {
				alias: a,
				collection,
			} if a == alias => Some(From::Query {
				alias: a.clone(),
				query: Arc::new(Query {
					from: Some(From::Collection {
						alias: a.clone(),
						collection: collection.clone(),
					}),
					where_clauses: vec![conjunct.clone()],
					..Query::default()
				}),
			}),
			From::Query {
				alias: a,
				query: sub,
			} if a == alias => {
				let mut inner = (**sub).clone();
				inner.where_clauses.push(rewrite_alias_for_subquery(&conjunct, a, sub));
				Some(From::Query {
					alias: a.clone(),
					query: Arc::new(inner),
				})
			}
			_ => None,
		}
	};

	if let Some(from) = &query.from {
		if let Some(replaced) = rewrite(from) {
			query.from = Some(replaced);
			return;
		}
	}
	for join in &mut query.joins {
		if let Some(replaced) = rewrite(&join.from) {
			join.from = replaced;
			return;
		}
	}
	// The alias vanished between partitioning and rewrite; keep the
	// conjunct rather than lose it.
	query.where_clauses.push(conjunct);
}

/// The sub-query exposes its rows under its own primary alias; rewrite
/// outer references accordingly.
fn rewrite_alias_for_subquery(conjunct: &Expression, outer_alias: &str, sub: &Query) -> Expression {
	let Some(inner_alias) = sub.from.as_ref().map(|from| from.alias().to_string()) else {
		return conjunct.clone();
	};
	if inner_alias == outer_alias {
		return conjunct.clone();
	}
	conjunct.map_columns(&|path| {
		if path.len() >= 2 && path[0] == outer_alias {
			let mut rewritten = path.clone();
			rewritten[0] = inner_alias.clone();
			rewritten
		} else {
			path.clone()
		}
	})
}

/// A QueryRef that adds nothing is replaced by its inner FROM, keeping the
/// outer alias.
fn remove_redundant_refs(query: &Query) -> Query {
	let mut rewritten = query.clone();

	let simplify = |from: &From| -> From {
		match from {
			From::Query {
				alias,
				query: sub,
			} => {
				let sub_simplified = remove_redundant_refs(sub);
				if sub_simplified.is_passthrough() {
					match sub_simplified.from {
						Some(From::Collection {
							collection,
							..
						}) => From::Collection {
							alias: alias.clone(),
							collection,
						},
						Some(From::Query {
							query: inner,
							..
						}) => From::Query {
							alias: alias.clone(),
							query: inner,
						},
						None => From::Query {
							alias: alias.clone(),
							query: Arc::new(sub_simplified),
						},
					}
				} else {
					From::Query {
						alias: alias.clone(),
						query: Arc::new(sub_simplified),
					}
				}
			}
			other => other.clone(),
		}
	};

	rewritten.from = rewritten.from.as_ref().map(&simplify);
	for join in &mut rewritten.joins {
		join.from = simplify(&join.from);
	}
	rewritten
}
