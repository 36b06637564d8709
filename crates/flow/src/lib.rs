// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use error::Error;
pub use ir::{
	From, JoinClause, JoinType, OrderByClause, OrderIndexKind, Query, QueryBuilder, SelectEntry,
};
pub use live::{KEY_FIELD, ORDER_INDEX_FIELD, live_query, live_query_named};
pub use optimize::{OptimizedQuery, optimize};

mod compile;
mod error;
mod ir;
mod live;
mod operator;
mod optimize;

pub type Result<T> = std::result::Result<T, Error>;
