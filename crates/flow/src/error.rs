// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("DISTINCT requires a SELECT projection")]
	DistinctRequiresSelect,

	#[error("HAVING requires a GROUP BY")]
	HavingRequiresGroupBy,

	#[error("LIMIT and OFFSET require an ORDER BY")]
	LimitOffsetRequireOrderBy,

	#[error("no collection input is registered for alias {alias}")]
	CollectionInputNotFound { alias: String },

	#[error("the FROM clause carries an unsupported source type")]
	UnsupportedFromType,

	#[error("source alias {alias} is declared more than once")]
	DuplicateAlias { alias: String },

	#[error(transparent)]
	Collection(#[from] riffle_collection::Error),

	#[error(transparent)]
	Core(#[from] riffle_core::Error),
}
