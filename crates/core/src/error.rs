// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	#[error("an aggregate expression cannot be evaluated against a single row")]
	AggregateInRowContext,

	#[error("cannot combine an empty expression list")]
	EmptyExpressionList,

	#[error("expression is not usable as an index extractor: {reason}")]
	InvalidIndexExpression { reason: String },

	#[error(transparent)]
	Type(#[from] riffle_type::Error),
}
