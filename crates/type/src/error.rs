// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

use crate::{OrderedFloatError, ValueKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	#[error("a value of kind {kind} cannot be used as a collection key")]
	InvalidKey { kind: ValueKind },

	#[error(transparent)]
	OrderedFloat(#[from] OrderedFloatError),
}
