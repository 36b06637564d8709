// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderedFloatError {
	#[error("NaN cannot be used as an ordered float")]
	Nan,
}
