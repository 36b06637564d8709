// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use change::{ChangeEvent, ChangeType, coalesce_events};
pub use error::Error;

mod change;
mod error;
pub mod expression;
pub mod index;
pub mod ordered;

pub type Result<T> = std::result::Result<T, Error>;
