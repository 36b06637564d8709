// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use ambient::ambient_transaction;
pub use error::Error;
pub use mutation::{GlobalKey, MutationTarget, MutationType, PendingMutation};
pub use transaction::{MutationFn, Transaction, TransactionConfig, TransactionState};

mod ambient;
mod error;
mod mutation;
pub mod registry;
mod transaction;

pub type Result<T> = std::result::Result<T, Error>;
