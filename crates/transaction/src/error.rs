// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

use crate::TransactionState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	#[error("commit requires a pending transaction, but it is {state}")]
	CommitNonPending { state: TransactionState },

	#[error("a completed transaction cannot be rolled back")]
	RollbackCompleted,

	#[error("mutate requires a pending transaction, but it is {state}")]
	MutateNonPending { state: TransactionState },

	#[error("mutations cannot be applied to a {state} transaction")]
	ApplyNonPending { state: TransactionState },

	#[error("the mutation handler failed: {message}")]
	HandlerFailed { message: String },

	#[error("transaction failed: {message}")]
	Failed { message: String },
}
