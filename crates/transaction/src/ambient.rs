// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::cell::RefCell;

use crate::Transaction;

thread_local! {
	static AMBIENT: RefCell<Vec<Transaction>> = const { RefCell::new(Vec::new()) };
}

/// The innermost transaction currently entered via [`Transaction::mutate`]
/// on this thread, if any. Collection mutation methods attach their pending
/// mutations to it.
pub fn ambient_transaction() -> Option<Transaction> {
	AMBIENT.with(|stack| stack.borrow().last().cloned())
}

/// Pushes the transaction on construction, pops on drop, so the stack
/// unwinds even when the mutate callback panics.
pub(crate) struct AmbientGuard;

impl AmbientGuard {
	pub(crate) fn enter(transaction: Transaction) -> Self {
		AMBIENT.with(|stack| stack.borrow_mut().push(transaction));
		Self
	}
}

impl Drop for AmbientGuard {
	fn drop(&mut self) {
		AMBIENT.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}
