// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Process-wide transaction registry. Holds weak references only; strong
//! ownership stays with the application and with the collections a
//! transaction touched.

use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::{Transaction, transaction::TransactionInner};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

static REGISTRY: Lazy<Mutex<Vec<Weak<TransactionInner>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Next value of the process-wide monotonic sequence.
pub(crate) fn next_sequence() -> u64 {
	SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn register(inner: Weak<TransactionInner>) {
	let mut registry = REGISTRY.lock();
	registry.retain(|weak| weak.strong_count() > 0);
	registry.push(inner);
}

/// Snapshot of the live transactions, ordered by
/// `(created_at, sequence_number)`.
pub fn snapshot() -> Vec<Transaction> {
	let mut transactions: Vec<Transaction> = {
		let mut registry = REGISTRY.lock();
		registry.retain(|weak| weak.strong_count() > 0);
		registry.iter().filter_map(Weak::upgrade).map(Transaction::from_inner).collect()
	};
	transactions.sort_by_key(|t| (t.created_at(), t.sequence_number()));
	transactions
}
