// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Optimistic overlay maintenance. The overlay is always rebuilt from the
//! tracked transactions in `(created_at, sequence_number)` order, so a
//! later transaction's write to the same key wins; events are the diff of
//! the visible state across the rebuild.

use std::collections::BTreeSet;

use riffle_core::ChangeEvent;
use riffle_transaction::{MutationTarget, MutationType, Transaction, TransactionState};
use riffle_type::Key;
use tracing::trace;

use super::{CollectionShared, CollectionState, PendingSyncBatch, dispatch_plan};
use crate::CollectionStatus;

impl MutationTarget for CollectionShared {
	fn collection_id(&self) -> &str {
		self.id()
	}

	// `_from_user_action` does not change delivery here: while a sync
	// transaction is open, even user-triggered events are batched so the
	// commit flushes one coherent batch.
	fn transaction_touched(&self, transaction: &Transaction, _from_user_action: bool) {
		let plan = {
			let mut guard = self.state.lock();
			let state = &mut *guard;
			if state.status == CollectionStatus::CleanedUp {
				return;
			}
			if transaction.state() != TransactionState::Failed
				&& !transaction.mutations_for(self.id()).is_empty()
				&& !state.transactions.has(&transaction.id())
			{
				state.transactions.set(transaction.id(), transaction.clone());
			}

			let events = rebuild_overlay(state, self.id());
			state.recompute_size();
			super::index::apply_events_to_indexes(state, &events);
			if state.pending_sync.is_some() {
				let events = {
					let pending =
						state.pending_sync.as_ref().expect("pending batch checked above");
					suppress_restored_deletes(events, pending)
				};
				trace!(
					"collection {} batching {} overlay events during sync",
					self.id(),
					events.len()
				);
				state.batched_events.extend(events);
				None
			} else {
				self.finalize_events(state, events)
			}
		};
		if let Some(plan) = plan {
			dispatch_plan(plan);
		}

		self.maybe_apply_deferred_commit();
	}
}

/// Rebuild the overlay from the live transactions and return the visible
/// diff. Failed transactions are dropped here; completed ones keep their
/// overlay until a sync commit discards them.
pub(crate) fn rebuild_overlay(state: &mut CollectionState, collection_id: &str) -> Vec<ChangeEvent> {
	state.transactions.retain(|_, transaction| transaction.state() != TransactionState::Failed);

	let prev_upserts = std::mem::take(&mut state.optimistic_upserts);
	let prev_deletes = std::mem::take(&mut state.optimistic_deletes);

	for transaction in state.transactions.values() {
		for mutation in transaction.mutations_for(collection_id) {
			if !mutation.optimistic {
				continue;
			}
			match mutation.mutation_type {
				MutationType::Insert | MutationType::Update => {
					state.optimistic_deletes.remove(&mutation.key);
					state.optimistic_upserts.insert(mutation.key, mutation.modified);
				}
				MutationType::Delete => {
					state.optimistic_upserts.remove(&mutation.key);
					state.optimistic_deletes.insert(mutation.key);
				}
			}
		}
	}

	let mut keys: BTreeSet<Key> = BTreeSet::new();
	keys.extend(prev_upserts.keys().cloned());
	keys.extend(prev_deletes.iter().cloned());
	keys.extend(state.optimistic_upserts.keys().cloned());
	keys.extend(state.optimistic_deletes.iter().cloned());

	let mut events = Vec::new();
	for key in keys {
		let previous = if prev_deletes.contains(&key) {
			None
		} else {
			prev_upserts.get(&key).or_else(|| state.synced_data.get(&key))
		};
		let current = state.visible_get(&key);
		match (previous, current) {
			(None, Some(row)) => events.push(ChangeEvent::insert(key, row.clone())),
			(Some(row), None) => events.push(ChangeEvent::delete(key, row.clone())),
			(Some(before), Some(after)) if before != after => {
				events.push(ChangeEvent::update(key, before.clone(), after.clone()))
			}
			_ => {}
		}
	}
	events
}

/// A delete caused by overlay clearing is noise when the open sync
/// transaction is about to restore the same key.
fn suppress_restored_deletes(events: Vec<ChangeEvent>, pending: &PendingSyncBatch) -> Vec<ChangeEvent> {
	events.into_iter()
		.filter(|event| {
			if event.change_type != riffle_core::ChangeType::Delete {
				return true;
			}
			!pending.ops.iter().any(|op| op.restores() && op.key() == Some(&event.key))
		})
		.collect()
}
