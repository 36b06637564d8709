// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Application of sync transactions: staging, commit, deferral while user
//! transactions persist, and change computation against the pre-sync
//! snapshot.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::MutexGuard;
use riffle_core::ChangeEvent;
use riffle_type::{Key, Row};
use tracing::{debug, instrument, trace};

use super::{CollectionShared, CollectionState, EmitPlan, PendingSyncBatch, StagedOp, dispatch_plan, overlay};
use crate::{
	CollectionStatus, Error, Result,
	sync::{RowUpdateMode, SyncOp},
};

impl CollectionShared {
	pub(crate) fn sync_begin(&self) -> Result<()> {
		let mut state = self.state.lock();
		if state.pending_sync.is_some() {
			return Err(Error::SyncTransactionInProgress);
		}
		if state.status == CollectionStatus::Loading {
			self.transition(&mut state, CollectionStatus::InitialCommit)?;
		}
		trace!("collection {} sync begin", self.id());
		state.pending_sync = Some(PendingSyncBatch {
			ops: Vec::new(),
			committed: false,
		});
		Ok(())
	}

	pub(crate) fn sync_write(&self, op: SyncOp) -> Result<()> {
		let staged = self.stage(op)?;
		let mut state = self.state.lock();
		let Some(pending) = &mut state.pending_sync else {
			return Err(Error::SyncWriteWithoutBegin);
		};
		if pending.committed {
			return Err(Error::SyncTransactionCommitted);
		}
		pending.ops.push(staged);
		Ok(())
	}

	#[instrument(name = "collection::sync_commit", level = "debug", skip_all, fields(collection = %self.id()))]
	pub(crate) fn sync_commit(&self) -> Result<()> {
		let plan = {
			let mut guard = self.state.lock();
			let state = &mut *guard;
			match &state.pending_sync {
				None => return Err(Error::SyncCommitWithoutBegin),
				Some(pending) if pending.committed => {
					return Err(Error::SyncTransactionCommitted);
				}
				Some(_) => {}
			}
			// Synced truth must not move under a transaction that is
			// persisting; hold the batch until they all settle.
			if state.has_persisting_transactions() {
				debug!("collection {} deferring sync commit", self.id());
				if let Some(pending) = &mut state.pending_sync {
					pending.committed = true;
				}
				return Ok(());
			}
			let batch = state.pending_sync.take().expect("pending batch checked above");
			self.apply_sync_batch(state, batch)?
		};
		if let Some(plan) = plan {
			dispatch_plan(plan);
		}
		Ok(())
	}

	pub(crate) fn sync_mark_ready(&self) -> Result<()> {
		let mut guard = self.state.lock();
		self.advance_ready_inner(&mut guard)
	}

	/// Apply a deferred commit once no transaction is persisting anymore.
	pub(crate) fn maybe_apply_deferred_commit(&self) {
		let plan = {
			let mut guard = self.state.lock();
			let state = &mut *guard;
			let deferred = matches!(&state.pending_sync, Some(pending) if pending.committed);
			if !deferred || state.has_persisting_transactions() {
				None
			} else {
				debug!("collection {} applying deferred sync commit", self.id());
				let batch = state.pending_sync.take().expect("deferred batch checked above");
				match self.apply_sync_batch(state, batch) {
					Ok(plan) => plan,
					Err(_) => None,
				}
			}
		};
		if let Some(plan) = plan {
			dispatch_plan(plan);
		}
	}

	/// Derive the key and stage one write.
	fn stage(&self, op: SyncOp) -> Result<StagedOp> {
		let key_of = |value: &Row| (self.config.get_key)(value).ok_or(Error::MissingKey);
		Ok(match op {
			SyncOp::Insert {
				value,
				metadata,
			} => StagedOp::Insert {
				key: key_of(&value)?,
				value,
				metadata,
			},
			SyncOp::Update {
				value,
				metadata,
			} => StagedOp::Update {
				key: key_of(&value)?,
				value,
				metadata,
			},
			SyncOp::Delete {
				value,
			} => StagedOp::Delete {
				key: key_of(&value)?,
			},
			SyncOp::Truncate => StagedOp::Truncate,
		})
	}

	/// Commit is the only moment synced data changes. Events are the diff
	/// between the pre-sync snapshot and the new visible state, merged
	/// with any overlay events batched while the transaction was open.
	fn apply_sync_batch(
		&self,
		state: &mut CollectionState,
		batch: PendingSyncBatch,
	) -> Result<Option<EmitPlan>> {
		// Pre-sync snapshot of every key this commit can affect: the
		// staged keys, everything synced when truncating, and every
		// overlay key (completed overlays are discarded below).
		let mut affected: BTreeSet<Key> = batch.ops.iter().filter_map(|op| op.key().cloned()).collect();
		if batch.ops.iter().any(|op| matches!(op, StagedOp::Truncate)) {
			affected.extend(state.synced_data.keys().cloned());
		}
		affected.extend(state.optimistic_upserts.keys().cloned());
		affected.extend(state.optimistic_deletes.iter().cloned());

		let pre_sync: BTreeMap<Key, Option<Row>> = affected
			.iter()
			.map(|key| (key.clone(), state.visible_get(key).cloned()))
			.collect();

		for op in batch.ops {
			match op {
				StagedOp::Insert {
					key,
					value,
					metadata,
				} => {
					state.synced_data.insert(key.clone(), value);
					if let Some(metadata) = metadata {
						state.synced_metadata.insert(key, metadata);
					}
				}
				StagedOp::Update {
					key,
					value,
					metadata,
				} => {
					let stored = match (self.config.sync.row_update_mode(), state.synced_data.get(&key)) {
						(RowUpdateMode::Partial, Some(existing)) => existing.merge(&value),
						_ => value,
					};
					state.synced_data.insert(key.clone(), stored);
					if let Some(metadata) = metadata {
						state.synced_metadata.insert(key, metadata);
					}
				}
				StagedOp::Delete {
					key,
				} => {
					state.synced_data.remove(&key);
					state.synced_metadata.remove(&key);
				}
				StagedOp::Truncate => {
					state.synced_data.clear();
					state.synced_metadata.clear();
				}
			}
		}

		// Synced data now carries what completed transactions wrote;
		// their overlays are no longer needed. Still-active
		// transactions re-apply theirs in the rebuild.
		state.transactions.retain(|_, t| !t.state().is_terminal());
		overlay::rebuild_overlay(state, &self.config.id);

		let mut commit_events: Vec<ChangeEvent> = Vec::new();
		for (key, previous) in pre_sync {
			let current = state.visible_get(&key);
			match (previous, current) {
				(None, Some(row)) => commit_events.push(ChangeEvent::insert(key, row.clone())),
				(Some(row), None) => commit_events.push(ChangeEvent::delete(key, row)),
				(Some(before), Some(after)) if &before != after => {
					commit_events.push(ChangeEvent::update(key, before, after.clone()));
				}
				_ => {}
			}
		}
		state.recompute_size();
		// Batched overlay events already maintained the indexes when
		// they were produced; only the commit's own diff is new here.
		super::index::apply_events_to_indexes(state, &commit_events);

		let mut events = std::mem::take(&mut state.batched_events);
		events.extend(commit_events);

		self.advance_ready_inner(state)?;
		Ok(self.finalize_events(state, events))
	}

	/// Advance loading / initial-commit to ready and wake preload
	/// waiters. A no-op in every other status.
	fn advance_ready_inner(&self, state: &mut CollectionState) -> Result<()> {
		match state.status {
			CollectionStatus::Loading => {
				self.transition_inner(state, CollectionStatus::InitialCommit)?;
				self.transition_inner(state, CollectionStatus::Ready)?;
			}
			CollectionStatus::InitialCommit => {
				self.transition_inner(state, CollectionStatus::Ready)?;
			}
			_ => {}
		}
		Ok(())
	}

	pub(crate) fn transition(
		&self,
		state: &mut MutexGuard<'_, CollectionState>,
		to: CollectionStatus,
	) -> Result<()> {
		self.transition_inner(state, to)
	}

	pub(crate) fn transition_inner(&self, state: &mut CollectionState, to: CollectionStatus) -> Result<()> {
		if state.status == to {
			return Ok(());
		}
		state.status.validate_transition(to)?;
		debug!("collection {} status {} -> {}", self.id(), state.status, to);
		state.status = to;
		if to == CollectionStatus::Ready || to == CollectionStatus::Error || to == CollectionStatus::CleanedUp
		{
			self.ready.notify_all();
		}
		Ok(())
	}
}
