// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	collections::BTreeSet,
	fmt::{Display, Formatter},
	sync::Arc,
	time::SystemTime,
};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
	Error, GlobalKey, MutationTarget, PendingMutation, Result,
	ambient::AmbientGuard,
	registry,
};

/// Error type returned by user-supplied mutation handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The persistence handler invoked by `commit`. It receives the committing
/// transaction and persists its mutations to the authority.
pub type MutationFn = Arc<dyn Fn(&Transaction) -> std::result::Result<(), HandlerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
	Pending,
	Persisting,
	Completed,
	Failed,
}

impl TransactionState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransactionState::Completed | TransactionState::Failed)
	}
}

impl Display for TransactionState {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			TransactionState::Pending => f.write_str("pending"),
			TransactionState::Persisting => f.write_str("persisting"),
			TransactionState::Completed => f.write_str("completed"),
			TransactionState::Failed => f.write_str("failed"),
		}
	}
}

pub struct TransactionConfig {
	pub auto_commit: bool,
	pub mutation_fn: MutationFn,
}

impl TransactionConfig {
	pub fn new(
		mutation_fn: impl Fn(&Transaction) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
	) -> Self {
		Self {
			auto_commit: true,
			mutation_fn: Arc::new(mutation_fn),
		}
	}

	pub fn manual(mut self) -> Self {
		self.auto_commit = false;
		self
	}
}

enum PersistState {
	Waiting,
	Resolved,
	Rejected(String),
}

struct PersistSignal {
	state: Mutex<PersistState>,
	condvar: Condvar,
}

impl PersistSignal {
	fn new() -> Self {
		Self {
			state: Mutex::new(PersistState::Waiting),
			condvar: Condvar::new(),
		}
	}

	fn resolve(&self) {
		*self.state.lock() = PersistState::Resolved;
		self.condvar.notify_all();
	}

	fn reject(&self, message: String) {
		*self.state.lock() = PersistState::Rejected(message);
		self.condvar.notify_all();
	}

	fn wait(&self) -> Result<()> {
		let mut state = self.state.lock();
		loop {
			match &*state {
				PersistState::Resolved => return Ok(()),
				PersistState::Rejected(message) => {
					return Err(Error::Failed {
						message: message.clone(),
					});
				}
				PersistState::Waiting => self.condvar.wait(&mut state),
			}
		}
	}

	fn poll(&self) -> Option<Result<()>> {
		match &*self.state.lock() {
			PersistState::Waiting => None,
			PersistState::Resolved => Some(Ok(())),
			PersistState::Rejected(message) => Some(Err(Error::Failed {
				message: message.clone(),
			})),
		}
	}
}

pub(crate) struct TransactionInner {
	id: Uuid,
	created_at: SystemTime,
	sequence_number: u64,
	auto_commit: bool,
	mutation_fn: MutationFn,
	state: Mutex<TransactionState>,
	mutations: Mutex<IndexMap<GlobalKey, PendingMutation>>,
	error: Mutex<Option<String>>,
	persisted: PersistSignal,
}

/// A group of pending mutations with a lifecycle and a persistence
/// handler. Cheap to clone; all clones share one transaction.
#[derive(Clone)]
pub struct Transaction {
	inner: Arc<TransactionInner>,
}

impl std::fmt::Debug for Transaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Transaction")
			.field("id", &self.inner.id)
			.field("sequence_number", &self.inner.sequence_number)
			.field("auto_commit", &self.inner.auto_commit)
			.field("state", &*self.inner.state.lock())
			.finish()
	}
}

impl Transaction {
	pub fn new(config: TransactionConfig) -> Self {
		let inner = Arc::new(TransactionInner {
			id: Uuid::new_v4(),
			created_at: SystemTime::now(),
			sequence_number: registry::next_sequence(),
			auto_commit: config.auto_commit,
			mutation_fn: config.mutation_fn,
			state: Mutex::new(TransactionState::Pending),
			mutations: Mutex::new(IndexMap::new()),
			error: Mutex::new(None),
			persisted: PersistSignal::new(),
		});
		registry::register(Arc::downgrade(&inner));
		Self {
			inner,
		}
	}

	pub(crate) fn from_inner(inner: Arc<TransactionInner>) -> Self {
		Self {
			inner,
		}
	}

	pub fn id(&self) -> Uuid {
		self.inner.id
	}

	pub fn created_at(&self) -> SystemTime {
		self.inner.created_at
	}

	pub fn sequence_number(&self) -> u64 {
		self.inner.sequence_number
	}

	pub fn auto_commit(&self) -> bool {
		self.inner.auto_commit
	}

	pub fn state(&self) -> TransactionState {
		*self.inner.state.lock()
	}

	/// The recorded failure message, if the transaction failed.
	pub fn error(&self) -> Option<String> {
		self.inner.error.lock().clone()
	}

	/// Run `callback` with this transaction as the ambient transaction:
	/// collection mutations performed inside attach to it. Commits
	/// afterwards when the transaction is auto-commit.
	pub fn mutate<R>(&self, callback: impl FnOnce() -> R) -> Result<R> {
		let state = self.state();
		if state != TransactionState::Pending {
			return Err(Error::MutateNonPending {
				state,
			});
		}
		let result = {
			let _guard = AmbientGuard::enter(self.clone());
			callback()
		};
		if self.inner.auto_commit {
			self.commit()?;
		}
		Ok(result)
	}

	/// Merge mutations into the transaction. A mutation whose global key
	/// is already present replaces the existing one in place.
	pub fn apply_mutations(&self, mutations: Vec<PendingMutation>) -> Result<()> {
		let state = self.state();
		if state != TransactionState::Pending {
			return Err(Error::ApplyNonPending {
				state,
			});
		}
		let targets = {
			let mut owned = self.inner.mutations.lock();
			let mut targets: Vec<Arc<dyn MutationTarget>> = Vec::new();
			for mutation in mutations {
				if !targets.iter().any(|t| t.collection_id() == mutation.target.collection_id()) {
					targets.push(mutation.target.clone());
				}
				owned.insert(mutation.global_key.clone(), mutation);
			}
			targets
		};
		for target in targets {
			target.transaction_touched(self, true);
		}
		Ok(())
	}

	/// Persist the transaction: runs the mutation handler, then settles
	/// into `completed`, or rolls back on handler failure.
	pub fn commit(&self) -> Result<()> {
		{
			let mut state = self.inner.state.lock();
			if *state != TransactionState::Pending {
				return Err(Error::CommitNonPending {
					state: *state,
				});
			}
			*state = TransactionState::Persisting;
		}
		trace!("transaction {} persisting", self.inner.id);

		if self.inner.mutations.lock().is_empty() {
			*self.inner.state.lock() = TransactionState::Completed;
			self.inner.persisted.resolve();
			return Ok(());
		}

		match (self.inner.mutation_fn)(self) {
			Ok(()) => {
				*self.inner.state.lock() = TransactionState::Completed;
				debug!("transaction {} completed", self.inner.id);
				for target in self.touched_targets() {
					target.transaction_touched(self, false);
				}
				self.inner.persisted.resolve();
				Ok(())
			}
			Err(cause) => {
				let message = cause.to_string();
				*self.inner.error.lock() = Some(message.clone());
				self.rollback_internal(false)?;
				Err(Error::HandlerFailed {
					message,
				})
			}
		}
	}

	/// Fail the transaction and cascade to every other live transaction
	/// whose mutations overlap this one's global keys.
	pub fn rollback(&self) -> Result<()> {
		self.rollback_internal(false)
	}

	pub(crate) fn rollback_internal(&self, is_secondary_rollback: bool) -> Result<()> {
		{
			let mut state = self.inner.state.lock();
			match *state {
				TransactionState::Completed => return Err(Error::RollbackCompleted),
				TransactionState::Failed => return Ok(()),
				_ => *state = TransactionState::Failed,
			}
		}
		debug!("transaction {} rolled back (secondary: {})", self.inner.id, is_secondary_rollback);
		if self.inner.error.lock().is_none() {
			*self.inner.error.lock() = Some("rolled back".to_string());
		}
		self.inner.persisted.reject(
			self.error().unwrap_or_else(|| "rolled back".to_string()),
		);

		if !is_secondary_rollback {
			let own_keys = self.global_keys();
			for other in registry::snapshot() {
				if other.id() == self.id() || other.state().is_terminal() {
					continue;
				}
				if other.global_keys().intersection(&own_keys).next().is_some() {
					// The candidate may have completed since the
					// snapshot; that rollback failing is fine.
					let _ = other.rollback_internal(true);
				}
			}
		}

		for target in self.touched_targets() {
			target.transaction_touched(self, false);
		}
		Ok(())
	}

	/// Block until the transaction settles; `Err` carries the recorded
	/// failure when it rolled back.
	pub fn wait_persisted(&self) -> Result<()> {
		self.inner.persisted.wait()
	}

	/// Non-blocking view of the persistence outcome.
	pub fn persist_state(&self) -> Option<Result<()>> {
		self.inner.persisted.poll()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.mutations.lock().is_empty()
	}

	pub fn mutation_count(&self) -> usize {
		self.inner.mutations.lock().len()
	}

	/// Snapshot of all mutations, in application order.
	pub fn mutations(&self) -> Vec<PendingMutation> {
		self.inner.mutations.lock().values().cloned().collect()
	}

	/// Snapshot of the mutations targeting one collection.
	pub fn mutations_for(&self, collection_id: &str) -> Vec<PendingMutation> {
		self.inner
			.mutations
			.lock()
			.values()
			.filter(|m| m.target.collection_id() == collection_id)
			.cloned()
			.collect()
	}

	pub fn global_keys(&self) -> BTreeSet<GlobalKey> {
		self.inner.mutations.lock().keys().cloned().collect()
	}

	fn touched_targets(&self) -> Vec<Arc<dyn MutationTarget>> {
		let mutations = self.inner.mutations.lock();
		let mut targets: Vec<Arc<dyn MutationTarget>> = Vec::new();
		for mutation in mutations.values() {
			if !targets.iter().any(|t| t.collection_id() == mutation.target.collection_id()) {
				targets.push(mutation.target.clone());
			}
		}
		targets
	}
}
