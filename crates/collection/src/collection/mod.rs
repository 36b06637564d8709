// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The collection itself: dual-layer storage (synced truth plus optimistic
//! overlay), the mutation API, change computation and lifecycle.

pub use index::IndexHandle;
pub(crate) use index::index_match;
pub use mutate::UpdateDraft;

mod index;
mod lifecycle;
mod mutate;
mod overlay;
mod sync_apply;

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{Arc, Weak},
};

use parking_lot::{Condvar, Mutex};
use riffle_core::{ChangeEvent, coalesce_events, ordered::OrderedMap};
use riffle_transaction::Transaction;
use riffle_type::{Key, Row, Value};
use uuid::Uuid;

use crate::{
	CollectionStatus,
	config::CollectionConfig,
	gc::GcTimer,
	subscribe::{EventFilter, KeySubscriber, Subscriber, SubscriberCallback, filter_events},
	sync::SyncCleanup,
};

/// Read and scan counters, used to observe whether filtered reads were
/// answered from indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
	pub full_scans: u64,
	pub index_lookups: u64,
}

/// A sync write staged between `begin` and `commit`, key already derived.
pub(crate) enum StagedOp {
	Insert { key: Key, value: Row, metadata: Option<Value> },
	Update { key: Key, value: Row, metadata: Option<Value> },
	Delete { key: Key },
	Truncate,
}

impl StagedOp {
	pub(crate) fn key(&self) -> Option<&Key> {
		match self {
			StagedOp::Insert { key, .. } | StagedOp::Update { key, .. } | StagedOp::Delete { key } => {
				Some(key)
			}
			StagedOp::Truncate => None,
		}
	}

	/// Whether this op leaves the key present.
	pub(crate) fn restores(&self) -> bool {
		matches!(self, StagedOp::Insert { .. } | StagedOp::Update { .. })
	}
}

pub(crate) struct PendingSyncBatch {
	pub(crate) ops: Vec<StagedOp>,
	/// Set when `commit` arrived while a transaction was persisting; the
	/// batch is applied once every persisting transaction settles.
	pub(crate) committed: bool,
}

pub(crate) struct CollectionState {
	pub(crate) status: CollectionStatus,
	pub(crate) synced_data: BTreeMap<Key, Row>,
	pub(crate) synced_metadata: HashMap<Key, Value>,
	pub(crate) optimistic_upserts: HashMap<Key, Row>,
	pub(crate) optimistic_deletes: HashSet<Key>,
	pub(crate) size: usize,
	/// Transactions that touched this collection, ordered by
	/// `(created_at, sequence_number)`. Completed ones stay until a sync
	/// commit confirms them; failed ones are dropped on the next
	/// recompute.
	pub(crate) transactions: OrderedMap<Uuid, Transaction>,
	pub(crate) subscribers: Vec<Subscriber>,
	pub(crate) key_subscribers: Vec<KeySubscriber>,
	pub(crate) next_subscriber_id: u64,
	pub(crate) indexes: Vec<index::IndexSlot>,
	pub(crate) next_index_id: u64,
	pub(crate) pending_sync: Option<PendingSyncBatch>,
	/// Overlay events produced while a sync transaction is open; flushed
	/// with the commit so subscribers see one batch.
	pub(crate) batched_events: Vec<ChangeEvent>,
	pub(crate) sync_started: bool,
	pub(crate) cleanup_fn: Option<SyncCleanup>,
	pub(crate) gc: Option<GcTimer>,
	pub(crate) scan_stats: ScanStats,
}

impl CollectionState {
	fn new() -> Self {
		Self {
			status: CollectionStatus::Idle,
			synced_data: BTreeMap::new(),
			synced_metadata: HashMap::new(),
			optimistic_upserts: HashMap::new(),
			optimistic_deletes: HashSet::new(),
			size: 0,
			transactions: OrderedMap::new(Arc::new(|a: &Transaction, b: &Transaction| {
				(a.created_at(), a.sequence_number()).cmp(&(b.created_at(), b.sequence_number()))
			})),
			subscribers: Vec::new(),
			key_subscribers: Vec::new(),
			next_subscriber_id: 0,
			indexes: Vec::new(),
			next_index_id: 0,
			pending_sync: None,
			batched_events: Vec::new(),
			sync_started: false,
			cleanup_fn: None,
			gc: None,
			scan_stats: ScanStats::default(),
		}
	}

	/// The visible value of a key: deletes hide, upserts override, synced
	/// data is the base.
	pub(crate) fn visible_get(&self, key: &Key) -> Option<&Row> {
		if self.optimistic_deletes.contains(key) {
			return None;
		}
		self.optimistic_upserts.get(key).or_else(|| self.synced_data.get(key))
	}

	pub(crate) fn visible_contains(&self, key: &Key) -> bool {
		self.visible_get(key).is_some()
	}

	/// Visible entries in key order.
	pub(crate) fn visible_entries(&self) -> Vec<(Key, Row)> {
		let mut keys: Vec<&Key> = self
			.synced_data
			.keys()
			.filter(|key| !self.optimistic_deletes.contains(key))
			.chain(self.optimistic_upserts.keys().filter(|key| {
				!self.synced_data.contains_key(key) && !self.optimistic_deletes.contains(key)
			}))
			.collect();
		keys.sort();
		keys.into_iter()
			.filter_map(|key| self.visible_get(key).map(|row| (key.clone(), row.clone())))
			.collect()
	}

	pub(crate) fn recompute_size(&mut self) {
		let synced = self
			.synced_data
			.keys()
			.filter(|key| !self.optimistic_deletes.contains(key))
			.count();
		let upserted = self
			.optimistic_upserts
			.keys()
			.filter(|key| {
				!self.synced_data.contains_key(key) && !self.optimistic_deletes.contains(key)
			})
			.count();
		self.size = synced + upserted;
	}

	pub(crate) fn subscriber_count(&self) -> usize {
		self.subscribers.len() + self.key_subscribers.len()
	}

	pub(crate) fn has_persisting_transactions(&self) -> bool {
		self.transactions
			.values()
			.any(|t| t.state() == riffle_transaction::TransactionState::Persisting)
	}
}

/// Everything subscribers deliverable after the state lock is released.
pub(crate) struct EmitPlan {
	events: Vec<ChangeEvent>,
	subscribers: Vec<(SubscriberCallback, Option<EventFilter>)>,
	key_subscribers: Vec<(Key, SubscriberCallback)>,
}

pub(crate) struct CollectionShared {
	pub(crate) config: CollectionConfig,
	pub(crate) state: Mutex<CollectionState>,
	pub(crate) ready: Condvar,
	pub(crate) self_weak: Weak<CollectionShared>,
}

impl CollectionShared {
	pub(crate) fn id(&self) -> &str {
		&self.config.id
	}

	/// Coalesce a batch and snapshot the subscriber list for delivery
	/// after the lock is released. Size and index maintenance happen at
	/// the state-change sites, since delivery may be deferred by
	/// batching. Returns `None` when nothing is left to deliver.
	pub(crate) fn finalize_events(
		&self,
		state: &mut CollectionState,
		events: Vec<ChangeEvent>,
	) -> Option<EmitPlan> {
		let events = coalesce_events(events);
		if events.is_empty() {
			return None;
		}
		let subscribers = state
			.subscribers
			.iter()
			.map(|s| (s.callback.clone(), s.filter.clone()))
			.collect();
		let key_subscribers = state
			.key_subscribers
			.iter()
			.map(|s| (s.key.clone(), s.callback.clone()))
			.collect();
		Some(EmitPlan {
			events,
			subscribers,
			key_subscribers,
		})
	}
}

/// Deliver a finalized batch. Must be called without holding the state
/// lock; subscriber callbacks may read the collection.
pub(crate) fn dispatch_plan(plan: EmitPlan) {
	for (callback, filter) in &plan.subscribers {
		let events = match filter {
			Some(filter) => filter_events(&plan.events, filter),
			None => plan.events.clone(),
		};
		if !events.is_empty() {
			callback(&events);
		}
	}
	for (key, callback) in &plan.key_subscribers {
		let slice: Vec<ChangeEvent> =
			plan.events.iter().filter(|event| &event.key == key).cloned().collect();
		if !slice.is_empty() {
			callback(&slice);
		}
	}
}

/// A named keyed store whose visible state layers optimistic mutations
/// over externally synced data. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Collection {
	pub(crate) shared: Arc<CollectionShared>,
}

impl Collection {
	pub fn new(config: CollectionConfig) -> Self {
		let shared = Arc::new_cyclic(|self_weak| CollectionShared {
			config,
			state: Mutex::new(CollectionState::new()),
			ready: Condvar::new(),
			self_weak: self_weak.clone(),
		});
		Self {
			shared,
		}
	}

	pub(crate) fn from_shared(shared: Arc<CollectionShared>) -> Self {
		Self {
			shared,
		}
	}

	pub fn id(&self) -> &str {
		self.shared.id()
	}

	pub fn status(&self) -> CollectionStatus {
		self.shared.state.lock().status
	}

	/// The visible value of a key.
	pub fn get(&self, key: &Key) -> Option<Row> {
		self.shared.state.lock().visible_get(key).cloned()
	}

	pub fn has(&self, key: &Key) -> bool {
		self.shared.state.lock().visible_contains(key)
	}

	/// Number of visible rows. Cached; O(1).
	pub fn size(&self) -> usize {
		self.shared.state.lock().size
	}

	pub fn keys(&self) -> Vec<Key> {
		self.shared.state.lock().visible_entries().into_iter().map(|(key, _)| key).collect()
	}

	pub fn values(&self) -> Vec<Row> {
		self.shared.state.lock().visible_entries().into_iter().map(|(_, row)| row).collect()
	}

	pub fn entries(&self) -> Vec<(Key, Row)> {
		self.shared.state.lock().visible_entries()
	}

	/// Snapshot of the visible state as a map.
	pub fn state(&self) -> BTreeMap<Key, Row> {
		self.shared.state.lock().visible_entries().into_iter().collect()
	}

	/// Visible rows, ordered by the configured comparator when one is
	/// set, by key otherwise.
	pub fn to_array(&self) -> Vec<Row> {
		let mut rows = self.values();
		if let Some(compare) = &self.shared.config.compare {
			rows.sort_by(|a, b| compare(a, b));
		}
		rows
	}

	pub fn scan_stats(&self) -> ScanStats {
		self.shared.state.lock().scan_stats
	}

	/// Metadata the sync source attached to a synced row.
	pub fn synced_metadata(&self, key: &Key) -> Option<Value> {
		self.shared.state.lock().synced_metadata.get(key).cloned()
	}
}
