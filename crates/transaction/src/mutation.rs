// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	fmt::{Debug, Display, Formatter},
	sync::Arc,
	time::SystemTime,
};

use riffle_type::{Key, Row, Value};
use uuid::Uuid;

use crate::Transaction;

/// Kind of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
	Insert,
	Update,
	Delete,
}

/// Cross-collection mutation identity: `KEY::<collection-id>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalKey(String);

impl GlobalKey {
	pub fn new(collection_id: &str, key: &Key) -> Self {
		Self(format!("KEY::{collection_id}/{key}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for GlobalKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// The collection-side surface a transaction drives. Mutations hold a
/// handle to their target instead of the concrete collection type, which
/// keeps ownership acyclic at the type level.
pub trait MutationTarget: Send + Sync {
	fn collection_id(&self) -> &str;

	/// Called whenever a transaction's mutation set or state changes.
	/// `from_user_action` is true when the change is attributable to an
	/// operation the user just performed on this thread.
	fn transaction_touched(&self, transaction: &Transaction, from_user_action: bool);
}

/// A single optimistic mutation, owned by exactly one transaction.
#[derive(Clone)]
pub struct PendingMutation {
	pub id: Uuid,
	pub mutation_type: MutationType,
	pub key: Key,
	pub global_key: GlobalKey,
	/// The visible row before the mutation; `None` for inserts.
	pub original: Option<Row>,
	/// The full row after the mutation; equals `original` for deletes.
	pub modified: Row,
	/// Only the fields the user touched.
	pub changes: Row,
	pub metadata: Option<Value>,
	pub sync_metadata: Option<Value>,
	pub optimistic: bool,
	pub target: Arc<dyn MutationTarget>,
	pub created_at: SystemTime,
	pub updated_at: SystemTime,
}

impl PendingMutation {
	pub fn new(
		mutation_type: MutationType,
		key: Key,
		original: Option<Row>,
		modified: Row,
		changes: Row,
		optimistic: bool,
		target: Arc<dyn MutationTarget>,
	) -> Self {
		let now = SystemTime::now();
		let global_key = GlobalKey::new(target.collection_id(), &key);
		Self {
			id: Uuid::new_v4(),
			mutation_type,
			key,
			global_key,
			original,
			modified,
			changes,
			metadata: None,
			sync_metadata: None,
			optimistic,
			target,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
		self.metadata = metadata;
		self
	}

	pub fn with_sync_metadata(mut self, sync_metadata: Option<Value>) -> Self {
		self.sync_metadata = sync_metadata;
		self
	}
}

impl Debug for PendingMutation {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PendingMutation")
			.field("id", &self.id)
			.field("mutation_type", &self.mutation_type)
			.field("global_key", &self.global_key)
			.field("optimistic", &self.optimistic)
			.finish_non_exhaustive()
	}
}
