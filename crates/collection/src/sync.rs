// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::Weak;

use riffle_type::{Row, Value};

use crate::{
	Collection, Error, Result,
	collection::CollectionShared,
};

/// How sync-delivered updates combine with the stored synced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowUpdateMode {
	/// Merge the written fields over the stored row.
	#[default]
	Partial,
	/// Replace the stored row wholesale.
	Full,
}

/// One write inside a sync transaction. Keys are derived from the value via
/// the collection's key function.
#[derive(Debug, Clone)]
pub enum SyncOp {
	Insert { value: Row, metadata: Option<Value> },
	Update { value: Row, metadata: Option<Value> },
	Delete { value: Row },
	/// Drop all synced rows; writes later in the same transaction
	/// repopulate.
	Truncate,
}

impl SyncOp {
	pub fn insert(value: Row) -> Self {
		SyncOp::Insert {
			value,
			metadata: None,
		}
	}

	pub fn update(value: Row) -> Self {
		SyncOp::Update {
			value,
			metadata: None,
		}
	}

	pub fn delete(value: Row) -> Self {
		SyncOp::Delete {
			value,
		}
	}
}

/// Cleanup returned by a sync source, run when the collection is cleaned
/// up.
pub type SyncCleanup = Box<dyn FnOnce() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// The external authority feeding a collection. `sync` is called when the
/// collection starts (lazily, on first subscriber, mutation or preload) and
/// drives the `begin` / `write` / `commit` protocol on the context, from
/// any thread.
pub trait SyncSource: Send + Sync {
	fn sync(&self, context: SyncContext) -> Result<Option<SyncCleanup>>;

	fn row_update_mode(&self) -> RowUpdateMode {
		RowUpdateMode::Partial
	}

	/// Opaque metadata stamped onto mutations created while this source
	/// backs the collection.
	fn sync_metadata(&self) -> Option<Value> {
		None
	}
}

/// Handle a sync source uses to drive its collection. Holds the collection
/// weakly so an abandoned source cannot keep it alive.
#[derive(Clone)]
pub struct SyncContext {
	shared: Weak<CollectionShared>,
}

impl SyncContext {
	pub(crate) fn new(shared: Weak<CollectionShared>) -> Self {
		Self {
			shared,
		}
	}

	fn shared(&self) -> Result<std::sync::Arc<CollectionShared>> {
		self.shared.upgrade().ok_or(Error::CollectionGone)
	}

	/// The collection behind this context, if it is still alive.
	pub fn collection(&self) -> Option<Collection> {
		self.shared.upgrade().map(Collection::from_shared)
	}

	/// Open a sync transaction. Fails while another one is in progress.
	pub fn begin(&self) -> Result<()> {
		self.shared()?.sync_begin()
	}

	/// Stage one write into the open sync transaction.
	pub fn write(&self, op: SyncOp) -> Result<()> {
		self.shared()?.sync_write(op)
	}

	/// Atomically apply the open sync transaction and emit change events.
	pub fn commit(&self) -> Result<()> {
		self.shared()?.sync_commit()
	}

	/// Advance the collection to ready without waiting for a commit.
	pub fn mark_ready(&self) -> Result<()> {
		self.shared()?.sync_mark_ready()
	}
}
