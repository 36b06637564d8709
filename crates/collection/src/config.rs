// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{cmp::Ordering, sync::Arc, time::Duration};

use riffle_transaction::Transaction;
use riffle_type::{Key, Row, Value};

use crate::{Collection, Schema, sync::SyncSource};

/// Handler error type, matching the transaction handler contract.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Context passed to `on_insert` / `on_update` / `on_delete` handlers.
pub struct HandlerContext {
	pub transaction: Transaction,
	pub collection: Collection,
}

/// A persistence handler for direct (transaction-less) mutations.
pub type MutationHandler = Arc<dyn Fn(HandlerContext) -> std::result::Result<(), HandlerError> + Send + Sync>;

pub type KeyFn = Arc<dyn Fn(&Row) -> Option<Key> + Send + Sync>;
pub type CompareFn = Arc<dyn Fn(&Row, &Row) -> Ordering + Send + Sync>;

const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Configuration of a collection. `id`, `sync` and `get_key` are required;
/// everything else has defaults.
#[derive(Clone)]
pub struct CollectionConfig {
	pub id: String,
	pub get_key: KeyFn,
	pub compare: Option<CompareFn>,
	pub schema: Option<Arc<dyn Schema>>,
	pub sync: Arc<dyn SyncSource>,
	pub on_insert: Option<MutationHandler>,
	pub on_update: Option<MutationHandler>,
	pub on_delete: Option<MutationHandler>,
	/// How long a collection without subscribers lingers before cleanup.
	pub gc_time: Duration,
	/// Create indexes automatically for index-convertible subscription
	/// filters.
	pub auto_index: bool,
}

impl CollectionConfig {
	pub fn new(
		id: impl Into<String>,
		sync: Arc<dyn SyncSource>,
		get_key: impl Fn(&Row) -> Option<Key> + Send + Sync + 'static,
	) -> Self {
		Self {
			id: id.into(),
			get_key: Arc::new(get_key),
			compare: None,
			schema: None,
			sync,
			on_insert: None,
			on_update: None,
			on_delete: None,
			gc_time: DEFAULT_GC_TIME,
			auto_index: true,
		}
	}

	/// Key rows by a field, the common case. The field must hold an
	/// integer or text value.
	pub fn keyed_by(id: impl Into<String>, sync: Arc<dyn SyncSource>, field: &str) -> Self {
		let field = field.to_string();
		Self::new(id, sync, move |row: &Row| {
			row.get(&field).cloned().and_then(|value| Key::try_from(value).ok())
		})
	}

	pub fn with_compare(mut self, compare: impl Fn(&Row, &Row) -> Ordering + Send + Sync + 'static) -> Self {
		self.compare = Some(Arc::new(compare));
		self
	}

	pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
		self.schema = Some(schema);
		self
	}

	pub fn on_insert(
		mut self,
		handler: impl Fn(HandlerContext) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
	) -> Self {
		self.on_insert = Some(Arc::new(handler));
		self
	}

	pub fn on_update(
		mut self,
		handler: impl Fn(HandlerContext) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
	) -> Self {
		self.on_update = Some(Arc::new(handler));
		self
	}

	pub fn on_delete(
		mut self,
		handler: impl Fn(HandlerContext) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
	) -> Self {
		self.on_delete = Some(Arc::new(handler));
		self
	}

	pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
		self.gc_time = gc_time;
		self
	}

	pub fn without_auto_index(mut self) -> Self {
		self.auto_index = false;
		self
	}
}

/// Per-call options for `insert`.
#[derive(Clone, Default)]
pub struct InsertConfig {
	/// Apply the mutation to the optimistic overlay immediately.
	/// Defaults to true.
	pub optimistic: Option<bool>,
	pub metadata: Option<Value>,
}

/// Per-call options for `update`.
#[derive(Clone, Default)]
pub struct UpdateConfig {
	pub optimistic: Option<bool>,
	pub metadata: Option<Value>,
}

/// Per-call options for `delete`.
#[derive(Clone, Default)]
pub struct DeleteConfig {
	pub optimistic: Option<bool>,
	pub metadata: Option<Value>,
}
