// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Live query collections: a collection whose sync source is the output
//! of a compiled query pipeline over other collections.

use std::sync::{
	Arc,
	atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use riffle_collection::{
	ChangesSubscription, Collection, CollectionConfig, RowUpdateMode, SubscribeOptions, SyncCleanup,
	SyncContext, SyncOp, SyncSource,
};
use riffle_core::ChangeEvent;
use riffle_type::{Key, Row, Value, compare_values};
use tracing::error;

use crate::{
	Result,
	compile::{Bundle, Compiled, compile},
	ir::Query,
	operator::{DiffKind, FlowDiff, PipeRow},
	optimize::optimize,
};

/// Reserved field carrying a result row's pipeline key.
pub const KEY_FIELD: &str = "_key";

/// Reserved field carrying a result row's ORDER BY index.
pub const ORDER_INDEX_FIELD: &str = "_order_index";

static LIVE_QUERY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Compile a query into a live collection with a generated id.
pub fn live_query(query: Arc<Query>) -> Result<Collection> {
	let id = format!("live-query-{}", LIVE_QUERY_SEQ.fetch_add(1, Ordering::Relaxed));
	live_query_named(&id, query)
}

/// Compile a query into a live collection. The collection's synced state
/// tracks the pipeline output incrementally; it supports everything a
/// plain collection does, including subscriptions, indexes and further
/// optimistic mutations.
pub fn live_query_named(id: &str, query: Arc<Query>) -> Result<Collection> {
	// Surface malformed queries here rather than at first subscribe; the
	// executable pipeline itself is built when sync starts.
	compile(&optimize(&query))?;

	let ordered = !query.order_by.is_empty();
	let sync = Arc::new(PipelineSync {
		query,
	});
	let mut config = CollectionConfig::new(id, sync, |row: &Row| {
		row.get(KEY_FIELD).cloned().and_then(|value| Key::try_from(value).ok())
	});
	if ordered {
		config = config.with_compare(|a: &Row, b: &Row| {
			let left = a.get(ORDER_INDEX_FIELD).cloned().unwrap_or(Value::Undefined);
			let right = b.get(ORDER_INDEX_FIELD).cloned().unwrap_or(Value::Undefined);
			compare_values(&left, &right)
		});
	}
	Ok(Collection::new(config))
}

struct PipelineSync {
	query: Arc<Query>,
}

impl SyncSource for PipelineSync {
	fn sync(&self, context: SyncContext) -> riffle_collection::Result<Option<SyncCleanup>> {
		let optimized = optimize(&self.query);
		let Compiled {
			root,
			sources,
		} = compile(&optimized).map_err(|cause| riffle_collection::Error::SyncStartFailed {
			message: cause.to_string(),
		})?;

		let runner = Arc::new(Mutex::new(Runner {
			root,
			context: context.clone(),
			batch: 0,
		}));

		let mut subscriptions: Vec<ChangesSubscription> = Vec::with_capacity(sources.len());
		for source in sources {
			let mut options = SubscribeOptions::default().with_initial_state();
			if let Some(where_expression) = source.where_expression {
				options = options.with_where_expression(where_expression);
			}
			let runner = runner.clone();
			let source_id = source.id;
			let subscription = source.collection.subscribe_changes(
				move |events: &[ChangeEvent]| {
					runner.lock().tick(source_id, events);
				},
				options,
			)?;
			subscriptions.push(subscription);
		}

		context.mark_ready()?;

		Ok(Some(Box::new(move || {
			drop(subscriptions);
			Ok(())
		})))
	}

	fn row_update_mode(&self) -> RowUpdateMode {
		RowUpdateMode::Full
	}
}

struct Runner {
	root: crate::compile::QueryExec,
	context: SyncContext,
	batch: u64,
}

impl Runner {
	fn tick(&mut self, source: usize, events: &[ChangeEvent]) {
		self.batch += 1;
		let bundle = Bundle {
			batch: self.batch,
			source,
			events,
		};
		let diffs = match self.root.apply(&bundle) {
			Ok(diffs) => diffs,
			Err(cause) => {
				error!("live query tick failed: {cause}");
				return;
			}
		};
		if diffs.is_empty() {
			return;
		}
		if let Err(cause) = self.flush(diffs) {
			error!("live query flush failed: {cause}");
		}
	}

	fn flush(&self, diffs: Vec<FlowDiff>) -> riffle_collection::Result<()> {
		self.context.begin()?;
		for diff in diffs {
			let op = match diff.kind {
				DiffKind::Insert {
					post,
				} => SyncOp::insert(output_row(&diff.key, &post)),
				DiffKind::Update {
					post,
					..
				} => SyncOp::update(output_row(&diff.key, &post)),
				DiffKind::Remove {
					pre,
				} => SyncOp::delete(output_row(&diff.key, &pre)),
			};
			self.context.write(op)?;
		}
		self.context.commit()
	}
}

/// The delivered row: the pipeline output plus the reserved key and order
/// index fields.
fn output_row(key: &Key, pipe: &PipeRow) -> Row {
	let mut row = pipe.output_row();
	row.set(KEY_FIELD, Value::from(key.clone()));
	if let Some(order_index) = &pipe.order_index {
		row.set(ORDER_INDEX_FIELD, order_index.clone());
	}
	row
}
