// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use riffle_collection::{Result, RowUpdateMode, SyncCleanup, SyncContext, SyncOp, SyncSource};
use riffle_type::Value;

/// A sync source driven explicitly from test code. It captures the
/// collection's [`SyncContext`] on start; the test then calls `begin`,
/// `write`, `commit` and `mark_ready` at the moments under test.
pub struct ScriptedSync {
	context: Mutex<Option<SyncContext>>,
	row_update_mode: RowUpdateMode,
	sync_metadata: Option<Value>,
	fail_cleanup: Arc<AtomicBool>,
	cleanup_calls: Arc<AtomicUsize>,
}

impl ScriptedSync {
	pub fn new() -> Arc<Self> {
		Self::with_row_update_mode(RowUpdateMode::Partial)
	}

	pub fn with_row_update_mode(mode: RowUpdateMode) -> Arc<Self> {
		Arc::new(Self {
			context: Mutex::new(None),
			row_update_mode: mode,
			sync_metadata: None,
			fail_cleanup: Arc::new(AtomicBool::new(false)),
			cleanup_calls: Arc::new(AtomicUsize::new(0)),
		})
	}

	/// Make the returned cleanup function fail when invoked.
	pub fn fail_cleanup(&self) {
		self.fail_cleanup.store(true, Ordering::SeqCst);
	}

	pub fn started(&self) -> bool {
		self.context.lock().is_some()
	}

	pub fn cleanup_calls(&self) -> usize {
		self.cleanup_calls.load(Ordering::SeqCst)
	}

	fn context(&self) -> SyncContext {
		self.context.lock().clone().expect("sync source not started yet")
	}

	pub fn begin(&self) -> Result<()> {
		self.context().begin()
	}

	pub fn write(&self, op: SyncOp) -> Result<()> {
		self.context().write(op)
	}

	pub fn commit(&self) -> Result<()> {
		self.context().commit()
	}

	pub fn mark_ready(&self) -> Result<()> {
		self.context().mark_ready()
	}

	/// begin / write… / commit in one call.
	pub fn apply(&self, ops: impl IntoIterator<Item = SyncOp>) -> Result<()> {
		self.begin()?;
		for op in ops {
			self.write(op)?;
		}
		self.commit()
	}
}

impl SyncSource for ScriptedSync {
	fn sync(&self, context: SyncContext) -> Result<Option<SyncCleanup>> {
		*self.context.lock() = Some(context);
		let calls = self.cleanup_calls.clone();
		let fail = self.fail_cleanup.clone();
		Ok(Some(Box::new(move || {
			calls.fetch_add(1, Ordering::SeqCst);
			if fail.load(Ordering::SeqCst) {
				Err("scripted cleanup failure".into())
			} else {
				Ok(())
			}
		})))
	}

	fn row_update_mode(&self) -> RowUpdateMode {
		self.row_update_mode
	}

	fn sync_metadata(&self) -> Option<Value> {
		self.sync_metadata.clone()
	}
}
