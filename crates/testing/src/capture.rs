// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::Arc;

use parking_lot::Mutex;
use riffle_core::ChangeEvent;

/// Collects change batches delivered to a subscriber, for assertions.
#[derive(Clone, Default)]
pub struct CapturedEvents {
	batches: Arc<Mutex<Vec<Vec<ChangeEvent>>>>,
}

impl CapturedEvents {
	pub fn new() -> Self {
		Self::default()
	}

	/// A subscriber callback feeding this capture.
	pub fn callback(&self) -> impl Fn(&[ChangeEvent]) + Send + Sync + 'static {
		let batches = self.batches.clone();
		move |events: &[ChangeEvent]| {
			batches.lock().push(events.to_vec());
		}
	}

	/// All delivered batches, in order.
	pub fn batches(&self) -> Vec<Vec<ChangeEvent>> {
		self.batches.lock().clone()
	}

	/// All delivered events, flattened.
	pub fn events(&self) -> Vec<ChangeEvent> {
		self.batches.lock().iter().flatten().cloned().collect()
	}

	pub fn batch_count(&self) -> usize {
		self.batches.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.batches.lock().is_empty()
	}

	pub fn clear(&self) {
		self.batches.lock().clear();
	}
}
