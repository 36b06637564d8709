// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Lifecycle: lazy sync start, preload, cleanup and restart.

use std::collections::BTreeMap;

use riffle_type::{Key, Row};
use tracing::{debug, instrument, warn};

use super::Collection;
use crate::{CollectionStatus, Error, Result, sync::SyncContext};

impl Collection {
	/// Start the sync source if this collection is idle or was cleaned
	/// up. Errors when the collection is in error state.
	pub(crate) fn start_sync_if_needed(&self) -> Result<()> {
		{
			let mut state = self.shared.state.lock();
			match state.status {
				CollectionStatus::Idle | CollectionStatus::CleanedUp => {
					self.shared.transition(&mut state, CollectionStatus::Loading)?;
					state.sync_started = true;
				}
				CollectionStatus::Error => {
					return Err(Error::CollectionInErrorState {
						collection: self.id().to_string(),
					});
				}
				_ => return Ok(()),
			}
		}
		debug!("collection {} starting sync", self.id());
		let context = SyncContext::new(self.shared.self_weak.clone());
		match self.shared.config.sync.sync(context) {
			Ok(cleanup) => {
				self.shared.state.lock().cleanup_fn = cleanup;
				Ok(())
			}
			Err(cause) => {
				let mut state = self.shared.state.lock();
				let _ = self.shared.transition(&mut state, CollectionStatus::Error);
				Err(Error::SyncStartFailed {
					message: cause.to_string(),
				})
			}
		}
	}

	/// Idempotently start sync and block until the collection first
	/// reaches ready.
	#[instrument(name = "collection::preload", level = "debug", skip_all, fields(collection = %self.id()))]
	pub fn preload(&self) -> Result<()> {
		loop {
			self.start_sync_if_needed()?;
			let mut state = self.shared.state.lock();
			loop {
				match state.status {
					CollectionStatus::Ready => return Ok(()),
					CollectionStatus::Error => {
						return Err(Error::CollectionInErrorState {
							collection: self.id().to_string(),
						});
					}
					// Cleaned up while waiting; restart sync.
					CollectionStatus::CleanedUp => break,
					_ => self.shared.ready.wait(&mut state),
				}
			}
		}
	}

	/// Snapshot of the visible state, once ready.
	pub fn state_when_ready(&self) -> Result<BTreeMap<Key, Row>> {
		self.preload()?;
		Ok(self.state())
	}

	/// Ordered visible rows, once ready.
	pub fn to_array_when_ready(&self) -> Result<Vec<Row>> {
		self.preload()?;
		Ok(self.to_array())
	}

	pub fn is_ready(&self) -> bool {
		self.status() == CollectionStatus::Ready
	}

	/// Stop sync, drop all in-memory state and transition to cleaned-up.
	/// Idempotent; a later subscriber or mutation restarts the
	/// collection. The sync source's cleanup error, if any, is returned
	/// after the transition has completed, so state is never corrupted.
	#[instrument(name = "collection::cleanup", level = "debug", skip_all, fields(collection = %self.id()))]
	pub fn cleanup(&self) -> Result<()> {
		let cleanup_fn = {
			let mut state = self.shared.state.lock();
			if state.status == CollectionStatus::CleanedUp {
				return Ok(());
			}
			self.shared.transition(&mut state, CollectionStatus::CleanedUp)?;
			state.gc.take();
			state.synced_data.clear();
			state.synced_metadata.clear();
			state.optimistic_upserts.clear();
			state.optimistic_deletes.clear();
			state.size = 0;
			state.transactions.clear();
			state.indexes.clear();
			state.pending_sync = None;
			state.batched_events.clear();
			state.sync_started = false;
			state.cleanup_fn.take()
		};
		if let Some(cleanup) = cleanup_fn {
			if let Err(cause) = cleanup() {
				warn!("collection {} sync cleanup failed: {cause}", self.id());
				return Err(Error::SyncCleanupFailed {
					message: cause.to_string(),
				});
			}
		}
		Ok(())
	}
}
