// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{sync::Weak, thread, time::Duration};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use tracing::{debug, error};

use crate::collection::CollectionShared;

/// One-shot cleanup timer, armed when the last subscriber leaves and
/// cancelled when one arrives. The timer thread holds the collection
/// weakly, so a dropped collection never waits for its timer.
pub(crate) struct GcTimer {
	cancel: Sender<()>,
}

impl GcTimer {
	pub(crate) fn schedule(shared: Weak<CollectionShared>, after: Duration) -> Self {
		let (cancel, cancelled) = bounded::<()>(1);
		thread::spawn(move || {
			match cancelled.recv_timeout(after) {
				Err(RecvTimeoutError::Timeout) => {
					let Some(shared) = shared.upgrade() else {
						return;
					};
					debug!("collection {} idle for {:?}, cleaning up", shared.id(), after);
					if let Err(cause) = crate::Collection::from_shared(shared).cleanup() {
						error!("gc cleanup failed: {cause}");
					}
				}
				// Cancelled or the collection was dropped.
				_ => {}
			}
		});
		Self {
			cancel,
		}
	}

	pub(crate) fn cancel(&self) {
		let _ = self.cancel.try_send(());
	}
}

impl Drop for GcTimer {
	fn drop(&mut self) {
		self.cancel();
	}
}
