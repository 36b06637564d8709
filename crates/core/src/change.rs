// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use indexmap::IndexMap;
use riffle_type::{Key, Row};
use serde::{Deserialize, Serialize};

/// Kind of change delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
	Insert,
	Update,
	Delete,
}

/// One change to one key, relative to the previously visible value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
	pub change_type: ChangeType,
	pub key: Key,
	/// The new value; for deletes, the value that was removed.
	pub value: Row,
	/// The previously visible value; `None` for inserts.
	pub previous: Option<Row>,
}

impl ChangeEvent {
	pub fn insert(key: Key, value: Row) -> Self {
		Self {
			change_type: ChangeType::Insert,
			key,
			value,
			previous: None,
		}
	}

	pub fn update(key: Key, previous: Row, value: Row) -> Self {
		Self {
			change_type: ChangeType::Update,
			key,
			value,
			previous: Some(previous),
		}
	}

	pub fn delete(key: Key, previous: Row) -> Self {
		Self {
			change_type: ChangeType::Delete,
			key,
			value: previous.clone(),
			previous: Some(previous),
		}
	}
}

/// Coalesce a batch so no key appears more than once, preserving first-seen
/// key order. Consecutive changes to a key compose: an insert followed by a
/// delete cancels out, a delete followed by an insert reads as an update,
/// and so on.
pub fn coalesce_events(events: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
	let mut merged: IndexMap<Key, Option<ChangeEvent>> = IndexMap::new();
	for event in events {
		match merged.get_mut(&event.key) {
			None => {
				merged.insert(event.key.clone(), Some(event));
			}
			Some(slot) => {
				let combined = match slot.take() {
					None => {
						// The key previously cancelled out;
						// whatever arrives now stands alone.
						Some(event)
					}
					Some(first) => combine(first, event),
				};
				*slot = combined;
			}
		}
	}
	merged.into_values().flatten().collect()
}

fn combine(first: ChangeEvent, second: ChangeEvent) -> Option<ChangeEvent> {
	use ChangeType::*;
	let key = second.key.clone();
	match (first.change_type, second.change_type) {
		(Insert, Delete) => None,
		(Insert, _) => Some(ChangeEvent::insert(key, second.value)),
		(Update, Delete) | (Delete, Delete) => {
			Some(ChangeEvent::delete(key, first.previous.unwrap_or(second.value)))
		}
		(Update, _) => {
			let previous = first.previous.unwrap_or_default();
			Some(ChangeEvent::update(key, previous, second.value))
		}
		(Delete, _) => {
			let previous = first.previous.unwrap_or_default();
			if previous == second.value {
				// Deleted and restored to the same value: nothing
				// visibly changed.
				None
			} else {
				Some(ChangeEvent::update(key, previous, second.value))
			}
		}
	}
}
