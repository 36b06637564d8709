// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeSet;

use riffle_core::{
	ChangeEvent, ChangeType,
	expression::{ColumnExpression, ColumnPath, Expression, index_columns},
	index::{CollectionIndex, OrderedIndex, match_expression},
};
use riffle_type::Key;
use tracing::debug;

use super::{Collection, CollectionState};
use crate::Result;

/// Identifies an index within its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHandle {
	pub id: u64,
}

pub(crate) struct IndexSlot {
	pub(crate) id: u64,
	pub(crate) name: Option<String>,
	pub(crate) index: OrderedIndex,
}

/// Answer an index-convertible expression from this collection's indexes.
pub(crate) fn index_match(state: &CollectionState, expression: &Expression) -> Option<BTreeSet<Key>> {
	let resolve = |path: &ColumnPath| -> Option<&dyn CollectionIndex> {
		state.indexes
			.iter()
			.find(|slot| {
				matches!(slot.index.expression(), Expression::Column(ColumnExpression { path: p }) if p == path)
			})
			.map(|slot| &slot.index as &dyn CollectionIndex)
	};
	match_expression(expression, &resolve)
}

pub(crate) fn apply_events_to_indexes(state: &mut CollectionState, events: &[ChangeEvent]) {
	if state.indexes.is_empty() {
		return;
	}
	// Split borrow: events touch `indexes` only.
	let indexes = &mut state.indexes;
	for slot in indexes.iter_mut() {
		for event in events {
			match event.change_type {
				ChangeType::Insert => slot.index.add(&event.key, &event.value),
				ChangeType::Update => {
					let previous = event.previous.clone().unwrap_or_default();
					slot.index.update(&event.key, &previous, &event.value);
				}
				ChangeType::Delete => slot.index.remove(&event.key, &event.value),
			}
		}
	}
}

impl Collection {
	/// Create an ordered index over a row extractor expression,
	/// populated from the current visible state and maintained on every
	/// change batch.
	pub fn create_index(&self, expression: Expression, name: Option<String>) -> Result<IndexHandle> {
		let mut index = OrderedIndex::new(expression)?;
		let mut state = self.shared.state.lock();
		index.build(&mut state.visible_entries().into_iter());
		let id = state.next_index_id;
		state.next_index_id += 1;
		debug!("collection {} created index {} ({:?})", self.id(), id, name);
		state.indexes.push(IndexSlot {
			id,
			name,
			index,
		});
		Ok(IndexHandle {
			id,
		})
	}

	/// Make sure every column referenced by an index-convertible
	/// expression has an index, creating missing ones.
	pub fn ensure_index_for_expression(&self, expression: &Expression) -> Result<()> {
		for path in index_columns(expression) {
			let exists = {
				let state = self.shared.state.lock();
				state.indexes.iter().any(|slot| {
					matches!(
						slot.index.expression(),
						Expression::Column(ColumnExpression { path: p }) if *p == path
					)
				})
			};
			if !exists {
				self.create_index(
					Expression::Column(ColumnExpression {
						path,
					}),
					None,
				)?;
			}
		}
		Ok(())
	}

	pub fn index_count(&self) -> usize {
		self.shared.state.lock().indexes.len()
	}

	pub fn index_by_name(&self, name: &str) -> Option<IndexHandle> {
		self.shared
			.state
			.lock()
			.indexes
			.iter()
			.find(|slot| slot.name.as_deref() == Some(name))
			.map(|slot| IndexHandle {
				id: slot.id,
			})
	}
}
