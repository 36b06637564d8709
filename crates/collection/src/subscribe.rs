// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Change subscriptions: whole-collection, filtered and per-key.

use std::sync::{Arc, Weak};

use riffle_core::{
	ChangeEvent, ChangeType,
	expression::{Expression, evaluate},
};
use riffle_type::{Key, Row};
use tracing::trace;

use crate::{
	Collection, Result,
	collection::CollectionShared,
	gc::GcTimer,
};

pub(crate) type SubscriberCallback = Arc<dyn Fn(&[ChangeEvent]) + Send + Sync>;

/// Row filter attached to a subscription.
#[derive(Clone)]
pub(crate) enum EventFilter {
	Expression(Arc<Expression>),
	Predicate(Arc<dyn Fn(&Row) -> bool + Send + Sync>),
}

impl EventFilter {
	pub(crate) fn matches(&self, row: &Row) -> bool {
		match self {
			EventFilter::Expression(expression) => {
				evaluate(expression, row).map(|value| value.is_truthy()).unwrap_or(false)
			}
			EventFilter::Predicate(predicate) => predicate(row),
		}
	}
}

pub(crate) struct Subscriber {
	pub(crate) id: u64,
	pub(crate) callback: SubscriberCallback,
	pub(crate) filter: Option<EventFilter>,
}

pub(crate) struct KeySubscriber {
	pub(crate) id: u64,
	pub(crate) key: Key,
	pub(crate) callback: SubscriberCallback,
}

/// Project a batch through a filter. Updates crossing the filter boundary
/// become inserts (entering) or deletes (leaving).
pub(crate) fn filter_events(events: &[ChangeEvent], filter: &EventFilter) -> Vec<ChangeEvent> {
	events.iter()
		.filter_map(|event| match event.change_type {
			ChangeType::Insert | ChangeType::Delete => {
				filter.matches(&event.value).then(|| event.clone())
			}
			ChangeType::Update => {
				let now = filter.matches(&event.value);
				let before =
					event.previous.as_ref().map(|row| filter.matches(row)).unwrap_or(false);
				match (before, now) {
					(true, true) => Some(event.clone()),
					(false, true) => {
						Some(ChangeEvent::insert(event.key.clone(), event.value.clone()))
					}
					(true, false) => Some(ChangeEvent::delete(
						event.key.clone(),
						event.previous.clone().unwrap_or_default(),
					)),
					(false, false) => None,
				}
			}
		})
		.collect()
}

/// Options for [`Collection::subscribe_changes`].
#[derive(Clone, Default)]
pub struct SubscribeOptions {
	/// Deliver the current visible state as insert events on subscribe.
	pub include_initial_state: bool,
	/// Declarative row filter; index-convertible expressions may create
	/// an index automatically.
	pub where_expression: Option<Expression>,
	/// Opaque row filter; never uses indexes.
	pub where_predicate: Option<Arc<dyn Fn(&Row) -> bool + Send + Sync>>,
}

impl SubscribeOptions {
	pub fn with_initial_state(mut self) -> Self {
		self.include_initial_state = true;
		self
	}

	pub fn with_where_expression(mut self, expression: Expression) -> Self {
		self.where_expression = Some(expression);
		self
	}

	pub fn with_where(mut self, predicate: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
		self.where_predicate = Some(Arc::new(predicate));
		self
	}

	fn filter(&self) -> Option<EventFilter> {
		if let Some(expression) = &self.where_expression {
			return Some(EventFilter::Expression(Arc::new(expression.clone())));
		}
		self.where_predicate.clone().map(EventFilter::Predicate)
	}
}

/// Keeps a subscription alive; dropping it unsubscribes. The last
/// subscription leaving arms the GC timer.
#[derive(Debug)]
pub struct ChangesSubscription {
	shared: Weak<CollectionShared>,
	id: u64,
}

impl ChangesSubscription {
	pub fn unsubscribe(self) {}
}

impl Drop for ChangesSubscription {
	fn drop(&mut self) {
		let Some(shared) = self.shared.upgrade() else {
			return;
		};
		let mut state = shared.state.lock();
		state.subscribers.retain(|s| s.id != self.id);
		state.key_subscribers.retain(|s| s.id != self.id);
		if state.subscriber_count() == 0 && state.gc.is_none() {
			trace!("collection {} lost its last subscriber, arming gc", shared.id());
			state.gc =
				Some(GcTimer::schedule(shared.self_weak.clone(), shared.config.gc_time));
		}
	}
}

impl Collection {
	/// Subscribe to change batches. Starts sync lazily and cancels any
	/// pending GC. With `include_initial_state`, the callback first
	/// receives the current visible state as inserts (filtered).
	pub fn subscribe_changes(
		&self,
		callback: impl Fn(&[ChangeEvent]) + Send + Sync + 'static,
		options: SubscribeOptions,
	) -> Result<ChangesSubscription> {
		let callback: SubscriberCallback = Arc::new(callback);
		let filter = options.filter();

		if self.shared.config.auto_index {
			if let Some(expression) = &options.where_expression {
				if expression.is_index_convertible(None) {
					self.ensure_index_for_expression(expression)?;
				}
			}
		}

		let id = {
			let mut state = self.shared.state.lock();
			state.gc.take();
			let id = state.next_subscriber_id;
			state.next_subscriber_id += 1;
			state.subscribers.push(Subscriber {
				id,
				callback: callback.clone(),
				filter: filter.clone(),
			});
			id
		};
		if let Err(cause) = self.start_sync_if_needed() {
			self.shared.state.lock().subscribers.retain(|s| s.id != id);
			return Err(cause);
		}

		if options.include_initial_state {
			let initial = self.current_state_as_changes(&options)?;
			if !initial.is_empty() {
				callback(&initial);
			}
		}

		Ok(ChangesSubscription {
			shared: Arc::downgrade(&self.shared),
			id,
		})
	}

	/// Subscribe to the change stream of a single key.
	pub fn subscribe_changes_key(
		&self,
		key: Key,
		callback: impl Fn(&[ChangeEvent]) + Send + Sync + 'static,
		include_initial_state: bool,
	) -> Result<ChangesSubscription> {
		let callback: SubscriberCallback = Arc::new(callback);
		let id = {
			let mut state = self.shared.state.lock();
			state.gc.take();
			let id = state.next_subscriber_id;
			state.next_subscriber_id += 1;
			state.key_subscribers.push(KeySubscriber {
				id,
				key: key.clone(),
				callback: callback.clone(),
			});
			id
		};
		if let Err(cause) = self.start_sync_if_needed() {
			self.shared.state.lock().key_subscribers.retain(|s| s.id != id);
			return Err(cause);
		}

		if include_initial_state {
			if let Some(row) = self.get(&key) {
				callback(&[ChangeEvent::insert(key, row)]);
			}
		}

		Ok(ChangesSubscription {
			shared: Arc::downgrade(&self.shared),
			id,
		})
	}

	/// The visible state as insert events, filtered. Index-convertible
	/// expressions are answered from indexes when they are resolved;
	/// anything else falls back to a full scan.
	pub fn current_state_as_changes(&self, options: &SubscribeOptions) -> Result<Vec<ChangeEvent>> {
		let mut state = self.shared.state.lock();

		if let Some(expression) = &options.where_expression {
			if expression.is_index_convertible(None) {
				if let Some(keys) = crate::collection::index_match(&state, expression) {
					state.scan_stats.index_lookups += 1;
					let events = keys
						.into_iter()
						.filter_map(|key| {
							state.visible_get(&key)
								.map(|row| ChangeEvent::insert(key.clone(), row.clone()))
						})
						.collect();
					return Ok(events);
				}
			}
			state.scan_stats.full_scans += 1;
			let filter = EventFilter::Expression(Arc::new(expression.clone()));
			return Ok(state
				.visible_entries()
				.into_iter()
				.filter(|(_, row)| filter.matches(row))
				.map(|(key, row)| ChangeEvent::insert(key, row))
				.collect());
		}

		if let Some(predicate) = &options.where_predicate {
			state.scan_stats.full_scans += 1;
			return Ok(state
				.visible_entries()
				.into_iter()
				.filter(|(_, row)| predicate(row))
				.map(|(key, row)| ChangeEvent::insert(key, row))
				.collect());
		}

		Ok(state
			.visible_entries()
			.into_iter()
			.map(|(key, row)| ChangeEvent::insert(key, row))
			.collect())
	}
}
