// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeMap;

use riffle_collection::{DeleteConfig, InsertConfig, SubscribeOptions, SyncOp, UpdateConfig};
use riffle_core::{ChangeType, expression::dsl::*};
use riffle_testing::{CapturedEvents, row};
use riffle_type::{Key, Row};

use crate::{people, ready_people, seed_ages};

#[test]
fn test_subscribe_with_initial_state() {
	let (collection, sync) = people("sub_initial");
	let warmup = collection.subscribe_changes(|_| {}, SubscribeOptions::default()).unwrap();
	sync.apply([
		SyncOp::insert(row! { "id" => "1", "n" => "a" }),
		SyncOp::insert(row! { "id" => "2", "n" => "b" }),
	])
	.unwrap();
	drop(warmup);

	let events = CapturedEvents::new();
	let _sub = collection
		.subscribe_changes(events.callback(), SubscribeOptions::default().with_initial_state())
		.unwrap();

	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].len(), 2);
	assert!(batches[0].iter().all(|e| e.change_type == ChangeType::Insert));
}

#[test]
fn test_filtered_subscription_translates_boundary_crossings() {
	let (collection, sync, _all, _sub_all) = ready_people("sub_filtered");
	seed_ages(&sync);

	let adults = CapturedEvents::new();
	let _sub = collection
		.subscribe_changes(
			adults.callback(),
			SubscribeOptions::default().with_where_expression(gte(col("age"), lit(30))),
		)
		.unwrap();

	// bob (28) enters the filter: delivered as an insert.
	collection.update("bob", UpdateConfig::default(), |draft| draft.set("age", 31)).unwrap();
	// charlie (30) leaves the filter: delivered as a delete.
	collection.update("charlie", UpdateConfig::default(), |draft| draft.set("age", 29)).unwrap();
	// diana stays inside: a plain update.
	collection.update("diana", UpdateConfig::default(), |draft| draft.set("age", 36)).unwrap();
	// alice stays outside: invisible.
	collection.update("alice", UpdateConfig::default(), |draft| draft.set("age", 23)).unwrap();

	let batches = adults.batches();
	assert_eq!(batches.len(), 3);
	assert_eq!(batches[0][0].change_type, ChangeType::Insert);
	assert_eq!(batches[0][0].key, Key::from("bob"));
	assert_eq!(batches[1][0].change_type, ChangeType::Delete);
	assert_eq!(batches[1][0].key, Key::from("charlie"));
	assert_eq!(batches[2][0].change_type, ChangeType::Update);
	assert_eq!(batches[2][0].key, Key::from("diana"));
}

#[test]
fn test_key_subscription_receives_only_its_slice() {
	let (collection, _sync, _all, _sub_all) = ready_people("sub_key");
	let watched = CapturedEvents::new();
	let _sub = collection
		.subscribe_changes_key(Key::from("1"), watched.callback(), false)
		.unwrap();

	collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	collection.insert(row! { "id" => "2", "n" => "b" }, InsertConfig::default()).unwrap();
	collection.update("1", UpdateConfig::default(), |draft| draft.set("n", "c")).unwrap();

	let events = watched.events();
	assert_eq!(events.len(), 2);
	assert!(events.iter().all(|e| e.key == Key::from("1")));
}

#[test]
fn test_unsubscribe_stops_delivery() {
	let (collection, _sync, _all, _sub_all) = ready_people("sub_unsub");
	let events = CapturedEvents::new();
	let subscription =
		collection.subscribe_changes(events.callback(), SubscribeOptions::default()).unwrap();

	collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	assert_eq!(events.batch_count(), 1);

	subscription.unsubscribe();
	collection.insert(row! { "id" => "2", "n" => "b" }, InsertConfig::default()).unwrap();
	assert_eq!(events.batch_count(), 1);
}

// Within one sync batch, a key never appears twice.
#[test]
fn test_one_event_per_key_per_batch() {
	let (collection, sync, events, _sub) = ready_people("sub_one_per_key");

	sync.begin().unwrap();
	sync.write(SyncOp::insert(row! { "id" => "1", "n" => "a" })).unwrap();
	sync.write(SyncOp::update(row! { "id" => "1", "n" => "b" })).unwrap();
	sync.commit().unwrap();

	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Insert);
	assert_eq!(batches[0][0].value, row! { "id" => "1", "n" => "b" });
	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "n" => "b" }));
}

// Round-trip law: replaying every emitted event over an empty map yields
// exactly the final visible state.
#[test]
fn test_event_stream_replays_to_final_state() {
	let (collection, sync, events, _sub) = ready_people("sub_round_trip");

	sync.apply([
		SyncOp::insert(row! { "id" => "1", "n" => "a" }),
		SyncOp::insert(row! { "id" => "2", "n" => "b" }),
	])
	.unwrap();
	collection.insert(row! { "id" => "3", "n" => "c" }, InsertConfig::default()).unwrap();
	collection.update("2", UpdateConfig::default(), |draft| draft.set("n", "b2")).unwrap();
	sync.begin().unwrap();
	sync.write(SyncOp::update(row! { "id" => "2", "n" => "b2" })).unwrap();
	sync.write(SyncOp::insert(row! { "id" => "3", "n" => "c" })).unwrap();
	sync.write(SyncOp::delete(row! { "id" => "1", "n" => "a" })).unwrap();
	sync.commit().unwrap();
	collection.delete("2", DeleteConfig::default()).unwrap();

	let mut replayed: BTreeMap<Key, Row> = BTreeMap::new();
	for event in events.events() {
		match event.change_type {
			ChangeType::Insert | ChangeType::Update => {
				replayed.insert(event.key.clone(), event.value.clone());
			}
			ChangeType::Delete => {
				replayed.remove(&event.key);
			}
		}
	}
	assert_eq!(replayed, collection.state());
}
