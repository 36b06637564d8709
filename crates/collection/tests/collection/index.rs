// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::collections::BTreeSet;

use riffle_collection::{DeleteConfig, InsertConfig, SubscribeOptions, SyncOp, UpdateConfig};
use riffle_core::expression::dsl::*;
use riffle_testing::row;
use riffle_type::Key;

use crate::{ready_people, seed_ages};

fn result_keys(events: &[riffle_core::ChangeEvent]) -> BTreeSet<Key> {
	events.iter().map(|e| e.key.clone()).collect()
}

// Scenario S3: a range predicate over an indexed column is answered from
// the index, not a scan.
#[test]
fn test_range_predicate_uses_the_index() {
	let (collection, sync, _events, _sub) = ready_people("index_range");
	seed_ages(&sync);

	collection.create_index(col("age"), Some("by_age".into())).unwrap();
	assert!(collection.index_by_name("by_age").is_some());

	let options = SubscribeOptions::default().with_where_expression(gte(col("age"), lit(28)));
	let changes = collection.current_state_as_changes(&options).unwrap();

	assert_eq!(
		result_keys(&changes),
		BTreeSet::from([Key::from("bob"), Key::from("charlie"), Key::from("diana")])
	);
	let stats = collection.scan_stats();
	assert_eq!(stats.index_lookups, 1);
	assert_eq!(stats.full_scans, 0);
}

#[test]
fn test_unindexed_predicate_falls_back_to_scan() {
	let (collection, sync, _events, _sub) = ready_people("index_fallback");
	seed_ages(&sync);

	let options = SubscribeOptions::default().with_where_expression(gte(col("age"), lit(28)));
	let changes = collection.current_state_as_changes(&options).unwrap();

	assert_eq!(changes.len(), 3);
	let stats = collection.scan_stats();
	assert_eq!(stats.index_lookups, 0);
	assert_eq!(stats.full_scans, 1);
}

#[test]
fn test_filtered_subscription_auto_creates_an_index() {
	let (collection, sync, _events, _sub) = ready_people("index_auto");
	seed_ages(&sync);
	assert_eq!(collection.index_count(), 0);

	let _filtered = collection
		.subscribe_changes(
			|_| {},
			SubscribeOptions::default().with_where_expression(eq(col("age"), lit(30))),
		)
		.unwrap();

	assert_eq!(collection.index_count(), 1);

	let options = SubscribeOptions::default().with_where_expression(eq(col("age"), lit(30)));
	let changes = collection.current_state_as_changes(&options).unwrap();
	assert_eq!(result_keys(&changes), BTreeSet::from([Key::from("charlie")]));
	assert_eq!(collection.scan_stats().full_scans, 0);
}

// Property: index answers always agree with a fresh scan of the visible
// state, across optimistic and synced mutations.
#[test]
fn test_index_agrees_with_scan_after_mutations() {
	let (collection, sync, _events, _sub) = ready_people("index_consistency");
	seed_ages(&sync);
	collection.create_index(col("age"), None).unwrap();

	collection.insert(row! { "id" => "frank", "age" => 33 }, InsertConfig::default()).unwrap();
	collection.update("bob", UpdateConfig::default(), |draft| draft.set("age", 41)).unwrap();
	collection.delete("eve", DeleteConfig::default()).unwrap();
	sync.apply([
		SyncOp::update(row! { "id" => "alice", "age" => 29 }),
		SyncOp::delete(row! { "id" => "diana", "age" => 35 }),
	])
	.unwrap();

	for expression in [
		gte(col("age"), lit(29)),
		lt(col("age"), lit(30)),
		and(gt(col("age"), lit(25)), lte(col("age"), lit(41))),
		in_list(col("age"), [lit(29), lit(33)]),
		or(eq(col("age"), lit(41)), eq(col("age"), lit(30))),
	] {
		let indexed = collection
			.current_state_as_changes(
				&SubscribeOptions::default().with_where_expression(expression.clone()),
			)
			.unwrap();
		let scanned: BTreeSet<Key> = collection
			.entries()
			.into_iter()
			.filter(|(_, row)| {
				riffle_core::expression::evaluate(&expression, row)
					.map(|v| v.is_truthy())
					.unwrap_or(false)
			})
			.map(|(key, _)| key)
			.collect();
		assert_eq!(result_keys(&indexed), scanned);
	}
	assert_eq!(collection.scan_stats().full_scans, 0);
}
