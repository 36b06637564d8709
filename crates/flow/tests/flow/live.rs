// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_collection::{InsertConfig, SubscribeOptions, SyncOp, UpdateConfig};
use riffle_core::{ChangeType, expression::dsl::*};
use riffle_flow::{QueryBuilder, live_query_named};
use riffle_testing::{CapturedEvents, row};
use riffle_type::{Key, Value};

use crate::{seed, source};

#[test]
fn test_live_query_tracks_upstream_changes() {
	let (people, sync, _warmup) = source("live_track");
	seed(&sync, [
		row! { "id" => "a", "age" => 20 },
		row! { "id" => "b", "age" => 40 },
	]);

	let query = QueryBuilder::from_collection("p", people.clone())
		.where_(gte(col("p.age"), lit(30)))
		.build();
	let live = live_query_named("live_track_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 1);
	assert!(live.get(&Key::from("b")).is_some());

	// Crossing into the filter inserts; crossing out deletes.
	sync.apply([SyncOp::update(row! { "id" => "a", "age" => 31 })]).unwrap();
	assert!(live.get(&Key::from("a")).is_some());
	sync.apply([SyncOp::update(row! { "id" => "b", "age" => 29 })]).unwrap();
	assert!(live.get(&Key::from("b")).is_none());
	assert_eq!(live.size(), 1);
}

#[test]
fn test_live_query_emits_change_events() {
	let (people, sync, _warmup) = source("live_events");
	let query = QueryBuilder::from_collection("p", people.clone())
		.where_(gte(col("p.age"), lit(30)))
		.build();
	let live = live_query_named("live_events_live", query).unwrap();
	let captured = CapturedEvents::new();
	let _sub = live.subscribe_changes(captured.callback(), SubscribeOptions::default()).unwrap();
	live.preload().unwrap();

	seed(&sync, [row! { "id" => "a", "age" => 50 }]);

	let events = captured.events();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].change_type, ChangeType::Insert);
	assert_eq!(events[0].value.get("age"), Some(&Value::Int(50)));
}

#[test]
fn test_optimistic_mutations_flow_into_live_queries() {
	let (people, _sync, _warmup) = source("live_optimistic");
	let query = QueryBuilder::from_collection("p", people.clone())
		.where_(gte(col("p.age"), lit(18)))
		.build();
	let live = live_query_named("live_optimistic_live", query).unwrap();
	live.preload().unwrap();

	// An optimistic insert on the source is immediately visible here.
	people.insert(row! { "id" => "x", "age" => 44 }, InsertConfig::default()).unwrap();
	assert!(live.get(&Key::from("x")).is_some());

	people.update("x", UpdateConfig::default(), |draft| draft.set("age", 12)).unwrap();
	assert!(live.get(&Key::from("x")).is_none());
}

#[test]
fn test_live_query_over_a_live_query() {
	let (people, sync, _warmup) = source("live_chain");
	seed(&sync, [
		row! { "id" => "a", "age" => 20, "name" => "ada" },
		row! { "id" => "b", "age" => 40, "name" => "bert" },
		row! { "id" => "c", "age" => 50, "name" => "cleo" },
	]);

	let adults = live_query_named(
		"live_chain_adults",
		QueryBuilder::from_collection("p", people.clone())
			.where_(gte(col("p.age"), lit(30)))
			.build(),
	)
	.unwrap();

	let names = live_query_named(
		"live_chain_names",
		QueryBuilder::from_collection("a", adults.clone())
			.select([("name", col("a.name"))])
			.build(),
	)
	.unwrap();
	names.preload().unwrap();

	assert_eq!(names.size(), 2);

	seed(&sync, [row! { "id" => "d", "age" => 60, "name" => "dara" }]);
	assert_eq!(names.size(), 3);
	let all: Vec<String> = names
		.values()
		.iter()
		.filter_map(|row| row.get("name").and_then(|v| v.as_text()).map(str::to_string))
		.collect();
	assert!(all.contains(&"dara".to_string()));
}

// The optimizer's collection WHERE clauses make the upstream subscription
// index-backed: no full scan happens for the initial load.
#[test]
fn test_live_query_initial_load_uses_upstream_indexes() {
	let (people, sync, _warmup) = source("live_indexed");
	seed(&sync, [
		row! { "id" => "a", "age" => 20 },
		row! { "id" => "b", "age" => 40 },
		row! { "id" => "c", "age" => 45 },
	]);

	let query = QueryBuilder::from_collection("p", people.clone())
		.where_(gte(col("p.age"), lit(30)))
		.build();
	let live = live_query_named("live_indexed_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 2);
	let stats = people.scan_stats();
	assert_eq!(stats.full_scans, 0);
	assert!(stats.index_lookups >= 1);
	assert!(people.index_count() >= 1);
}
