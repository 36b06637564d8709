// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_core::expression::dsl::*;
use riffle_flow::{QueryBuilder, live_query_named};
use riffle_testing::row;
use riffle_type::{Key, Value};

use crate::{seed, source};

// Scenario S4: group by d, select {d, s: sum(v)}, having s > 20.
#[test]
fn test_group_by_with_sum_and_having() {
	let (events, sync, _warmup) = source("grp_s4");
	seed(&sync, [
		row! { "id" => 1, "d" => 1, "v" => 10 },
		row! { "id" => 2, "d" => 1, "v" => 30 },
		row! { "id" => 3, "d" => 2, "v" => 5 },
	]);

	let query = QueryBuilder::from_collection("e", events.clone())
		.group_by(col("e.d"))
		.select([("d", col("e.d")), ("s", sum(col("e.v")))])
		.having(gt(col("s"), lit(20)))
		.build();
	let live = live_query_named("grp_s4_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 1);
	let group = live.get(&Key::from("1")).expect("group d=1 present");
	assert_eq!(group.get("d"), Some(&Value::Int(1)));
	assert_eq!(group.get("s"), Some(&Value::Int(40)));
}

#[test]
fn test_groups_recompute_incrementally() {
	let (events, sync, _warmup) = source("grp_incremental");
	seed(&sync, [
		row! { "id" => 1, "d" => 1, "v" => 10 },
		row! { "id" => 2, "d" => 2, "v" => 7 },
	]);

	let query = QueryBuilder::from_collection("e", events.clone())
		.group_by(col("e.d"))
		.select([("d", col("e.d")), ("s", sum(col("e.v")))])
		.build();
	let live = live_query_named("grp_incremental_live", query).unwrap();
	live.preload().unwrap();
	assert_eq!(live.get(&Key::from("1")).unwrap().get("s"), Some(&Value::Int(10)));

	// A row moves from group 1 to group 2.
	sync.apply([riffle_collection::SyncOp::update(row! { "id" => 1, "d" => 2, "v" => 10 })])
		.unwrap();

	assert!(live.get(&Key::from("1")).is_none());
	assert_eq!(live.get(&Key::from("2")).unwrap().get("s"), Some(&Value::Int(17)));

	// The last member leaving removes the group.
	sync.apply([riffle_collection::SyncOp::delete(row! { "id" => 2, "d" => 2, "v" => 7 })])
		.unwrap();
	assert_eq!(live.get(&Key::from("2")).unwrap().get("s"), Some(&Value::Int(10)));
}

#[test]
fn test_aggregates_without_group_by_form_a_single_group() {
	let (events, sync, _warmup) = source("grp_implicit");
	seed(&sync, [
		row! { "id" => 1, "v" => 4 },
		row! { "id" => 2, "v" => 6 },
		row! { "id" => 3, "v" => 11 },
	]);

	let query = QueryBuilder::from_collection("e", events.clone())
		.select([
			("n", count()),
			("total", sum(col("e.v"))),
			("mean", avg(col("e.v"))),
			("lo", min(col("e.v"))),
			("hi", max(col("e.v"))),
		])
		.build();
	let live = live_query_named("grp_implicit_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 1);
	let totals = live.values().pop().unwrap();
	assert_eq!(totals.get("n"), Some(&Value::Int(3)));
	assert_eq!(totals.get("total"), Some(&Value::Int(21)));
	assert_eq!(totals.get("mean"), Some(&Value::float(7.0)));
	assert_eq!(totals.get("lo"), Some(&Value::Int(4)));
	assert_eq!(totals.get("hi"), Some(&Value::Int(11)));
}

#[test]
fn test_median_and_mode_aggregates() {
	let (events, sync, _warmup) = source("grp_median");
	seed(&sync, [
		row! { "id" => 1, "v" => 1 },
		row! { "id" => 2, "v" => 9 },
		row! { "id" => 3, "v" => 9 },
		row! { "id" => 4, "v" => 3 },
	]);

	let query = QueryBuilder::from_collection("e", events.clone())
		.select([("mid", median(col("e.v"))), ("common", mode(col("e.v")))])
		.build();
	let live = live_query_named("grp_median_live", query).unwrap();
	live.preload().unwrap();

	let out = live.values().pop().unwrap();
	assert_eq!(out.get("mid"), Some(&Value::float(6.0)));
	assert_eq!(out.get("common"), Some(&Value::Int(9)));
}
