// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_collection::SyncOp;
use riffle_core::expression::dsl::*;
use riffle_flow::{QueryBuilder, SelectEntry, live_query_named};
use riffle_testing::row;
use riffle_type::{Row, Value};

use crate::{seed, source};

fn users() -> Vec<Row> {
	vec![
		row! { "id" => 1, "name" => "ada" },
		row! { "id" => 2, "name" => "grace" },
	]
}

fn posts() -> Vec<Row> {
	vec![
		row! { "id" => 10, "user_id" => 1, "title" => "alpha" },
		row! { "id" => 11, "user_id" => 1, "title" => "beta" },
		row! { "id" => 12, "user_id" => 3, "title" => "orphan" },
	]
}

fn find<'a>(rows: &'a [Row], field: &str, value: &Value) -> Option<&'a Row> {
	rows.iter().find(|row| row.get(field) == Some(value))
}

#[test]
fn test_inner_join_matches_on_equality() {
	let (users_c, users_sync, _wu) = source("join_inner_users");
	let (posts_c, posts_sync, _wp) = source("join_inner_posts");
	seed(&users_sync, users());
	seed(&posts_sync, posts());

	let query = QueryBuilder::from_collection("u", users_c.clone())
		.inner_join("p", posts_c.clone(), eq(col("u.id"), col("p.user_id")))
		.select([("name", col("u.name")), ("title", col("p.title"))])
		.build();
	let live = live_query_named("join_inner_live", query).unwrap();
	live.preload().unwrap();

	// Two posts match ada; the orphan post matches nobody.
	assert_eq!(live.size(), 2);
	let rows = live.values();
	assert!(find(&rows, "title", &Value::Text("alpha".into())).is_some());
	assert!(find(&rows, "title", &Value::Text("beta".into())).is_some());
	assert!(
		rows.iter().all(|row| row.get("name") == Some(&Value::Text("ada".into())))
	);
}

#[test]
fn test_inner_join_reacts_to_both_sides() {
	let (users_c, users_sync, _wu) = source("join_react_users");
	let (posts_c, posts_sync, _wp) = source("join_react_posts");
	seed(&users_sync, users());
	seed(&posts_sync, posts());

	let query = QueryBuilder::from_collection("u", users_c.clone())
		.inner_join("p", posts_c.clone(), eq(col("u.id"), col("p.user_id")))
		.select([("name", col("u.name")), ("title", col("p.title"))])
		.build();
	let live = live_query_named("join_react_live", query).unwrap();
	live.preload().unwrap();
	assert_eq!(live.size(), 2);

	// A user for the orphan post appears.
	seed(&users_sync, [row! { "id" => 3, "name" => "linus" }]);
	assert_eq!(live.size(), 3);

	// Re-keying a post moves it to another user.
	posts_sync
		.apply([SyncOp::update(row! { "id" => 11, "user_id" => 2, "title" => "beta" })])
		.unwrap();
	let rows = live.values();
	let beta = find(&rows, "title", &Value::Text("beta".into())).unwrap();
	assert_eq!(beta.get("name"), Some(&Value::Text("grace".into())));

	// Deleting a user removes its joined rows.
	users_sync.apply([SyncOp::delete(row! { "id" => 1, "name" => "ada" })]).unwrap();
	let rows = live.values();
	assert!(find(&rows, "title", &Value::Text("alpha".into())).is_none());
	assert_eq!(live.size(), 2);
}

#[test]
fn test_left_join_pads_unmatched_rows() {
	let (users_c, users_sync, _wu) = source("join_left_users");
	let (posts_c, posts_sync, _wp) = source("join_left_posts");
	seed(&users_sync, users());
	seed(&posts_sync, [row! { "id" => 10, "user_id" => 1, "title" => "alpha" }]);

	let query = QueryBuilder::from_collection("u", users_c.clone())
		.left_join("p", posts_c.clone(), eq(col("u.id"), col("p.user_id")))
		.select([("name", col("u.name")), ("title", col("p.title"))])
		.build();
	let live = live_query_named("join_left_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 2);
	let rows = live.values();
	let grace = find(&rows, "name", &Value::Text("grace".into())).unwrap();
	assert_eq!(grace.get("title"), Some(&Value::Undefined));

	// A matching post replaces the padded row.
	seed(&posts_sync, [row! { "id" => 13, "user_id" => 2, "title" => "gamma" }]);
	let rows = live.values();
	let grace = find(&rows, "name", &Value::Text("grace".into())).unwrap();
	assert_eq!(grace.get("title"), Some(&Value::Text("gamma".into())));
	assert_eq!(live.size(), 2);
}

#[test]
fn test_full_join_keeps_both_unmatched_sides() {
	let (users_c, users_sync, _wu) = source("join_full_users");
	let (posts_c, posts_sync, _wp) = source("join_full_posts");
	seed(&users_sync, [row! { "id" => 2, "name" => "grace" }]);
	seed(&posts_sync, [row! { "id" => 12, "user_id" => 3, "title" => "orphan" }]);

	let query = QueryBuilder::from_collection("u", users_c.clone())
		.full_join("p", posts_c.clone(), eq(col("u.id"), col("p.user_id")))
		.select([("name", col("u.name")), ("title", col("p.title"))])
		.build();
	let live = live_query_named("join_full_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 2);
	let rows = live.values();
	let grace = find(&rows, "name", &Value::Text("grace".into())).unwrap();
	assert_eq!(grace.get("title"), Some(&Value::Undefined));
	let orphan = find(&rows, "title", &Value::Text("orphan".into())).unwrap();
	assert_eq!(orphan.get("name"), Some(&Value::Undefined));
}

#[test]
fn test_cross_join_pairs_everything() {
	let (colors_c, colors_sync, _wc) = source("join_cross_colors");
	let (sizes_c, sizes_sync, _ws) = source("join_cross_sizes");
	seed(&colors_sync, [row! { "id" => "red" }, row! { "id" => "blue" }]);
	seed(&sizes_sync, [row! { "id" => "s" }, row! { "id" => "m" }, row! { "id" => "l" }]);

	let query = QueryBuilder::from_collection("c", colors_c.clone())
		.cross_join("s", sizes_c.clone())
		.select([("color", col("c.id")), ("size", col("s.id"))])
		.build();
	let live = live_query_named("join_cross_live", query).unwrap();
	live.preload().unwrap();

	assert_eq!(live.size(), 6);
}

#[test]
fn test_join_select_spread_splices_the_table() {
	let (users_c, users_sync, _wu) = source("join_spread_users");
	let (posts_c, posts_sync, _wp) = source("join_spread_posts");
	seed(&users_sync, [row! { "id" => 1, "name" => "ada" }]);
	seed(&posts_sync, [row! { "id" => 10, "user_id" => 1, "title" => "alpha" }]);

	let query = QueryBuilder::from_collection("u", users_c.clone())
		.inner_join("p", posts_c.clone(), eq(col("u.id"), col("p.user_id")))
		.select_entries(vec![
			SelectEntry::Spread("p".to_string()),
			SelectEntry::Field("author".to_string(), col("u.name")),
		])
		.build();
	let live = live_query_named("join_spread_live", query).unwrap();
	live.preload().unwrap();

	let out = live.values().pop().unwrap();
	assert_eq!(out.get("title"), Some(&Value::Text("alpha".into())));
	assert_eq!(out.get("user_id"), Some(&Value::Int(1)));
	assert_eq!(out.get("author"), Some(&Value::Text("ada".into())));
}
