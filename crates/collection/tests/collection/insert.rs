// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::Arc;

use riffle_collection::{
	Collection, CollectionConfig, Error, InsertConfig, Schema, SchemaIssue, SubscribeOptions,
};
use riffle_core::ChangeType;
use riffle_testing::{CapturedEvents, ScriptedSync, row};
use riffle_transaction::{Transaction, TransactionConfig, TransactionState};
use riffle_type::{Key, Value};

use crate::ready_people;

#[test]
fn test_insert_is_visible_before_commit_returns() {
	let (collection, _sync, events, _sub) = ready_people("insert_visible");

	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();

	assert_eq!(collection.size(), 1);
	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "n" => "a" }));
	assert_eq!(transaction.state(), TransactionState::Completed);

	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Insert);
	assert_eq!(batches[0][0].key, Key::from("1"));
}

#[test]
fn test_insert_duplicate_key_fails() {
	let (collection, _sync, _events, _sub) = ready_people("insert_duplicate");
	collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();

	let err = collection.insert(row! { "id" => "1", "n" => "b" }, InsertConfig::default()).unwrap_err();
	assert!(matches!(err, Error::DuplicateKey { .. }));
	assert_eq!(collection.size(), 1);
}

#[test]
fn test_insert_without_handler_or_transaction_fails() {
	let sync = ScriptedSync::new();
	let collection = Collection::new(CollectionConfig::keyed_by("insert_no_handler", sync, "id"));

	let err = collection.insert(row! { "id" => "1" }, InsertConfig::default()).unwrap_err();
	assert!(matches!(err, Error::MissingHandler { handler: "on_insert" }));
}

#[test]
fn test_insert_attaches_to_ambient_transaction() {
	let (collection, _sync, events, _sub) = ready_people("insert_ambient");

	let transaction = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	transaction
		.mutate(|| {
			let attached = collection
				.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default())
				.unwrap();
			assert_eq!(attached.id(), transaction.id());
		})
		.unwrap();

	// Optimistically visible while the transaction is still pending.
	assert_eq!(transaction.state(), TransactionState::Pending);
	assert!(collection.has(&Key::from("1")));
	assert_eq!(events.batch_count(), 1);

	transaction.commit().unwrap();
	assert_eq!(transaction.state(), TransactionState::Completed);
	assert!(collection.has(&Key::from("1")));
}

#[test]
fn test_non_optimistic_insert_stays_invisible() {
	let (collection, _sync, events, _sub) = ready_people("insert_non_optimistic");

	let config = InsertConfig {
		optimistic: Some(false),
		..Default::default()
	};
	collection.insert(row! { "id" => "1", "n" => "a" }, config).unwrap();

	assert_eq!(collection.size(), 0);
	assert!(events.is_empty());
}

#[test]
fn test_insert_handler_failure_rolls_back() {
	let sync = ScriptedSync::new();
	let config = CollectionConfig::keyed_by("insert_rollback", sync.clone(), "id")
		.on_insert(|_| Err("server rejected".into()));
	let collection = Collection::new(config);
	let events = CapturedEvents::new();
	let _sub = collection.subscribe_changes(events.callback(), SubscribeOptions::default()).unwrap();
	sync.mark_ready().unwrap();

	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();

	assert_eq!(transaction.state(), TransactionState::Failed);
	assert!(transaction.wait_persisted().is_err());
	assert_eq!(collection.size(), 0);
	assert!(!collection.has(&Key::from("1")));

	// The optimistic insert flashed and was retracted.
	let batches = events.batches();
	assert_eq!(batches.len(), 2);
	assert_eq!(batches[0][0].change_type, ChangeType::Insert);
	assert_eq!(batches[1][0].change_type, ChangeType::Delete);
}

#[test]
fn test_insert_validates_against_schema() {
	struct RequiresAge;

	impl Schema for RequiresAge {
		fn validate(&self, row: &riffle_type::Row) -> Result<riffle_type::Row, Vec<SchemaIssue>> {
			match row.get("age") {
				Some(Value::Int(_)) => Ok(row.clone()),
				_ => Err(vec![SchemaIssue::at("age must be an integer", ["age"])]),
			}
		}
	}

	let sync = ScriptedSync::new();
	let config = CollectionConfig::keyed_by("insert_schema", sync, "id")
		.with_schema(Arc::new(RequiresAge))
		.on_insert(|_| Ok(()));
	let collection = Collection::new(config);

	let err = collection.insert(row! { "id" => "1" }, InsertConfig::default()).unwrap_err();
	match err {
		Error::SchemaValidation {
			operation,
			issues,
		} => {
			assert_eq!(operation, "insert");
			assert_eq!(issues.len(), 1);
			assert_eq!(issues[0].path.as_deref(), Some(&["age".to_string()][..]));
		}
		other => panic!("expected schema validation error, got {other}"),
	}

	collection.insert(row! { "id" => "1", "age" => 30 }, InsertConfig::default()).unwrap();
	assert_eq!(collection.size(), 1);
}

#[test]
fn test_insert_requires_derivable_key() {
	let (collection, _sync, _events, _sub) = ready_people("insert_missing_key");
	let err = collection.insert(row! { "n" => "keyless" }, InsertConfig::default()).unwrap_err();
	assert!(matches!(err, Error::MissingKey));
}

#[test]
fn test_insert_many_rejects_duplicate_within_batch() {
	let (collection, _sync, _events, _sub) = ready_people("insert_many_dup");
	let err = collection
		.insert_many(
			vec![row! { "id" => "1", "n" => "a" }, row! { "id" => "1", "n" => "b" }],
			InsertConfig::default(),
		)
		.unwrap_err();
	assert!(matches!(err, Error::DuplicateKey { .. }));
	assert_eq!(collection.size(), 0);
}

#[test]
fn test_insert_changes_project_user_fields() {
	let (collection, _sync, _events, _sub) = ready_people("insert_changes");
	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	let mutations = transaction.mutations();
	assert_eq!(mutations.len(), 1);
	assert_eq!(mutations[0].changes, row! { "id" => "1", "n" => "a" });
	assert_eq!(mutations[0].modified, row! { "id" => "1", "n" => "a" });
	assert!(mutations[0].original.is_none());
}
