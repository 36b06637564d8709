// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_collection::{DeleteConfig, Error, InsertConfig, SyncOp};
use riffle_core::ChangeType;
use riffle_testing::row;
use riffle_transaction::TransactionState;
use riffle_type::Key;

use crate::ready_people;

#[test]
fn test_delete_hides_the_row_immediately() {
	let (collection, _sync, events, _sub) = ready_people("delete_hides");
	collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	events.clear();

	let transaction = collection.delete("1", DeleteConfig::default()).unwrap();

	assert_eq!(transaction.state(), TransactionState::Completed);
	assert_eq!(collection.size(), 0);
	assert!(!collection.has(&Key::from("1")));

	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Delete);
	assert_eq!(batches[0][0].value, row! { "id" => "1", "n" => "a" });
}

#[test]
fn test_delete_unknown_key_fails() {
	let (collection, _sync, _events, _sub) = ready_people("delete_unknown");
	let err = collection.delete("missing", DeleteConfig::default()).unwrap_err();
	assert!(matches!(err, Error::UnknownKey { .. }));
}

#[test]
fn test_delete_empty_key_list_fails() {
	let (collection, _sync, _events, _sub) = ready_people("delete_empty");
	let err = collection.delete_many(vec![], DeleteConfig::default()).unwrap_err();
	assert!(matches!(err, Error::EmptyKeyList));
}

#[test]
fn test_delete_mutation_carries_the_removed_row() {
	let (collection, _sync, _events, _sub) = ready_people("delete_mutation");
	collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();

	let transaction = collection.delete("1", DeleteConfig::default()).unwrap();
	let mutations = transaction.mutations();
	assert_eq!(mutations.len(), 1);
	assert_eq!(mutations[0].original, Some(row! { "id" => "1", "n" => "a" }));
	assert_eq!(mutations[0].modified, row! { "id" => "1", "n" => "a" });
}

#[test]
fn test_delete_confirmed_by_sync_is_silent() {
	let (collection, sync, events, _sub) = ready_people("delete_confirmed");
	sync.apply([SyncOp::insert(row! { "id" => "1", "n" => "a" })]).unwrap();
	collection.delete("1", DeleteConfig::default()).unwrap();
	let batches_before = events.batch_count();

	// The authority confirms the delete; nothing visibly changes.
	sync.apply([SyncOp::delete(row! { "id" => "1", "n" => "a" })]).unwrap();

	assert_eq!(events.batch_count(), batches_before);
	assert_eq!(collection.size(), 0);
}
