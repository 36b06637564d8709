// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::thread;

use crossbeam_channel::bounded;
use riffle_collection::{
	Collection, CollectionConfig, Error, InsertConfig, RowUpdateMode, SubscribeOptions, SyncOp,
};
use riffle_core::ChangeType;
use riffle_testing::{CapturedEvents, ScriptedSync, row};
use riffle_transaction::TransactionState;
use riffle_type::Key;

use crate::ready_people;

#[test]
fn test_sync_insert_emits_and_becomes_authoritative() {
	let (collection, sync, events, _sub) = ready_people("sync_insert");

	sync.apply([SyncOp::insert(row! { "id" => "1", "n" => "a" })]).unwrap();

	assert_eq!(collection.size(), 1);
	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "n" => "a" }));
	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Insert);
}

// Scenario S1: a completed optimistic insert echoed back by sync must not
// produce a second event.
#[test]
fn test_optimistic_insert_echoed_by_sync_is_suppressed() {
	let (collection, sync, events, _sub) = ready_people("sync_echo");

	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	assert_eq!(transaction.state(), TransactionState::Completed);
	assert_eq!(events.batch_count(), 1);
	assert_eq!(collection.size(), 1);

	sync.apply([SyncOp::insert(row! { "id" => "1", "n" => "a" })]).unwrap();

	// Redundant echo: no further events, same visible state.
	assert_eq!(events.batch_count(), 1);
	assert_eq!(collection.size(), 1);
	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "n" => "a" }));

	// Sync is now authoritative for the row.
	sync.apply([SyncOp::delete(row! { "id" => "1", "n" => "a" })]).unwrap();
	assert_eq!(collection.size(), 0);
}

// Scenario S6: partial row update mode merges over the stored synced row.
#[test]
fn test_partial_row_update_mode_merges() {
	let sync = ScriptedSync::with_row_update_mode(RowUpdateMode::Partial);
	let collection = Collection::new(CollectionConfig::keyed_by("sync_partial", sync.clone(), "id"));
	let events = CapturedEvents::new();
	let _sub = collection.subscribe_changes(events.callback(), SubscribeOptions::default()).unwrap();

	sync.apply([SyncOp::insert(row! { "id" => "1", "a" => 1, "b" => 2 })]).unwrap();
	events.clear();

	sync.apply([SyncOp::update(row! { "id" => "1", "b" => 3 })]).unwrap();

	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "a" => 1, "b" => 3 }));
	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Update);
	assert_eq!(batches[0][0].previous, Some(row! { "id" => "1", "a" => 1, "b" => 2 }));
	assert_eq!(batches[0][0].value, row! { "id" => "1", "a" => 1, "b" => 3 });
}

#[test]
fn test_full_row_update_mode_replaces() {
	let sync = ScriptedSync::with_row_update_mode(RowUpdateMode::Full);
	let collection = Collection::new(CollectionConfig::keyed_by("sync_full", sync.clone(), "id"));
	let _sub = collection.subscribe_changes(|_| {}, SubscribeOptions::default()).unwrap();

	sync.apply([SyncOp::insert(row! { "id" => "1", "a" => 1, "b" => 2 })]).unwrap();
	sync.apply([SyncOp::update(row! { "id" => "1", "b" => 3 })]).unwrap();

	assert_eq!(collection.get(&Key::from("1")), Some(row! { "id" => "1", "b" => 3 }));
}

#[test]
fn test_sync_protocol_violations() {
	let (_collection, sync, _events, _sub) = ready_people("sync_protocol");

	assert!(matches!(
		sync.write(SyncOp::insert(row! { "id" => "1" })),
		Err(Error::SyncWriteWithoutBegin)
	));
	assert!(matches!(sync.commit(), Err(Error::SyncCommitWithoutBegin)));

	sync.begin().unwrap();
	assert!(matches!(sync.begin(), Err(Error::SyncTransactionInProgress)));
	sync.commit().unwrap();
	assert!(matches!(sync.commit(), Err(Error::SyncCommitWithoutBegin)));
}

// Overlay events produced while a sync transaction is open are flushed
// with the commit as one batch; no subscriber sees two deliveries.
#[test]
fn test_events_batch_during_open_sync_transaction() {
	let (collection, sync, events, _sub) = ready_people("sync_batching");

	sync.begin().unwrap();
	sync.write(SyncOp::insert(row! { "id" => "s", "n" => "from-sync" })).unwrap();

	collection.insert(row! { "id" => "u", "n" => "from-user" }, InsertConfig::default()).unwrap();
	// Batched until the sync commit.
	assert!(events.is_empty());
	assert!(collection.has(&Key::from("u")));

	// The server echoes the user row within the same transaction.
	sync.write(SyncOp::insert(row! { "id" => "u", "n" => "from-user" })).unwrap();
	sync.commit().unwrap();

	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	let keys: Vec<&Key> = batches[0].iter().map(|e| &e.key).collect();
	assert_eq!(batches[0].len(), 2);
	assert!(keys.contains(&&Key::from("s")));
	assert!(keys.contains(&&Key::from("u")));
}

// Sync commits hold off while a transaction is persisting and apply once
// it settles.
#[test]
fn test_sync_commit_defers_until_persisting_transactions_settle() {
	let (entered_tx, entered_rx) = bounded::<()>(1);
	let (release_tx, release_rx) = bounded::<()>(1);

	let sync = ScriptedSync::new();
	let config = CollectionConfig::keyed_by("sync_deferred", sync.clone(), "id").on_insert(move |_| {
		entered_tx.send(()).unwrap();
		release_rx.recv().unwrap();
		Ok(())
	});
	let collection = Collection::new(config);
	let _sub = collection.subscribe_changes(|_| {}, SubscribeOptions::default()).unwrap();
	sync.mark_ready().unwrap();

	let worker = {
		let collection = collection.clone();
		thread::spawn(move || {
			collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap()
		})
	};

	entered_rx.recv().unwrap();
	// The handler is mid-flight: the transaction is persisting.
	sync.begin().unwrap();
	sync.write(SyncOp::insert(row! { "id" => "1", "n" => "a" })).unwrap();
	sync.write(SyncOp::insert(row! { "id" => "2", "n" => "b" })).unwrap();
	sync.commit().unwrap();

	// Deferred: the commit has not been applied yet.
	assert!(!collection.has(&Key::from("2")));

	release_tx.send(()).unwrap();
	let transaction = worker.join().unwrap();
	transaction.wait_persisted().unwrap();

	// Settling the transaction applied the deferred commit.
	assert!(collection.has(&Key::from("1")));
	assert!(collection.has(&Key::from("2")));
	assert_eq!(collection.size(), 2);
}

#[test]
fn test_truncate_drops_rows_not_rewritten() {
	let (collection, sync, events, _sub) = ready_people("sync_truncate");
	sync.apply([
		SyncOp::insert(row! { "id" => "1", "n" => "a" }),
		SyncOp::insert(row! { "id" => "2", "n" => "b" }),
	])
	.unwrap();
	events.clear();

	sync.begin().unwrap();
	sync.write(SyncOp::Truncate).unwrap();
	sync.write(SyncOp::insert(row! { "id" => "2", "n" => "b" })).unwrap();
	sync.commit().unwrap();

	assert_eq!(collection.size(), 1);
	assert!(!collection.has(&Key::from("1")));
	assert!(collection.has(&Key::from("2")));

	// One delete for the dropped row, nothing for the rewritten one.
	let batches = events.batches();
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].len(), 1);
	assert_eq!(batches[0][0].change_type, ChangeType::Delete);
	assert_eq!(batches[0][0].key, Key::from("1"));
}

// Size identity: cached size equals the visible entry count after every
// kind of operation.
#[test]
fn test_size_matches_visible_entries_throughout() {
	let (collection, sync, _events, _sub) = ready_people("sync_size_identity");

	sync.apply([
		SyncOp::insert(row! { "id" => "1", "n" => "a" }),
		SyncOp::insert(row! { "id" => "2", "n" => "b" }),
	])
	.unwrap();
	assert_eq!(collection.size(), collection.entries().len());

	collection.insert(row! { "id" => "3", "n" => "c" }, InsertConfig::default()).unwrap();
	assert_eq!(collection.size(), collection.entries().len());

	collection.delete("1", riffle_collection::DeleteConfig::default()).unwrap();
	assert_eq!(collection.size(), collection.entries().len());
	assert_eq!(collection.size(), 2);

	sync.apply([SyncOp::delete(row! { "id" => "1", "n" => "a" })]).unwrap();
	sync.apply([SyncOp::insert(row! { "id" => "3", "n" => "c" })]).unwrap();
	assert_eq!(collection.size(), collection.entries().len());
	assert_eq!(collection.size(), 2);
}

#[test]
fn test_sync_commit_waits_for_no_one_when_transactions_are_settled() {
	let (collection, sync, _events, _sub) = ready_people("sync_no_defer");
	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	transaction.wait_persisted().unwrap();

	sync.apply([SyncOp::insert(row! { "id" => "1", "n" => "a" })]).unwrap();
	// Applied immediately; a second apply proves the protocol is free.
	sync.apply([SyncOp::insert(row! { "id" => "2", "n" => "b" })]).unwrap();
	assert_eq!(collection.size(), 2);
}
