// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_collection::{InsertConfig, UpdateConfig};
use riffle_testing::row;
use riffle_transaction::{Transaction, TransactionConfig, TransactionState};
use riffle_type::{Key, Value};

use crate::ready_people;

// Scenario S2: rolling back one transaction cascades to every pending
// transaction that touched the same keys.
#[test]
fn test_rollback_cascades_over_shared_keys() {
	let (collection, _sync, _events, _sub) = ready_people("tx_cascade");

	let tx1 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx1.mutate(|| {
		collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	})
	.unwrap();

	let tx2 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx2.mutate(|| {
		collection.update("1", UpdateConfig::default(), |draft| draft.set("n", "b")).unwrap();
	})
	.unwrap();

	// The later transaction's write wins in the overlay.
	assert_eq!(collection.get(&Key::from("1")).unwrap().get("n"), Some(&Value::Text("b".into())));

	tx1.rollback().unwrap();

	assert_eq!(tx1.state(), TransactionState::Failed);
	assert_eq!(tx2.state(), TransactionState::Failed);
	assert!(!collection.has(&Key::from("1")));
	assert_eq!(collection.size(), 0);
}

#[test]
fn test_rollback_spares_disjoint_transactions() {
	let (collection, _sync, _events, _sub) = ready_people("tx_disjoint");

	let tx1 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx1.mutate(|| {
		collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	})
	.unwrap();

	let tx2 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx2.mutate(|| {
		collection.insert(row! { "id" => "2", "n" => "b" }, InsertConfig::default()).unwrap();
	})
	.unwrap();

	tx1.rollback().unwrap();

	assert_eq!(tx1.state(), TransactionState::Failed);
	assert_eq!(tx2.state(), TransactionState::Pending);
	assert!(!collection.has(&Key::from("1")));
	assert!(collection.has(&Key::from("2")));
}

#[test]
fn test_later_transaction_wins_in_the_overlay() {
	let (collection, _sync, _events, _sub) = ready_people("tx_last_wins");

	let tx1 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx1.mutate(|| {
		collection.insert(row! { "id" => "1", "n" => "first" }, InsertConfig::default()).unwrap();
	})
	.unwrap();

	let tx2 = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	tx2.mutate(|| {
		collection.update("1", UpdateConfig::default(), |draft| draft.set("n", "second")).unwrap();
	})
	.unwrap();

	assert_eq!(
		collection.get(&Key::from("1")).unwrap().get("n"),
		Some(&Value::Text("second".into()))
	);
}

#[test]
fn test_wait_persisted_observes_emitted_events() {
	let (collection, _sync, events, _sub) = ready_people("tx_persisted_order");

	let transaction = collection.insert(row! { "id" => "1", "n" => "a" }, InsertConfig::default()).unwrap();
	transaction.wait_persisted().unwrap();

	// By the time persistence resolves, the insert event is out.
	assert_eq!(events.batch_count(), 1);
}

#[test]
fn test_transaction_spanning_collections_notifies_both() {
	let (left, _sync_a, left_events, _sub_a) = ready_people("tx_span_left");
	let (right, _sync_b, right_events, _sub_b) = ready_people("tx_span_right");

	let transaction = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
	transaction
		.mutate(|| {
			left.insert(row! { "id" => "l", "n" => "a" }, InsertConfig::default()).unwrap();
			right.insert(row! { "id" => "r", "n" => "b" }, InsertConfig::default()).unwrap();
		})
		.unwrap();

	assert!(left.has(&Key::from("l")));
	assert!(right.has(&Key::from("r")));
	assert_eq!(left_events.batch_count(), 1);
	assert_eq!(right_events.batch_count(), 1);

	transaction.rollback().unwrap();
	assert!(!left.has(&Key::from("l")));
	assert!(!right.has(&Key::from("r")));
}
