// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use riffle_type::Key;
use thiserror::Error;

use crate::{CollectionStatus, schema::SchemaIssue};

#[derive(Debug, Error)]
pub enum Error {
	// Configuration
	#[error("no {handler} handler is configured and no ambient transaction is active")]
	MissingHandler { handler: &'static str },

	// Usage
	#[error("a row with key {key} is already visible in collection {collection}")]
	DuplicateKey { collection: String, key: Key },

	#[error("no visible row with key {key} in collection {collection}")]
	UnknownKey { collection: String, key: Key },

	#[error("the update would change the row's derived key from {key} to {new_key}")]
	KeyChanged { key: Key, new_key: Key },

	#[error("the key function returned nothing for the row")]
	MissingKey,

	#[error("at least one key is required")]
	EmptyKeyList,

	#[error("collection {collection} is in error state; recreate or restart it first")]
	CollectionInErrorState { collection: String },

	// Status transitions
	#[error("invalid collection status transition from {from} to {to}")]
	InvalidStatusTransition {
		from: CollectionStatus,
		to: CollectionStatus,
	},

	// Sync protocol
	#[error("sync wrote without a transaction; call begin first")]
	SyncWriteWithoutBegin,

	#[error("a sync transaction is already in progress")]
	SyncTransactionInProgress,

	#[error("sync committed without a transaction; call begin first")]
	SyncCommitWithoutBegin,

	#[error("the pending sync transaction was already committed")]
	SyncTransactionCommitted,

	#[error("the collection is gone")]
	CollectionGone,

	#[error("starting sync failed: {message}")]
	SyncStartFailed { message: String },

	// Validation
	#[error("schema validation failed for {operation}: {}", issues.iter().map(|i| i.message.as_str()).collect::<Vec<_>>().join("; "))]
	SchemaValidation {
		operation: &'static str,
		issues: Vec<SchemaIssue>,
	},

	// Cleanup
	#[error("the sync cleanup function failed: {message}")]
	SyncCleanupFailed { message: String },

	#[error(transparent)]
	Transaction(#[from] riffle_transaction::Error),

	#[error(transparent)]
	Core(#[from] riffle_core::Error),

	#[error(transparent)]
	Type(#[from] riffle_type::Error),
}
