// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Riffle: a reactive client-side data store.
//!
//! Collections keep externally synced rows and an optimistic overlay of
//! in-flight transactions, emit fine-grained change batches, and serve
//! live queries compiled to an incremental operator pipeline.

pub use riffle_collection::{
	ChangesSubscription, Collection, CollectionConfig, CollectionStatus, DeleteConfig, HandlerContext,
	IndexHandle, InsertConfig, MutationHandler, RowUpdateMode, Schema, SchemaIssue, SubscribeOptions,
	SyncCleanup, SyncContext, SyncOp, SyncSource, UpdateConfig, UpdateDraft,
};
pub use riffle_core::{
	ChangeEvent, ChangeType,
	expression::{self, Expression, dsl},
	index::{IndexLookup, IndexRange},
};
pub use riffle_flow::{
	From as QueryFrom, JoinType, OrderIndexKind, Query, QueryBuilder, SelectEntry, live_query,
	live_query_named,
};
pub use riffle_transaction::{
	GlobalKey, MutationType, PendingMutation, Transaction, TransactionConfig, TransactionState,
	ambient_transaction,
};
pub use riffle_type::{Key, OrderedF64, Row, SortDirection, Value, ValueKind, compare_values};
