// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use collection::{Collection, IndexHandle, ScanStats, UpdateDraft};
pub use config::{
	CollectionConfig, DeleteConfig, HandlerContext, InsertConfig, MutationHandler, UpdateConfig,
};
pub use error::Error;
pub use schema::{Schema, SchemaIssue};
pub use status::CollectionStatus;
pub use subscribe::{ChangesSubscription, SubscribeOptions};
pub use sync::{RowUpdateMode, SyncCleanup, SyncContext, SyncOp, SyncSource};

mod collection;
mod config;
mod error;
mod gc;
mod schema;
mod status;
mod subscribe;
mod sync;

pub type Result<T> = std::result::Result<T, Error>;
