// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The optimistic mutation API: insert, update (through a change-recording
//! draft) and delete.

use riffle_transaction::{
	MutationType, PendingMutation, Transaction, TransactionConfig, ambient_transaction,
};
use riffle_type::{Key, Row, Value};
use tracing::instrument;

use super::Collection;
use crate::{
	CollectionStatus, Error, Result,
	config::{DeleteConfig, HandlerContext, InsertConfig, MutationHandler, UpdateConfig},
};

/// A change recorder handed to update callbacks. Reads see the merged
/// (draft) row; writes are recorded field by field and become the
/// mutation's `changes`.
pub struct UpdateDraft {
	original: Row,
	changes: Row,
}

impl UpdateDraft {
	fn new(original: Row) -> Self {
		Self {
			original,
			changes: Row::new(),
		}
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.changes.get(field).or_else(|| self.original.get(field))
	}

	pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
		self.changes.set(field, value);
	}

	/// The merged view of the draft.
	pub fn row(&self) -> Row {
		self.original.merge(&self.changes)
	}

	pub fn changes(&self) -> &Row {
		&self.changes
	}
}

impl Collection {
	/// Insert a new row. Fails when the derived key is already visible.
	/// Returns the transaction carrying the mutation.
	#[instrument(name = "collection::insert", level = "debug", skip_all, fields(collection = %self.id()))]
	pub fn insert(&self, data: Row, config: InsertConfig) -> Result<Transaction> {
		self.insert_many(vec![data], config)
	}

	pub fn insert_many(&self, rows: Vec<Row>, config: InsertConfig) -> Result<Transaction> {
		self.ensure_writable()?;
		if rows.is_empty() {
			return Err(Error::EmptyKeyList);
		}
		let optimistic = config.optimistic.unwrap_or(true);
		let mut mutations = Vec::with_capacity(rows.len());
		let mut batch_keys = Vec::with_capacity(rows.len());
		for data in rows {
			let validated = self.validate("insert", &data)?;
			let key = (self.shared.config.get_key)(&validated).ok_or(Error::MissingKey)?;
			let duplicate = batch_keys.contains(&key)
				|| self.shared.state.lock().visible_contains(&key);
			if duplicate {
				return Err(Error::DuplicateKey {
					collection: self.id().to_string(),
					key,
				});
			}
			batch_keys.push(key.clone());
			let user_fields: Vec<&str> = data.fields().collect();
			let changes = validated.project(&user_fields);
			mutations.push(
				PendingMutation::new(
					MutationType::Insert,
					key,
					None,
					validated,
					changes,
					optimistic,
					self.shared.clone(),
				)
				.with_metadata(config.metadata.clone())
				.with_sync_metadata(self.shared.config.sync.sync_metadata()),
			);
		}
		self.run_mutations(mutations, self.shared.config.on_insert.clone(), "on_insert")
	}

	/// Update one visible row through a draft callback. Mutations whose
	/// change set stays empty are skipped.
	pub fn update(
		&self,
		key: impl Into<Key>,
		config: UpdateConfig,
		callback: impl Fn(&mut UpdateDraft),
	) -> Result<Transaction> {
		self.update_many(vec![key.into()], config, callback)
	}

	#[instrument(name = "collection::update", level = "debug", skip_all, fields(collection = %self.id()))]
	pub fn update_many(
		&self,
		keys: Vec<Key>,
		config: UpdateConfig,
		callback: impl Fn(&mut UpdateDraft),
	) -> Result<Transaction> {
		self.ensure_writable()?;
		if keys.is_empty() {
			return Err(Error::EmptyKeyList);
		}
		let optimistic = config.optimistic.unwrap_or(true);
		let mut mutations = Vec::with_capacity(keys.len());
		for key in keys {
			let current = self.get(&key).ok_or_else(|| Error::UnknownKey {
				collection: self.id().to_string(),
				key: key.clone(),
			})?;
			let mut draft = UpdateDraft::new(current.clone());
			callback(&mut draft);
			if draft.changes.is_empty() {
				continue;
			}

			// Validate the whole merged row, then keep only the
			// (possibly transformed) touched fields.
			let changes = match &self.shared.config.schema {
				Some(_) => {
					let validated = self.validate("update", &draft.row())?;
					let touched: Vec<&str> = draft.changes.fields().collect();
					validated.project(&touched)
				}
				None => draft.changes.clone(),
			};

			let modified = current.merge(&changes);
			let new_key = (self.shared.config.get_key)(&modified).ok_or(Error::MissingKey)?;
			if new_key != key {
				return Err(Error::KeyChanged {
					key,
					new_key,
				});
			}
			mutations.push(
				PendingMutation::new(
					MutationType::Update,
					key,
					Some(current),
					modified,
					changes,
					optimistic,
					self.shared.clone(),
				)
				.with_metadata(config.metadata.clone())
				.with_sync_metadata(self.shared.config.sync.sync_metadata()),
			);
		}

		if mutations.is_empty() {
			// Nothing changed; hand back a settled empty transaction.
			let transaction = Transaction::new(TransactionConfig::new(|_| Ok(())).manual());
			transaction.commit()?;
			return Ok(transaction);
		}
		self.run_mutations(mutations, self.shared.config.on_update.clone(), "on_update")
	}

	/// Delete one visible row.
	pub fn delete(&self, key: impl Into<Key>, config: DeleteConfig) -> Result<Transaction> {
		self.delete_many(vec![key.into()], config)
	}

	#[instrument(name = "collection::delete", level = "debug", skip_all, fields(collection = %self.id()))]
	pub fn delete_many(&self, keys: Vec<Key>, config: DeleteConfig) -> Result<Transaction> {
		self.ensure_writable()?;
		if keys.is_empty() {
			return Err(Error::EmptyKeyList);
		}
		let optimistic = config.optimistic.unwrap_or(true);
		let mut mutations = Vec::with_capacity(keys.len());
		for key in keys {
			let current = self.get(&key).ok_or_else(|| Error::UnknownKey {
				collection: self.id().to_string(),
				key: key.clone(),
			})?;
			mutations.push(
				PendingMutation::new(
					MutationType::Delete,
					key,
					Some(current.clone()),
					current.clone(),
					current,
					optimistic,
					self.shared.clone(),
				)
				.with_metadata(config.metadata.clone())
				.with_sync_metadata(self.shared.config.sync.sync_metadata()),
			);
		}
		self.run_mutations(mutations, self.shared.config.on_delete.clone(), "on_delete")
	}

	fn validate(&self, operation: &'static str, row: &Row) -> Result<Row> {
		match &self.shared.config.schema {
			Some(schema) => schema.validate(row).map_err(|issues| Error::SchemaValidation {
				operation,
				issues,
			}),
			None => Ok(row.clone()),
		}
	}

	/// Mutations fail explicitly on an errored collection and restart a
	/// cleaned-up one.
	fn ensure_writable(&self) -> Result<()> {
		match self.status() {
			CollectionStatus::Error => Err(Error::CollectionInErrorState {
				collection: self.id().to_string(),
			}),
			CollectionStatus::Idle | CollectionStatus::CleanedUp => self.start_sync_if_needed(),
			_ => Ok(()),
		}
	}

	/// Attach mutations to the ambient transaction when one is active;
	/// otherwise persist them right away through the configured handler.
	fn run_mutations(
		&self,
		mutations: Vec<PendingMutation>,
		handler: Option<MutationHandler>,
		handler_name: &'static str,
	) -> Result<Transaction> {
		if let Some(transaction) = ambient_transaction() {
			transaction.apply_mutations(mutations)?;
			return Ok(transaction);
		}
		let Some(handler) = handler else {
			return Err(Error::MissingHandler {
				handler: handler_name,
			});
		};
		let collection = self.clone();
		let transaction = Transaction::new(TransactionConfig::new(move |transaction| {
			handler(HandlerContext {
				transaction: transaction.clone(),
				collection: collection.clone(),
			})
		}));
		transaction.apply_mutations(mutations)?;
		// The optimistic overlay is already visible; a handler failure
		// rolls it back and surfaces on wait_persisted.
		let _ = transaction.commit();
		Ok(transaction)
	}
}
