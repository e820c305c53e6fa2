// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process document store.
//!
//! Every record is keyed by a 12-byte [`DocumentId`]. The store enforces the
//! same invariants as the SQL schema under its write lock: unique application
//! names, unique `(application_id, key)` secrets, and cascading deletes.
//! Contents live for the lifetime of the process.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::application::ApplicationStore;
use crate::error::{DbError, Result};
use crate::id::{DocumentId, RecordId};
use crate::secret::SecretStore;
use crate::token::TokenStore;
use crate::types::{Application, SecretRecord, TokenRecord, TokenWithApplication};

#[derive(Default)]
struct Collections {
	applications: BTreeMap<DocumentId, Application>,
	secrets: BTreeMap<DocumentId, SecretRecord>,
	secret_keys: HashMap<(DocumentId, String), DocumentId>,
	tokens: BTreeMap<DocumentId, TokenRecord>,
}

impl Collections {
	fn application_name_taken(&self, name: &str, except: Option<&DocumentId>) -> bool {
		self
			.applications
			.iter()
			.any(|(id, app)| app.name == name && Some(id) != except)
	}
}

#[derive(Default)]
pub struct DocumentStore {
	collections: RwLock<Collections>,
}

impl DocumentStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn document_id(id: &RecordId) -> Option<DocumentId> {
	id.as_document().copied()
}

fn require_document_id(id: &RecordId) -> Result<DocumentId> {
	document_id(id).ok_or_else(|| DbError::InvalidId(id.to_string()))
}

/// SQLite semantics: a negative limit means no limit.
fn window(limit: i64, offset: i64) -> (usize, usize) {
	let limit = usize::try_from(limit).unwrap_or(usize::MAX);
	let offset = usize::try_from(offset).unwrap_or(0);
	(limit, offset)
}

#[async_trait]
impl ApplicationStore for DocumentStore {
	#[tracing::instrument(skip(self))]
	async fn create_application(&self, name: &str) -> Result<Application> {
		let mut collections = self.collections.write().await;
		if collections.application_name_taken(name, None) {
			return Err(DbError::Conflict(format!(
				"application already exists: {name}"
			)));
		}

		let id = DocumentId::generate();
		let now = Utc::now();
		let app = Application {
			id: id.into(),
			name: name.to_string(),
			created_at: now,
			updated_at: now,
		};
		collections.applications.insert(id, app.clone());

		tracing::info!(application_id = %app.id, name, "application created");
		Ok(app)
	}

	async fn get_application(&self, id: &RecordId) -> Result<Option<Application>> {
		let Some(id) = document_id(id) else {
			return Ok(None);
		};
		Ok(self.collections.read().await.applications.get(&id).cloned())
	}

	async fn get_application_by_name(&self, name: &str) -> Result<Option<Application>> {
		let collections = self.collections.read().await;
		Ok(collections
			.applications
			.values()
			.find(|app| app.name == name)
			.cloned())
	}

	async fn list_applications(&self, limit: i64, offset: i64) -> Result<(Vec<Application>, i64)> {
		let (limit, offset) = window(limit, offset);
		let collections = self.collections.read().await;
		let total = collections.applications.len() as i64;
		let page = collections
			.applications
			.values()
			.skip(offset)
			.take(limit)
			.cloned()
			.collect();
		Ok((page, total))
	}

	#[tracing::instrument(skip(self), fields(application_id = %id))]
	async fn rename_application(&self, id: &RecordId, name: &str) -> Result<Application> {
		let doc_id = require_document_id(id)?;
		let mut collections = self.collections.write().await;

		if !collections.applications.contains_key(&doc_id) {
			return Err(DbError::NotFound(format!("application {id}")));
		}
		if collections.application_name_taken(name, Some(&doc_id)) {
			return Err(DbError::Conflict(format!(
				"application already exists: {name}"
			)));
		}

		let app = collections
			.applications
			.get_mut(&doc_id)
			.ok_or_else(|| DbError::NotFound(format!("application {id}")))?;
		app.name = name.to_string();
		app.updated_at = Utc::now();

		tracing::info!(application_id = %id, name, "application renamed");
		Ok(app.clone())
	}

	#[tracing::instrument(skip(self), fields(application_id = %id))]
	async fn delete_application(&self, id: &RecordId) -> Result<bool> {
		let doc_id = require_document_id(id)?;
		let mut collections = self.collections.write().await;

		if collections.applications.remove(&doc_id).is_none() {
			return Ok(false);
		}

		let collections = &mut *collections;
		collections.secrets.retain(|_, secret| secret.application_id != *id);
		collections.secret_keys.retain(|(app, _), _| *app != doc_id);
		collections.tokens.retain(|_, token| token.application_id != *id);

		tracing::info!(application_id = %id, "application deleted");
		Ok(true)
	}
}

#[async_trait]
impl SecretStore for DocumentStore {
	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	async fn create_secret(&self, application_id: &RecordId, key: &str, value: Vec<u8>) -> Result<SecretRecord> {
		let app_id = require_document_id(application_id)?;
		let mut collections = self.collections.write().await;

		if !collections.applications.contains_key(&app_id) {
			return Err(DbError::NotFound(format!("application {application_id}")));
		}
		let index_key = (app_id, key.to_string());
		if collections.secret_keys.contains_key(&index_key) {
			return Err(DbError::Conflict(format!("secret already exists: {key}")));
		}

		let id = DocumentId::generate();
		let now = Utc::now();
		let record = SecretRecord {
			id: id.into(),
			application_id: *application_id,
			key: key.to_string(),
			value,
			created_at: now,
			updated_at: now,
		};
		collections.secrets.insert(id, record.clone());
		collections.secret_keys.insert(index_key, id);

		tracing::debug!(secret_id = %record.id, key, "secret created");
		Ok(record)
	}

	async fn get_secret(&self, application_id: &RecordId, key: &str) -> Result<Option<SecretRecord>> {
		let Some(app_id) = document_id(application_id) else {
			return Ok(None);
		};
		let collections = self.collections.read().await;
		Ok(collections
			.secret_keys
			.get(&(app_id, key.to_string()))
			.and_then(|id| collections.secrets.get(id))
			.cloned())
	}

	async fn get_secrets(&self, application_id: &RecordId, keys: &[String]) -> Result<Vec<SecretRecord>> {
		let Some(app_id) = document_id(application_id) else {
			return Ok(Vec::new());
		};
		let collections = self.collections.read().await;

		let wanted: HashSet<&String> = keys.iter().collect();
		let mut ids: Vec<DocumentId> = wanted
			.into_iter()
			.filter_map(|key| collections.secret_keys.get(&(app_id, key.clone())).copied())
			.collect();
		ids.sort();

		Ok(ids
			.iter()
			.filter_map(|id| collections.secrets.get(id))
			.cloned()
			.collect())
	}

	async fn list_secrets(&self, application_id: &RecordId, limit: i64, offset: i64) -> Result<Vec<SecretRecord>> {
		let (limit, offset) = window(limit, offset);
		let collections = self.collections.read().await;
		Ok(collections
			.secrets
			.values()
			.filter(|secret| secret.application_id == *application_id)
			.skip(offset)
			.take(limit)
			.cloned()
			.collect())
	}

	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	async fn update_secret(
		&self,
		application_id: &RecordId,
		key: &str,
		new_key: &str,
		value: Vec<u8>,
	) -> Result<SecretRecord> {
		let app_id = require_document_id(application_id)?;
		let mut collections = self.collections.write().await;

		let old_index = (app_id, key.to_string());
		let Some(id) = collections.secret_keys.get(&old_index).copied() else {
			return Err(DbError::NotFound(format!("secret {key}")));
		};
		let new_index = (app_id, new_key.to_string());
		if new_key != key && collections.secret_keys.contains_key(&new_index) {
			return Err(DbError::Conflict(format!("secret already exists: {new_key}")));
		}

		let collections = &mut *collections;
		let record = collections
			.secrets
			.get_mut(&id)
			.ok_or_else(|| DbError::Internal(format!("secret index points at missing record {id}")))?;
		record.key = new_key.to_string();
		record.value = value;
		record.updated_at = Utc::now();
		let updated = record.clone();

		collections.secret_keys.remove(&old_index);
		collections.secret_keys.insert(new_index, id);

		tracing::debug!(key, new_key, "secret updated");
		Ok(updated)
	}

	async fn delete_secret(&self, application_id: &RecordId, key: &str) -> Result<bool> {
		let Some(app_id) = document_id(application_id) else {
			return Ok(false);
		};
		let mut collections = self.collections.write().await;

		match collections.secret_keys.remove(&(app_id, key.to_string())) {
			Some(id) => {
				collections.secrets.remove(&id);
				tracing::debug!(key, "secret deleted");
				Ok(true)
			}
			None => Ok(false),
		}
	}
}

#[async_trait]
impl TokenStore for DocumentStore {
	#[tracing::instrument(skip(self, digest), fields(application_id = %application_id))]
	async fn create_token(&self, application_id: &RecordId, digest: &[u8]) -> Result<TokenRecord> {
		let app_id = require_document_id(application_id)?;
		let mut collections = self.collections.write().await;

		if !collections.applications.contains_key(&app_id) {
			return Err(DbError::NotFound(format!("application {application_id}")));
		}

		let id = DocumentId::generate();
		let now = Utc::now();
		let record = TokenRecord {
			id: id.into(),
			application_id: *application_id,
			value: digest.to_vec(),
			created_at: now,
			updated_at: now,
		};
		collections.tokens.insert(id, record.clone());

		tracing::debug!(token_id = %record.id, "token created");
		Ok(record)
	}

	async fn get_token_with_application(&self, id: &RecordId) -> Result<Option<TokenWithApplication>> {
		let Some(id) = document_id(id) else {
			return Ok(None);
		};
		let collections = self.collections.read().await;

		let Some(token) = collections.tokens.get(&id) else {
			return Ok(None);
		};
		let application = token
			.application_id
			.as_document()
			.and_then(|app_id| collections.applications.get(app_id));

		Ok(application.map(|application| TokenWithApplication {
			token: token.clone(),
			application: application.clone(),
		}))
	}
}
