// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret operations, namespaced by application id.
//!
//! Values are encrypted before they reach persistence and decrypted on the
//! way out. Point and batch reads go through the cache; pagination always
//! reads persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use coffer_common_secret::SecretString;
use coffer_server_crypto::Encryption;
use coffer_server_db::{RecordId, SecretRecord, SecretStore};

use crate::cache::SecretCache;
use crate::error::{SecretsError, SecretsResult};
use crate::filler::{CacheFill, CacheFiller};

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;
pub const DEFAULT_FILL_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretsServiceConfig {
	/// Maximum cached entries across all applications. Zero disables the cache.
	pub cache_capacity: usize,
	/// Pending fill batches before new ones are dropped.
	pub fill_queue_capacity: usize,
}

impl Default for SecretsServiceConfig {
	fn default() -> Self {
		Self {
			cache_capacity: DEFAULT_CACHE_CAPACITY,
			fill_queue_capacity: DEFAULT_FILL_QUEUE_CAPACITY,
		}
	}
}

/// A decrypted secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
	pub key: String,
	pub value: SecretString,
}

pub struct SecretsService {
	store: Arc<dyn SecretStore>,
	encryption: Arc<dyn Encryption>,
	cache: Arc<SecretCache>,
	filler: CacheFiller,
}

impl SecretsService {
	/// Must be called inside a tokio runtime; the cache filler task is
	/// spawned here.
	pub fn new(
		store: Arc<dyn SecretStore>,
		encryption: Arc<dyn Encryption>,
		config: SecretsServiceConfig,
	) -> Self {
		let cache = Arc::new(SecretCache::new(config.cache_capacity));
		let filler = CacheFiller::new(Arc::clone(&cache), config.fill_queue_capacity);

		Self {
			store,
			encryption,
			cache,
			filler,
		}
	}

	pub fn cache(&self) -> &SecretCache {
		&self.cache
	}

	/// One page of an application's secrets, read straight from persistence.
	///
	/// Pages are 1-based; page 0 is page 1. Negative values count by their
	/// absolute value. `per_page == 0` yields an empty map.
	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn paginate(
		&self,
		application_id: &RecordId,
		page: i64,
		per_page: i64,
	) -> SecretsResult<BTreeMap<String, SecretString>> {
		let page = page.unsigned_abs().max(1);
		let per_page = per_page.unsigned_abs();
		if per_page == 0 {
			return Ok(BTreeMap::new());
		}

		let limit = i64::try_from(per_page).unwrap_or(i64::MAX);
		let offset = i64::try_from((page - 1).saturating_mul(per_page)).unwrap_or(i64::MAX);

		let records = self.store.list_secrets(application_id, limit, offset).await?;
		self.decrypt_all(records)
	}

	/// Every requested key that exists. Misses are fetched in one store call.
	#[tracing::instrument(skip(self, keys), fields(application_id = %application_id, requested = keys.len()))]
	pub async fn get(
		&self,
		application_id: &RecordId,
		keys: &[String],
	) -> SecretsResult<BTreeMap<String, SecretString>> {
		let lookup = self.cache.lookup(application_id, keys).await;
		tracing::debug!(hits = lookup.hits.len(), misses = lookup.misses.len(), "cache lookup");

		let mut records = lookup.hits;
		if !lookup.misses.is_empty() {
			let fetched = self.store.get_secrets(application_id, &lookup.misses).await?;
			self.fill(application_id, lookup.generation, &fetched);
			records.extend(fetched);
		}

		self.decrypt_all(records)
	}

	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn get_one(&self, application_id: &RecordId, key: &str) -> SecretsResult<SecretValue> {
		let lookup = self
			.cache
			.lookup(application_id, std::slice::from_ref(&key.to_string()))
			.await;

		let record = match lookup.hits.into_iter().next() {
			Some(record) => record,
			None => {
				let record = self
					.store
					.get_secret(application_id, key)
					.await?
					.ok_or_else(|| SecretsError::NotFound(format!("secret {key}")))?;
				self.fill(application_id, lookup.generation, std::slice::from_ref(&record));
				record
			}
		};

		Ok(SecretValue {
			value: self.decrypt(&record)?,
			key: record.key,
		})
	}

	/// Encrypt and store a new secret. Returns the stored (encrypted) record.
	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	pub async fn create(
		&self,
		application_id: &RecordId,
		key: &str,
		value: &str,
	) -> SecretsResult<SecretRecord> {
		if self.store.get_secret(application_id, key).await?.is_some() {
			return Err(SecretsError::AlreadyExists(key.to_string()));
		}

		let ciphertext = self.encryption.encrypt_string(value)?;
		let record = self
			.store
			.create_secret(application_id, key, ciphertext)
			.await?;

		tracing::info!(application_id = %application_id, key, "secret created");
		Ok(record)
	}

	/// Replace a secret's value, renaming it to `new_key`.
	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	pub async fn update(
		&self,
		application_id: &RecordId,
		key: &str,
		new_key: &str,
		value: &str,
	) -> SecretsResult<SecretRecord> {
		if self.store.get_secret(application_id, key).await?.is_none() {
			return Err(SecretsError::NotFound(format!("secret {key}")));
		}

		let ciphertext = self.encryption.encrypt_string(value)?;
		let record = self
			.store
			.update_secret(application_id, key, new_key, ciphertext)
			.await?;
		self.cache.replace(application_id, key, record.clone()).await;

		tracing::info!(application_id = %application_id, key, new_key, "secret updated");
		Ok(record)
	}

	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn delete(&self, application_id: &RecordId, key: &str) -> SecretsResult<()> {
		self.cache.remove(application_id, key).await;
		let deleted = self.store.delete_secret(application_id, key).await?;
		// A read that started between the two calls may have queued the old row.
		self.cache.remove(application_id, key).await;

		if !deleted {
			return Err(SecretsError::NotFound(format!("secret {key}")));
		}
		tracing::info!(application_id = %application_id, key, "secret deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn invalidate_cache(&self, application_id: &RecordId) {
		let dropped = self.cache.invalidate(application_id).await;
		tracing::debug!(dropped, "cache invalidated");
	}

	fn fill(&self, application_id: &RecordId, generation: u64, records: &[SecretRecord]) {
		if records.is_empty() || self.cache.capacity() == 0 {
			return;
		}
		self.filler.submit(CacheFill {
			application_id: *application_id,
			generation,
			records: records.to_vec(),
		});
	}

	fn decrypt(&self, record: &SecretRecord) -> SecretsResult<SecretString> {
		Ok(SecretString::new(self.encryption.decrypt_string(&record.value)?))
	}

	fn decrypt_all(&self, records: Vec<SecretRecord>) -> SecretsResult<BTreeMap<String, SecretString>> {
		let mut out = BTreeMap::new();
		for record in records {
			let value = self.decrypt(&record)?;
			out.insert(record.key, value);
		}
		Ok(out)
	}
}
