// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret repository.
//!
//! Values arrive already encrypted. `(application_id, key)` is unique.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{is_foreign_key_error, is_unique_constraint_error, DbError, Result};
use crate::id::RecordId;
use crate::types::SecretRecord;
use crate::{integer_id, parse_record_id, parse_timestamp, require_integer_id};

/// Upper bound on keys bound into a single `IN (...)` list.
pub const MAX_KEYS_PER_QUERY: usize = 500;

#[async_trait]
pub trait SecretStore: Send + Sync {
	async fn create_secret(&self, application_id: &RecordId, key: &str, value: Vec<u8>) -> Result<SecretRecord>;
	async fn get_secret(&self, application_id: &RecordId, key: &str) -> Result<Option<SecretRecord>>;
	async fn get_secrets(&self, application_id: &RecordId, keys: &[String]) -> Result<Vec<SecretRecord>>;
	async fn list_secrets(&self, application_id: &RecordId, limit: i64, offset: i64) -> Result<Vec<SecretRecord>>;
	async fn update_secret(
		&self,
		application_id: &RecordId,
		key: &str,
		new_key: &str,
		value: Vec<u8>,
	) -> Result<SecretRecord>;
	async fn delete_secret(&self, application_id: &RecordId, key: &str) -> Result<bool>;
}

#[async_trait]
impl SecretStore for SecretRepository {
	async fn create_secret(&self, application_id: &RecordId, key: &str, value: Vec<u8>) -> Result<SecretRecord> {
		self.create_secret(application_id, key, value).await
	}

	async fn get_secret(&self, application_id: &RecordId, key: &str) -> Result<Option<SecretRecord>> {
		self.get_secret(application_id, key).await
	}

	async fn get_secrets(&self, application_id: &RecordId, keys: &[String]) -> Result<Vec<SecretRecord>> {
		self.get_secrets(application_id, keys).await
	}

	async fn list_secrets(&self, application_id: &RecordId, limit: i64, offset: i64) -> Result<Vec<SecretRecord>> {
		self.list_secrets(application_id, limit, offset).await
	}

	async fn update_secret(
		&self,
		application_id: &RecordId,
		key: &str,
		new_key: &str,
		value: Vec<u8>,
	) -> Result<SecretRecord> {
		self.update_secret(application_id, key, new_key, value).await
	}

	async fn delete_secret(&self, application_id: &RecordId, key: &str) -> Result<bool> {
		self.delete_secret(application_id, key).await
	}
}

/// Repository for secret database operations.
#[derive(Clone)]
pub struct SecretRepository {
	pool: SqlitePool,
}

impl SecretRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert an encrypted secret.
	///
	/// Returns `Err(DbError::Conflict)` if the key exists for this application
	/// and `Err(DbError::NotFound)` if the application does not exist.
	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	pub async fn create_secret(
		&self,
		application_id: &RecordId,
		key: &str,
		value: Vec<u8>,
	) -> Result<SecretRecord> {
		let app_id = require_integer_id(application_id)?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			INSERT INTO secrets (application_id, key, value, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(app_id)
		.bind(key)
		.bind(&value)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) => {
				let id = parse_record_id(done.last_insert_rowid())?;
				tracing::debug!(secret_id = %id, key, "secret created");
				Ok(SecretRecord {
					id,
					application_id: *application_id,
					key: key.to_string(),
					value,
					created_at: now,
					updated_at: now,
				})
			}
			Err(e) if is_unique_constraint_error(&e) => {
				Err(DbError::Conflict(format!("secret already exists: {key}")))
			}
			Err(e) if is_foreign_key_error(&e) => {
				Err(DbError::NotFound(format!("application {application_id}")))
			}
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn get_secret(&self, application_id: &RecordId, key: &str) -> Result<Option<SecretRecord>> {
		let Some(app_id) = integer_id(application_id) else {
			return Ok(None);
		};

		let row = sqlx::query(
			r#"
			SELECT id, application_id, key, value, created_at, updated_at
			FROM secrets
			WHERE application_id = ? AND key = ?
			"#,
		)
		.bind(app_id)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_secret_row).transpose()
	}

	/// Fetch every listed key that exists, ordered by id. Keys are bound in
	/// chunks of [`MAX_KEYS_PER_QUERY`] so large requests stay under SQLite's
	/// bound-parameter limit.
	#[tracing::instrument(skip(self, keys), fields(application_id = %application_id, requested = keys.len()))]
	pub async fn get_secrets(&self, application_id: &RecordId, keys: &[String]) -> Result<Vec<SecretRecord>> {
		let Some(app_id) = integer_id(application_id) else {
			return Ok(Vec::new());
		};

		let mut secrets = Vec::new();
		for chunk in keys.chunks(MAX_KEYS_PER_QUERY) {
			let placeholders = vec!["?"; chunk.len()].join(", ");
			let sql = format!(
				r#"
				SELECT id, application_id, key, value, created_at, updated_at
				FROM secrets
				WHERE application_id = ? AND key IN ({placeholders})
				"#
			);

			let mut query = sqlx::query(&sql).bind(app_id);
			for key in chunk {
				query = query.bind(key);
			}
			for row in &query.fetch_all(&self.pool).await? {
				secrets.push(parse_secret_row(row)?);
			}
		}

		// Duplicate keys split across chunks would match twice.
		secrets.sort_by_key(|secret| secret.id);
		secrets.dedup_by_key(|secret| secret.id);
		tracing::debug!(found = secrets.len(), "fetched secrets by key");
		Ok(secrets)
	}

	/// List an application's secrets ordered by id.
	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn list_secrets(
		&self,
		application_id: &RecordId,
		limit: i64,
		offset: i64,
	) -> Result<Vec<SecretRecord>> {
		let Some(app_id) = integer_id(application_id) else {
			return Ok(Vec::new());
		};

		let rows = sqlx::query(
			r#"
			SELECT id, application_id, key, value, created_at, updated_at
			FROM secrets
			WHERE application_id = ?
			ORDER BY id
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(app_id)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.pool)
		.await?;

		let mut secrets = Vec::with_capacity(rows.len());
		for row in &rows {
			secrets.push(parse_secret_row(row)?);
		}
		Ok(secrets)
	}

	/// Replace a secret's value and optionally rename it.
	///
	/// Returns `Err(DbError::NotFound)` if `key` does not exist and
	/// `Err(DbError::Conflict)` if `new_key` is taken by another secret.
	#[tracing::instrument(skip(self, value), fields(application_id = %application_id))]
	pub async fn update_secret(
		&self,
		application_id: &RecordId,
		key: &str,
		new_key: &str,
		value: Vec<u8>,
	) -> Result<SecretRecord> {
		let app_id = require_integer_id(application_id)?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			UPDATE secrets
			SET key = ?, value = ?, updated_at = ?
			WHERE application_id = ? AND key = ?
			"#,
		)
		.bind(new_key)
		.bind(&value)
		.bind(now.to_rfc3339())
		.bind(app_id)
		.bind(key)
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) if done.rows_affected() == 0 => {
				Err(DbError::NotFound(format!("secret {key}")))
			}
			Ok(_) => {
				tracing::debug!(key, new_key, "secret updated");
				self
					.get_secret(application_id, new_key)
					.await?
					.ok_or_else(|| DbError::NotFound(format!("secret {new_key}")))
			}
			Err(e) if is_unique_constraint_error(&e) => {
				Err(DbError::Conflict(format!("secret already exists: {new_key}")))
			}
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn delete_secret(&self, application_id: &RecordId, key: &str) -> Result<bool> {
		let Some(app_id) = integer_id(application_id) else {
			return Ok(false);
		};

		let result = sqlx::query("DELETE FROM secrets WHERE application_id = ? AND key = ?")
			.bind(app_id)
			.bind(key)
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(key, "secret deleted");
		}
		Ok(deleted)
	}
}

fn parse_secret_row(row: &sqlx::sqlite::SqliteRow) -> Result<SecretRecord> {
	let id: i64 = row.get("id");
	let application_id: i64 = row.get("application_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(SecretRecord {
		id: parse_record_id(id)?,
		application_id: parse_record_id(application_id)?,
		key: row.get("key"),
		value: row.get("value"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
