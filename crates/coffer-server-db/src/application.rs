// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application repository.
//!
//! Application names are unique. Deleting an application cascades to its
//! secrets and tokens through the foreign keys.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{is_unique_constraint_error, DbError, Result};
use crate::id::RecordId;
use crate::types::Application;
use crate::{integer_id, parse_record_id, parse_timestamp, require_integer_id};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
	async fn create_application(&self, name: &str) -> Result<Application>;
	async fn get_application(&self, id: &RecordId) -> Result<Option<Application>>;
	async fn get_application_by_name(&self, name: &str) -> Result<Option<Application>>;
	async fn list_applications(&self, limit: i64, offset: i64) -> Result<(Vec<Application>, i64)>;
	async fn rename_application(&self, id: &RecordId, name: &str) -> Result<Application>;
	async fn delete_application(&self, id: &RecordId) -> Result<bool>;
}

#[async_trait]
impl ApplicationStore for ApplicationRepository {
	async fn create_application(&self, name: &str) -> Result<Application> {
		self.create_application(name).await
	}

	async fn get_application(&self, id: &RecordId) -> Result<Option<Application>> {
		self.get_application(id).await
	}

	async fn get_application_by_name(&self, name: &str) -> Result<Option<Application>> {
		self.get_application_by_name(name).await
	}

	async fn list_applications(&self, limit: i64, offset: i64) -> Result<(Vec<Application>, i64)> {
		self.list_applications(limit, offset).await
	}

	async fn rename_application(&self, id: &RecordId, name: &str) -> Result<Application> {
		self.rename_application(id, name).await
	}

	async fn delete_application(&self, id: &RecordId) -> Result<bool> {
		self.delete_application(id).await
	}
}

/// Repository for application database operations.
#[derive(Clone)]
pub struct ApplicationRepository {
	pool: SqlitePool,
}

impl ApplicationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create an application.
	///
	/// Returns `Err(DbError::Conflict)` if the name is taken.
	#[tracing::instrument(skip(self))]
	pub async fn create_application(&self, name: &str) -> Result<Application> {
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			INSERT INTO applications (name, created_at, updated_at)
			VALUES (?, ?, ?)
			"#,
		)
		.bind(name)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) => {
				let id = parse_record_id(done.last_insert_rowid())?;
				tracing::info!(application_id = %id, name, "application created");
				Ok(Application {
					id,
					name: name.to_string(),
					created_at: now,
					updated_at: now,
				})
			}
			Err(e) if is_unique_constraint_error(&e) => Err(DbError::Conflict(format!(
				"application already exists: {name}"
			))),
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	#[tracing::instrument(skip(self), fields(application_id = %id))]
	pub async fn get_application(&self, id: &RecordId) -> Result<Option<Application>> {
		let Some(id) = integer_id(id) else {
			return Ok(None);
		};

		let row = sqlx::query(
			r#"
			SELECT id, name, created_at, updated_at
			FROM applications
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_application_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_application_by_name(&self, name: &str) -> Result<Option<Application>> {
		let row = sqlx::query(
			r#"
			SELECT id, name, created_at, updated_at
			FROM applications
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_application_row).transpose()
	}

	/// List applications ordered by id.
	///
	/// # Returns
	/// Tuple of (applications, total_count) for pagination.
	#[tracing::instrument(skip(self))]
	pub async fn list_applications(&self, limit: i64, offset: i64) -> Result<(Vec<Application>, i64)> {
		let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
			.fetch_one(&self.pool)
			.await?;

		let rows = sqlx::query(
			r#"
			SELECT id, name, created_at, updated_at
			FROM applications
			ORDER BY id
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.pool)
		.await?;

		let mut applications = Vec::with_capacity(rows.len());
		for row in &rows {
			applications.push(parse_application_row(row)?);
		}

		tracing::debug!(count = applications.len(), total, "listed applications");
		Ok((applications, total))
	}

	/// Rename an application.
	///
	/// Returns `Err(DbError::NotFound)` for an unknown id and
	/// `Err(DbError::Conflict)` if the new name is taken.
	#[tracing::instrument(skip(self), fields(application_id = %id))]
	pub async fn rename_application(&self, id: &RecordId, name: &str) -> Result<Application> {
		let raw_id = require_integer_id(id)?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			UPDATE applications
			SET name = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(name)
		.bind(now.to_rfc3339())
		.bind(raw_id)
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) if done.rows_affected() == 0 => {
				Err(DbError::NotFound(format!("application {id}")))
			}
			Ok(_) => {
				tracing::info!(application_id = %id, name, "application renamed");
				self
					.get_application(id)
					.await?
					.ok_or_else(|| DbError::NotFound(format!("application {id}")))
			}
			Err(e) if is_unique_constraint_error(&e) => Err(DbError::Conflict(format!(
				"application already exists: {name}"
			))),
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	/// Delete an application together with its secrets and tokens.
	///
	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(application_id = %id))]
	pub async fn delete_application(&self, id: &RecordId) -> Result<bool> {
		let raw_id = require_integer_id(id)?;

		let result = sqlx::query("DELETE FROM applications WHERE id = ?")
			.bind(raw_id)
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(application_id = %id, "application deleted");
		}
		Ok(deleted)
	}
}

pub(crate) fn parse_application_row(row: &sqlx::sqlite::SqliteRow) -> Result<Application> {
	let id: i64 = row.get("id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Application {
		id: parse_record_id(id)?,
		name: row.get("name"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
