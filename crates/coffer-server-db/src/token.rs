// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token repository. Stores only digests of the random token secret.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{is_foreign_key_error, DbError, Result};
use crate::id::RecordId;
use crate::types::{Application, TokenRecord, TokenWithApplication};
use crate::{integer_id, parse_record_id, parse_timestamp, require_integer_id};

#[async_trait]
pub trait TokenStore: Send + Sync {
	async fn create_token(&self, application_id: &RecordId, digest: &[u8]) -> Result<TokenRecord>;
	async fn get_token_with_application(&self, id: &RecordId) -> Result<Option<TokenWithApplication>>;
}

#[async_trait]
impl TokenStore for TokenRepository {
	async fn create_token(&self, application_id: &RecordId, digest: &[u8]) -> Result<TokenRecord> {
		self.create_token(application_id, digest).await
	}

	async fn get_token_with_application(&self, id: &RecordId) -> Result<Option<TokenWithApplication>> {
		self.get_token_with_application(id).await
	}
}

/// Repository for token database operations.
#[derive(Clone)]
pub struct TokenRepository {
	pool: SqlitePool,
}

impl TokenRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Persist a token digest for an application.
	///
	/// Returns `Err(DbError::NotFound)` if the application does not exist.
	#[tracing::instrument(skip(self, digest), fields(application_id = %application_id))]
	pub async fn create_token(&self, application_id: &RecordId, digest: &[u8]) -> Result<TokenRecord> {
		let app_id = require_integer_id(application_id)?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			INSERT INTO tokens (application_id, value, created_at, updated_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(app_id)
		.bind(digest)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) => {
				let id = parse_record_id(done.last_insert_rowid())?;
				tracing::debug!(token_id = %id, "token created");
				Ok(TokenRecord {
					id,
					application_id: *application_id,
					value: digest.to_vec(),
					created_at: now,
					updated_at: now,
				})
			}
			Err(e) if is_foreign_key_error(&e) => {
				Err(DbError::NotFound(format!("application {application_id}")))
			}
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}

	/// Look up a token and its owning application in one query.
	#[tracing::instrument(skip(self), fields(token_id = %id))]
	pub async fn get_token_with_application(&self, id: &RecordId) -> Result<Option<TokenWithApplication>> {
		let Some(id) = integer_id(id) else {
			return Ok(None);
		};

		let row = sqlx::query(
			r#"
			SELECT t.id, t.application_id, t.value, t.created_at, t.updated_at,
			       a.name AS application_name,
			       a.created_at AS application_created_at,
			       a.updated_at AS application_updated_at
			FROM tokens t
			JOIN applications a ON a.id = t.application_id
			WHERE t.id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_token_row).transpose()
	}
}

fn parse_token_row(row: &sqlx::sqlite::SqliteRow) -> Result<TokenWithApplication> {
	let id: i64 = row.get("id");
	let application_id = parse_record_id(row.get::<i64, _>("application_id"))?;
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");
	let application_created_at: String = row.get("application_created_at");
	let application_updated_at: String = row.get("application_updated_at");

	Ok(TokenWithApplication {
		token: TokenRecord {
			id: parse_record_id(id)?,
			application_id,
			value: row.get("value"),
			created_at: parse_timestamp(&created_at, "created_at")?,
			updated_at: parse_timestamp(&updated_at, "updated_at")?,
		},
		application: Application {
			id: application_id,
			name: row.get("application_name"),
			created_at: parse_timestamp(&application_created_at, "application_created_at")?,
			updated_at: parse_timestamp(&application_updated_at, "application_updated_at")?,
		},
	})
}
