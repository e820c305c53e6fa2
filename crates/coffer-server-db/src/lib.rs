// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # coffer-server-db
//!
//! Persistence layer for Coffer.
//!
//! ## Repository Pattern
//!
//! Each domain has a `*Store` trait and a SQLite `*Repository` holding a
//! `SqlitePool`. [`DocumentStore`] implements all three traits in process
//! with 12-byte document ids; the SQL backend uses integer ids. Both report
//! ids as [`RecordId`].
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `NotFound` | Update/delete target or foreign key does not exist |
//! | `Conflict` | Unique constraint violation |
//! | `InvalidId` | A write received an id minted by the other backend |
//! | `Sqlx` | Unexpected database errors, propagated via `?` |
//! | `Internal` | Invalid stored data |
//!
//! Lookups return `Result<Option<T>>`; an id from the other backend simply
//! finds nothing.

pub mod application;
pub mod document;
pub mod error;
pub mod id;
pub mod migrations;
pub mod pool;
pub mod secret;
pub mod testing;
pub mod token;
pub mod types;

use chrono::{DateTime, Utc};

pub use application::{ApplicationRepository, ApplicationStore};
pub use document::DocumentStore;
pub use error::{DbError, Result};
pub use id::{DocumentId, ParseIdError, RecordId};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use secret::{SecretRepository, SecretStore, MAX_KEYS_PER_QUERY};
pub use token::{TokenRepository, TokenStore};
pub use types::{Application, SecretRecord, TokenRecord, TokenWithApplication};

/// SQLite rowid for a lookup, or `None` if no SQLite row can carry this id.
pub(crate) fn integer_id(id: &RecordId) -> Option<i64> {
	id.as_integer().and_then(|id| i64::try_from(id).ok())
}

pub(crate) fn require_integer_id(id: &RecordId) -> Result<i64> {
	integer_id(id).ok_or_else(|| DbError::InvalidId(id.to_string()))
}

pub(crate) fn parse_record_id(rowid: i64) -> Result<RecordId> {
	u64::try_from(rowid)
		.map(RecordId::Integer)
		.map_err(|_| DbError::Internal(format!("Invalid rowid: {rowid}")))
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}
