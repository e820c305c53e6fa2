// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for secret operations.

use coffer_server_crypto::CryptoError;
use coffer_server_db::DbError;
use thiserror::Error;

/// Result type alias for secret operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

#[derive(Debug, Error)]
pub enum SecretsError {
	#[error("secret already exists: {0}")]
	AlreadyExists(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("database error: {0}")]
	Database(DbError),
}

impl From<DbError> for SecretsError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(msg) => SecretsError::AlreadyExists(msg),
			DbError::NotFound(msg) => SecretsError::NotFound(msg),
			other => SecretsError::Database(other),
		}
	}
}
