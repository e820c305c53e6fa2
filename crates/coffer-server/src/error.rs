// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use coffer_server_config::ConfigError;
use coffer_server_crypto::CryptoError;
use coffer_server_db::DbError;
use coffer_server_keys::KeysError;
use coffer_server_secrets::SecretsError;
use coffer_server_tokens::TokensError;
use thiserror::Error;

pub type CofferResult<T> = Result<T, CofferError>;

/// Errors surfaced by the [`Coffer`](crate::Coffer) context.
///
/// Uniqueness and existence failures from every layer collapse into
/// `AlreadyExists` and `NotFound`.
#[derive(Debug, Error)]
pub enum CofferError {
	#[error("already exists: {0}")]
	AlreadyExists(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("key error: {0}")]
	Keys(#[from] KeysError),

	#[error("crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("database error: {0}")]
	Database(DbError),

	#[error("token error: {0}")]
	Tokens(TokensError),
}

impl From<DbError> for CofferError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(msg) => CofferError::AlreadyExists(msg),
			DbError::NotFound(msg) => CofferError::NotFound(msg),
			other => CofferError::Database(other),
		}
	}
}

impl From<SecretsError> for CofferError {
	fn from(e: SecretsError) -> Self {
		match e {
			SecretsError::AlreadyExists(msg) => CofferError::AlreadyExists(msg),
			SecretsError::NotFound(msg) => CofferError::NotFound(msg),
			SecretsError::Crypto(e) => CofferError::Crypto(e),
			SecretsError::Database(e) => CofferError::Database(e),
		}
	}
}

impl From<TokensError> for CofferError {
	fn from(e: TokensError) -> Self {
		match e {
			TokensError::Database(e) => e.into(),
			other => CofferError::Tokens(other),
		}
	}
}
