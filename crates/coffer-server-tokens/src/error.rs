// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use coffer_server_db::DbError;
use thiserror::Error;

pub type TokensResult<T> = Result<T, TokensError>;

/// Errors from token issuance. Verification never errors.
#[derive(Debug, Error)]
pub enum TokensError {
	#[error("database error: {0}")]
	Database(#[from] DbError),

	#[error("not enough bytes read from the random source")]
	Random,
}
