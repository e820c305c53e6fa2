// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use coffer_server_crypto::CryptoError;
use thiserror::Error;

pub type KeysResult<T> = Result<T, KeysError>;

/// Errors raised while bootstrapping key material. All of them are fatal to
/// startup.
#[derive(Debug, Error)]
pub enum KeysError {
	#[error("private key {path} does not exist but the public key does")]
	PrivateKeyMissing { path: PathBuf },

	#[error("public key {path} does not exist but the private key does")]
	PublicKeyMissing { path: PathBuf },

	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Crypto(#[from] CryptoError),

	#[error("master key in {path} must be {expected} bytes, got {actual}")]
	InvalidKeyMaterial {
		path: PathBuf,
		expected: usize,
		actual: usize,
	},
}

impl KeysError {
	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();
		move |source| KeysError::Io { path, source }
	}
}
