// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the encryption engines.

use thiserror::Error;

/// Result type alias for encryption operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by [`Encryption`](crate::Encryption) implementations.
///
/// Authentication failures are always [`CryptoError::Decryption`], whatever
/// the cause (wrong key, tampered ciphertext, truncated tag).
#[derive(Debug, Error)]
pub enum CryptoError {
	#[error("destination buffer has wrong shape: expected length {expected_len} and capacity {expected_capacity}, got length {actual_len} and capacity {actual_capacity}")]
	BufferSize {
		expected_len: usize,
		expected_capacity: usize,
		actual_len: usize,
		actual_capacity: usize,
	},

	#[error("message is {actual} bytes, shorter than the {minimum} byte nonce")]
	MessageTooShort { minimum: usize, actual: usize },

	#[error("encryption failed")]
	Encryption,

	#[error("decryption failed")]
	Decryption,

	#[error("decrypted value is not valid UTF-8")]
	InvalidUtf8,

	#[error("key has to be {expected} bytes long")]
	KeyLength { expected: usize },

	#[error("failed to read key material: {0}")]
	KeyRead(#[source] std::io::Error),

	#[error("public key does not belong to the private key")]
	KeyMismatch,

	#[error("not enough bytes read from the random source")]
	Random,
}
