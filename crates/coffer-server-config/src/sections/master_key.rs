// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key supplied directly through the environment.
//!
//! When `COFFER_SERVER_MASTER_KEY` (or `COFFER_SERVER_MASTER_KEY_FILE`) is
//! set, its base64 value is the master key and the key files are never
//! touched. It is deliberately not readable from the TOML file.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use coffer_common_secret::{Secret, SecretString};

use crate::error::ConfigError;

pub const MASTER_KEY_ENV: &str = "COFFER_SERVER_MASTER_KEY";
pub const MASTER_KEY_SIZE: usize = 32;

/// Decoded master key; redacted in `Debug` and zeroized on drop.
pub type MasterKeyBytes = Secret<[u8; MASTER_KEY_SIZE]>;

pub fn decode_master_key(encoded: &SecretString) -> Result<MasterKeyBytes, ConfigError> {
	let decoded = Secret::new(
		BASE64
			.decode(encoded.expose().trim().as_bytes())
			.map_err(|e| ConfigError::Validation(format!("{MASTER_KEY_ENV} is not valid base64: {e}")))?,
	);

	if decoded.expose().len() != MASTER_KEY_SIZE {
		return Err(ConfigError::Validation(format!(
			"{MASTER_KEY_ENV} must decode to {MASTER_KEY_SIZE} bytes, got {}",
			decoded.expose().len()
		)));
	}

	let mut key = [0u8; MASTER_KEY_SIZE];
	key.copy_from_slice(decoded.expose());
	Ok(Secret::new(key))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn encoded(bytes: &[u8]) -> SecretString {
		SecretString::new(BASE64.encode(bytes))
	}

	#[test]
	fn decodes_32_bytes() {
		let key = decode_master_key(&encoded(&[7u8; 32])).unwrap();
		assert_eq!(key.expose(), &[7u8; 32]);
	}

	#[test]
	fn surrounding_whitespace_is_ignored() {
		let value = SecretString::new(format!("  {}\n", BASE64.encode([1u8; 32])));
		assert!(decode_master_key(&value).is_ok());
	}

	#[test]
	fn rejects_invalid_base64() {
		let err = decode_master_key(&SecretString::new("not base64!".to_string())).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn debug_is_redacted() {
		let key = decode_master_key(&encoded(&[0xab; 32])).unwrap();
		assert!(!format!("{key:?}").contains("171, 171"));
	}

	proptest! {
		#[test]
		fn rejects_wrong_lengths(len in 0usize..96) {
			prop_assume!(len != MASTER_KEY_SIZE);
			let err = decode_master_key(&encoded(&vec![0u8; len])).unwrap_err();
			prop_assert!(err.to_string().contains("32 bytes"));
		}
	}
}
