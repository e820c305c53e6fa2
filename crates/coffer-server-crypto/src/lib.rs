// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Encryption engines for Coffer.
//!
//! Two interchangeable implementations of [`Encryption`]:
//!
//! - [`SecretKeyEncryption`]: XChaCha20-Poly1305 under the 32-byte master key.
//!   Protects every stored secret value.
//! - [`PublicKeyEncryption`]: anonymous X25519 sealed boxes. Protects the
//!   master key file at rest.
//!
//! Both engines are stateless apart from their keys and are safe to share
//! between tasks.

pub mod asymmetric;
pub mod error;
pub mod symmetric;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

pub use asymmetric::{generate_keypair, PublicKeyEncryption, PUBLIC_KEY_SIZE, PRIVATE_KEY_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use symmetric::{SecretKeyEncryption, NONCE_SIZE, TAG_SIZE};

/// Size of the symmetric master key in bytes.
pub const KEY_SIZE: usize = 32;

/// Common capability set of both engines.
///
/// `dst` mirrors the append-style buffer convention: `None` always allocates
/// fresh output, `Some(buf)` is extended in place and returned.
pub trait Encryption: Send + Sync {
	/// Encrypt `msg`, writing the result into `dst`.
	fn encrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>>;

	/// Decrypt `msg`, appending the plaintext to `dst`.
	fn decrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>>;

	fn encrypt_string(&self, msg: &str) -> CryptoResult<Vec<u8>> {
		self.encrypt(None, msg.as_bytes())
	}

	fn decrypt_string(&self, msg: &[u8]) -> CryptoResult<String> {
		let plaintext = self.decrypt(None, msg)?;
		String::from_utf8(plaintext).map_err(|e| {
			let mut bytes = e.into_bytes();
			bytes.zeroize();
			CryptoError::InvalidUtf8
		})
	}
}

/// Generate a random 32-byte symmetric key.
pub fn generate_key() -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng
		.try_fill_bytes(key.as_mut())
		.map_err(|_| CryptoError::Random)?;
	Ok(key)
}

/// Append `plaintext` to the caller's buffer, or hand it back as-is.
pub(crate) fn append_plaintext(dst: Option<Vec<u8>>, plaintext: Vec<u8>) -> Vec<u8> {
	match dst {
		None => plaintext,
		Some(mut out) => {
			let mut plaintext = Zeroizing::new(plaintext);
			out.extend_from_slice(&plaintext);
			plaintext.zeroize();
			out
		}
	}
}
