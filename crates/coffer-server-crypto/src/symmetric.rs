// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! XChaCha20-Poly1305 engine keyed by the master key.
//!
//! Ciphertext layout is `nonce (24) || ciphertext || tag (16)`. Nonces are
//! 192-bit draws from the OS CSPRNG, so random nonces are safe for the
//! lifetime of a single master key.

use chacha20poly1305::aead::{Aead, AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::{append_plaintext, Encryption, KEY_SIZE};

/// Size of the extended nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Authenticated symmetric encryption for secret values.
#[derive(Clone)]
pub struct SecretKeyEncryption {
	cipher: XChaCha20Poly1305,
}

impl SecretKeyEncryption {
	pub fn new(key: &[u8; KEY_SIZE]) -> Self {
		Self {
			cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
		}
	}

	/// Build from an arbitrary slice, rejecting anything but 32 bytes.
	pub fn from_slice(key: &[u8]) -> CryptoResult<Self> {
		let cipher = XChaCha20Poly1305::new_from_slice(key)
			.map_err(|_| CryptoError::KeyLength { expected: KEY_SIZE })?;
		Ok(Self { cipher })
	}

	/// Exact capacity `encrypt` expects of a caller-supplied buffer.
	pub fn sealed_len(msg_len: usize) -> usize {
		NONCE_SIZE + msg_len + TAG_SIZE
	}

	/// A buffer shaped the way `encrypt` requires for a message of `msg_len` bytes.
	pub fn buffer_for(msg_len: usize) -> Vec<u8> {
		let mut dst = Vec::with_capacity(Self::sealed_len(msg_len));
		dst.resize(NONCE_SIZE, 0);
		dst
	}
}

impl std::fmt::Debug for SecretKeyEncryption {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretKeyEncryption").finish_non_exhaustive()
	}
}

impl Encryption for SecretKeyEncryption {
	/// `dst` must have length [`NONCE_SIZE`] and capacity
	/// `NONCE_SIZE + msg.len() + TAG_SIZE`; anything else is rejected before a
	/// single byte is written.
	fn encrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>> {
		let required = Self::sealed_len(msg.len());
		let mut dst = match dst {
			Some(dst) => dst,
			None => Self::buffer_for(msg.len()),
		};

		if dst.len() != NONCE_SIZE || dst.capacity() != required {
			return Err(CryptoError::BufferSize {
				expected_len: NONCE_SIZE,
				expected_capacity: required,
				actual_len: dst.len(),
				actual_capacity: dst.capacity(),
			});
		}

		OsRng
			.try_fill_bytes(&mut dst)
			.map_err(|_| CryptoError::Random)?;

		dst.extend_from_slice(msg);
		let (nonce, body) = dst.split_at_mut(NONCE_SIZE);
		let tag = self
			.cipher
			.encrypt_in_place_detached(XNonce::from_slice(nonce), &[], body)
			.map_err(|_| CryptoError::Encryption)?;
		dst.extend_from_slice(&tag);

		Ok(dst)
	}

	fn decrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>> {
		if msg.len() < NONCE_SIZE {
			return Err(CryptoError::MessageTooShort {
				minimum: NONCE_SIZE,
				actual: msg.len(),
			});
		}

		let (nonce, ciphertext) = msg.split_at(NONCE_SIZE);
		let plaintext = self
			.cipher
			.decrypt(XNonce::from_slice(nonce), ciphertext)
			.map_err(|_| CryptoError::Decryption)?;

		Ok(append_plaintext(dst, plaintext))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::generate_key;
	use proptest::prelude::*;

	fn engine() -> SecretKeyEncryption {
		SecretKeyEncryption::new(&generate_key().unwrap())
	}

	#[test]
	fn roundtrip_through_caller_buffer() {
		let engine = engine();
		let msg = b"postgres://x";

		let sealed = engine
			.encrypt(Some(SecretKeyEncryption::buffer_for(msg.len())), msg)
			.unwrap();
		assert_eq!(sealed.len(), NONCE_SIZE + msg.len() + TAG_SIZE);
		assert_eq!(engine.decrypt(None, &sealed).unwrap(), msg);
	}

	#[test]
	fn empty_message_roundtrips() {
		let engine = engine();
		let sealed = engine.encrypt(None, b"").unwrap();
		assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
		assert!(engine.decrypt(None, &sealed).unwrap().is_empty());
	}

	#[test]
	fn undersized_capacity_is_rejected() {
		let engine = engine();
		let mut dst = Vec::with_capacity(NONCE_SIZE + 2);
		dst.resize(NONCE_SIZE, 0);

		let result = engine.encrypt(Some(dst), b"longer than two bytes");
		assert!(matches!(result, Err(CryptoError::BufferSize { .. })));
	}

	#[test]
	fn wrong_prefix_length_is_rejected() {
		let engine = engine();
		let msg = b"value";
		let dst = Vec::with_capacity(SecretKeyEncryption::sealed_len(msg.len()));

		let result = engine.encrypt(Some(dst), msg);
		assert!(matches!(result, Err(CryptoError::BufferSize { actual_len: 0, .. })));
	}

	#[test]
	fn short_message_is_an_error() {
		let engine = engine();
		for len in 0..NONCE_SIZE {
			let result = engine.decrypt(None, &vec![0u8; len]);
			assert!(matches!(result, Err(CryptoError::MessageTooShort { .. })));
		}
	}

	#[test]
	fn nonce_only_message_fails_authentication() {
		let engine = engine();
		let result = engine.decrypt(None, &[0u8; NONCE_SIZE]);
		assert!(matches!(result, Err(CryptoError::Decryption)));
	}

	#[test]
	fn wrong_key_and_tampering_share_one_error() {
		let engine = engine();
		let other = self::engine();
		let mut sealed = engine.encrypt_string("secret").unwrap();

		let wrong_key = other.decrypt(None, &sealed).unwrap_err();
		sealed[NONCE_SIZE] ^= 0x01;
		let tampered = engine.decrypt(None, &sealed).unwrap_err();

		assert_eq!(wrong_key.to_string(), tampered.to_string());
		assert!(matches!(wrong_key, CryptoError::Decryption));
		assert!(matches!(tampered, CryptoError::Decryption));
	}

	#[test]
	fn from_slice_checks_length() {
		assert!(SecretKeyEncryption::from_slice(&[0u8; 16]).is_err());
		assert!(SecretKeyEncryption::from_slice(&[0u8; KEY_SIZE]).is_ok());
	}

	proptest! {
		#[test]
		fn prop_roundtrip(msg in ".{0,512}") {
			let engine = engine();
			let sealed = engine.encrypt_string(&msg).unwrap();
			prop_assert_eq!(engine.decrypt_string(&sealed).unwrap(), msg);
		}

		#[test]
		fn prop_same_plaintext_differs(msg in proptest::collection::vec(any::<u8>(), 0..256)) {
			let engine = engine();
			let a = engine.encrypt(None, &msg).unwrap();
			let b = engine.encrypt(None, &msg).unwrap();
			prop_assert_ne!(&a[..NONCE_SIZE], &b[..NONCE_SIZE]);
			prop_assert_ne!(a, b);
		}

		#[test]
		fn prop_bad_capacity_errors(
			msg in proptest::collection::vec(any::<u8>(), 1..256),
			delta in 1usize..64,
			grow in any::<bool>(),
		) {
			let engine = engine();
			let required = SecretKeyEncryption::sealed_len(msg.len());
			let capacity = if grow { required + delta } else { required.saturating_sub(delta).max(NONCE_SIZE) };
			prop_assume!(capacity != required);

			let mut dst = Vec::with_capacity(capacity);
			dst.resize(NONCE_SIZE, 0);
			prop_assume!(dst.capacity() != required);

			let result = engine.encrypt(Some(dst), &msg);
			prop_assert!(
				matches!(result, Err(CryptoError::BufferSize { .. })),
				"expected BufferSize error"
			);
		}

		#[test]
		fn prop_flipped_bit_fails(
			msg in proptest::collection::vec(any::<u8>(), 1..256),
			idx in any::<usize>(),
			bit in 0u8..8,
		) {
			let engine = engine();
			let mut sealed = engine.encrypt(None, &msg).unwrap();
			let idx = idx % sealed.len();
			sealed[idx] ^= 1 << bit;
			prop_assert!(engine.decrypt(None, &sealed).is_err());
		}
	}
}
