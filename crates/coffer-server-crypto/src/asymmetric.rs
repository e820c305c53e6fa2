// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous sealed-box engine (X25519 + XSalsa20-Poly1305).
//!
//! Sealing needs only the public key; the sender is not authenticated.
//! Opening needs the private key. Used to wrap the master key on disk.

use std::io::Read;

use crypto_box::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::{append_plaintext, Encryption};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Generate a fresh X25519 keypair as raw `(public, private)` bytes.
pub fn generate_keypair() -> CryptoResult<([u8; PUBLIC_KEY_SIZE], Zeroizing<[u8; PRIVATE_KEY_SIZE]>)> {
	let secret = SecretKey::generate(&mut OsRng);
	let public = *secret.public_key().as_bytes();
	Ok((public, Zeroizing::new(secret.to_bytes())))
}

pub struct PublicKeyEncryption {
	public_key: PublicKey,
	private_key: SecretKey,
}

impl PublicKeyEncryption {
	/// Build from raw key bytes. The public key must be the one derived from
	/// the private key.
	pub fn new(
		public_key: [u8; PUBLIC_KEY_SIZE],
		private_key: [u8; PRIVATE_KEY_SIZE],
	) -> CryptoResult<Self> {
		let private_key = SecretKey::from(private_key);
		let public_key = PublicKey::from(public_key);

		if private_key.public_key().as_bytes() != public_key.as_bytes() {
			return Err(CryptoError::KeyMismatch);
		}

		Ok(Self {
			public_key,
			private_key,
		})
	}

	/// Build from two readers that each yield at least 32 bytes of key material.
	pub fn from_readers(mut public_key: impl Read, mut private_key: impl Read) -> CryptoResult<Self> {
		let public = read_key::<PUBLIC_KEY_SIZE>(&mut public_key)?;
		let private = read_key::<PRIVATE_KEY_SIZE>(&mut private_key)?;
		Self::new(*public, *private)
	}

	pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
		self.public_key.as_bytes()
	}
}

impl std::fmt::Debug for PublicKeyEncryption {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PublicKeyEncryption")
			.field("public_key", &hex::encode(&self.public_key.as_bytes()[..4]))
			.finish_non_exhaustive()
	}
}

impl Encryption for PublicKeyEncryption {
	fn encrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>> {
		let sealed = self
			.public_key
			.seal(&mut OsRng, msg)
			.map_err(|_| CryptoError::Encryption)?;

		Ok(match dst {
			None => sealed,
			Some(mut out) => {
				out.extend_from_slice(&sealed);
				out
			}
		})
	}

	fn decrypt(&self, dst: Option<Vec<u8>>, msg: &[u8]) -> CryptoResult<Vec<u8>> {
		let plaintext = self
			.private_key
			.unseal(msg)
			.map_err(|_| CryptoError::Decryption)?;

		Ok(append_plaintext(dst, plaintext))
	}
}

fn read_key<const N: usize>(reader: &mut impl Read) -> CryptoResult<Zeroizing<[u8; N]>> {
	let mut key = Zeroizing::new([0u8; N]);
	reader.read_exact(key.as_mut()).map_err(|e| match e.kind() {
		std::io::ErrorKind::UnexpectedEof => CryptoError::KeyLength { expected: N },
		_ => CryptoError::KeyRead(e),
	})?;
	Ok(key)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Cursor;

	fn engine() -> PublicKeyEncryption {
		let (public, private) = generate_keypair().unwrap();
		PublicKeyEncryption::new(public, *private).unwrap()
	}

	#[test]
	fn roundtrip() {
		let engine = engine();
		let sealed = engine.encrypt(None, b"master key bytes").unwrap();
		assert_eq!(engine.decrypt(None, &sealed).unwrap(), b"master key bytes");
	}

	#[test]
	fn sealing_is_randomised() {
		let engine = engine();
		let a = engine.encrypt(None, b"same").unwrap();
		let b = engine.encrypt(None, b"same").unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn other_keypair_cannot_open() {
		let a = engine();
		let b = engine();
		let sealed = a.encrypt(None, b"for a only").unwrap();
		assert!(matches!(b.decrypt(None, &sealed), Err(CryptoError::Decryption)));
	}

	#[test]
	fn garbage_and_short_input_error_without_panicking() {
		let engine = engine();
		for len in [0usize, 1, 31, 32, 47, 48, 64] {
			assert!(engine.decrypt(None, &vec![7u8; len]).is_err());
		}
	}

	#[test]
	fn mismatched_keys_are_rejected() {
		let (public, _) = generate_keypair().unwrap();
		let (_, private) = generate_keypair().unwrap();
		assert!(matches!(
			PublicKeyEncryption::new(public, *private),
			Err(CryptoError::KeyMismatch)
		));
	}

	#[test]
	fn readers_must_supply_full_keys() {
		let (public, private) = generate_keypair().unwrap();

		let ok = PublicKeyEncryption::from_readers(Cursor::new(public), Cursor::new(*private));
		assert!(ok.is_ok());

		let short = PublicKeyEncryption::from_readers(Cursor::new(&public[..16]), Cursor::new(*private));
		assert!(matches!(short, Err(CryptoError::KeyLength { expected: 32 })));
	}

	#[test]
	fn debug_does_not_print_private_key() {
		let engine = engine();
		let debug = format!("{engine:?}");
		assert!(debug.contains("PublicKeyEncryption"));
		assert!(!debug.contains("private_key"));
	}

	#[test]
	fn debug_shows_public_key_fingerprint() {
		let engine = engine();
		let debug = format!("{engine:?}");
		let fingerprint = hex::encode(&engine.public_key()[..4]);
		assert_eq!(fingerprint.len(), 8);
		assert!(debug.contains(&format!("public_key: \"{fingerprint}\"")), "{debug}");
		assert!(!debug.contains(&hex::encode(engine.public_key())));
	}

	proptest! {
		#[test]
		fn prop_roundtrip(msg in proptest::collection::vec(any::<u8>(), 0..512)) {
			let engine = engine();
			let sealed = engine.encrypt(None, &msg).unwrap();
			prop_assert_eq!(engine.decrypt(None, &sealed).unwrap(), msg);
		}

		#[test]
		fn prop_tampering_fails(msg in proptest::collection::vec(any::<u8>(), 1..128), idx in any::<usize>()) {
			let engine = engine();
			let mut sealed = engine.encrypt(None, &msg).unwrap();
			let idx = idx % sealed.len();
			sealed[idx] ^= 0x80;
			prop_assert!(engine.decrypt(None, &sealed).is_err());
		}
	}
}
