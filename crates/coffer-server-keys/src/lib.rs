// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key bootstrap.
//!
//! A long-term X25519 keypair lives next to a sealed copy of the symmetric
//! master key:
//!
//! ```text
//! keys/
//!   private.key   32 raw bytes, 0700
//!   public.key    32 raw bytes, 0700
//!   secret.key    sealed box of the 32-byte master key, 0700
//! ```
//!
//! The first run generates all three files. Later runs unseal `secret.key`
//! and return the same master key.

mod error;

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use coffer_server_crypto::{
	generate_key, generate_keypair, Encryption, PublicKeyEncryption, KEY_SIZE,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

pub use error::{KeysError, KeysResult};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

/// Owner-only permissions for key files and the directories holding them.
#[cfg(unix)]
const KEY_MODE: u32 = 0o700;

/// The plaintext master key. Zeroized on drop.
pub type MasterKey = Zeroizing<[u8; KEY_SIZE]>;

/// Locations of the three key files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
	pub private_key: PathBuf,
	pub public_key: PathBuf,
	pub secret_key: PathBuf,
}

impl KeyPaths {
	/// The conventional layout inside one directory.
	pub fn in_dir(dir: impl AsRef<Path>) -> Self {
		let dir = dir.as_ref();
		Self {
			private_key: dir.join("private.key"),
			public_key: dir.join("public.key"),
			secret_key: dir.join("secret.key"),
		}
	}
}

/// Load the master key, creating any missing key material first.
///
/// Fails if exactly one half of the keypair exists: regenerating the missing
/// half would orphan the sealed master key.
#[tracing::instrument(skip(paths), fields(secret_key = %paths.secret_key.display()))]
pub fn bootstrap(paths: &KeyPaths) -> KeysResult<MasterKey> {
	let private_path = absolute(&paths.private_key)?;
	let public_path = absolute(&paths.public_key)?;
	let secret_path = absolute(&paths.secret_key)?;

	match (is_file(&private_path), is_file(&public_path)) {
		(true, true) => {}
		(true, false) => {
			return Err(KeysError::PublicKeyMissing { path: public_path });
		}
		(false, true) => {
			return Err(KeysError::PrivateKeyMissing { path: private_path });
		}
		(false, false) => create_keypair(&private_path, &public_path)?,
	}

	let engine = open_keypair(&private_path, &public_path)?;

	if is_file(&secret_path) {
		load_master_key(&engine, &secret_path)
	} else {
		create_master_key(&engine, &secret_path)
	}
}

/// Short SHA-256 fingerprint of the public key on disk, for operators.
pub fn public_key_fingerprint(paths: &KeyPaths) -> KeysResult<String> {
	let path = absolute(&paths.public_key)?;
	let mut public = [0u8; 32];
	File::open(&path)
		.and_then(|mut file| file.read_exact(&mut public))
		.map_err(KeysError::io(&path))?;
	Ok(fingerprint(&public))
}

fn fingerprint(public_key: &[u8]) -> String {
	hex::encode(&Sha256::digest(public_key)[..8])
}

fn create_keypair(private_path: &Path, public_path: &Path) -> KeysResult<()> {
	let (public, private) = generate_keypair()?;

	write_key_file(private_path, private.as_ref())?;
	write_key_file(public_path, &public)?;

	tracing::info!(
		private_key = %private_path.display(),
		public_key = %public_path.display(),
		fingerprint = %fingerprint(&public),
		"generated key pair"
	);
	Ok(())
}

fn open_keypair(private_path: &Path, public_path: &Path) -> KeysResult<PublicKeyEncryption> {
	let private = File::open(private_path).map_err(KeysError::io(private_path))?;
	let public = File::open(public_path).map_err(KeysError::io(public_path))?;
	Ok(PublicKeyEncryption::from_readers(public, private)?)
}

fn load_master_key(engine: &PublicKeyEncryption, path: &Path) -> KeysResult<MasterKey> {
	let sealed = fs::read(path).map_err(KeysError::io(path))?;
	let plaintext = Zeroizing::new(engine.decrypt(None, &sealed)?);

	if plaintext.len() != KEY_SIZE {
		return Err(KeysError::InvalidKeyMaterial {
			path: path.to_path_buf(),
			expected: KEY_SIZE,
			actual: plaintext.len(),
		});
	}

	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	key.copy_from_slice(&plaintext);
	tracing::debug!(path = %path.display(), "loaded master key");
	Ok(key)
}

fn create_master_key(engine: &PublicKeyEncryption, path: &Path) -> KeysResult<MasterKey> {
	let key = generate_key()?;
	let sealed = engine.encrypt(None, key.as_ref())?;
	write_key_file(path, &sealed)?;

	tracing::info!(path = %path.display(), "generated master key");
	Ok(key)
}

fn write_key_file(path: &Path, bytes: &[u8]) -> KeysResult<()> {
	if let Some(parent) = path.parent() {
		let mut builder = DirBuilder::new();
		builder.recursive(true);
		#[cfg(unix)]
		builder.mode(KEY_MODE);
		builder.create(parent).map_err(KeysError::io(parent))?;
	}

	let mut options = OpenOptions::new();
	options.write(true).create_new(true);
	#[cfg(unix)]
	options.mode(KEY_MODE);

	let mut file = options.open(path).map_err(KeysError::io(path))?;
	file.write_all(bytes).map_err(KeysError::io(path))?;
	file.sync_all().map_err(KeysError::io(path))?;
	Ok(())
}

fn absolute(path: &Path) -> KeysResult<PathBuf> {
	if path.is_absolute() {
		return Ok(path.to_path_buf());
	}
	let cwd = std::env::current_dir().map_err(KeysError::io(path))?;
	Ok(cwd.join(path))
}

/// A directory at a key path is not a key.
fn is_file(path: &Path) -> bool {
	fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}
