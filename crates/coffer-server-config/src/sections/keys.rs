// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key file locations.

use std::path::PathBuf;

use serde::Deserialize;

fn default_private_key() -> PathBuf {
	PathBuf::from("./keys/private.key")
}

fn default_public_key() -> PathBuf {
	PathBuf::from("./keys/public.key")
}

fn default_secret_key() -> PathBuf {
	PathBuf::from("./keys/secret.key")
}

/// Paths of the keypair and the sealed master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysConfig {
	pub private_key: PathBuf,
	pub public_key: PathBuf,
	pub secret_key: PathBuf,
}

impl Default for KeysConfig {
	fn default() -> Self {
		Self {
			private_key: default_private_key(),
			public_key: default_public_key(),
			secret_key: default_secret_key(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfigLayer {
	#[serde(default)]
	pub private_key: Option<PathBuf>,
	#[serde(default)]
	pub public_key: Option<PathBuf>,
	#[serde(default)]
	pub secret_key: Option<PathBuf>,
}

impl KeysConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.private_key.is_some() {
			self.private_key = other.private_key;
		}
		if other.public_key.is_some() {
			self.public_key = other.public_key;
		}
		if other.secret_key.is_some() {
			self.secret_key = other.secret_key;
		}
	}

	pub fn finalize(self) -> KeysConfig {
		KeysConfig {
			private_key: self.private_key.unwrap_or_else(default_private_key),
			public_key: self.public_key.unwrap_or_else(default_public_key),
			secret_key: self.secret_key.unwrap_or_else(default_secret_key),
		}
	}
}
