// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database configuration.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:./coffer.db";

/// Which persistence implementation backs the stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
	/// SQLite via sqlx; integer record ids.
	#[default]
	Sqlite,
	/// In-process document store; 12-byte document ids. Not persistent.
	Document,
}

impl fmt::Display for StorageBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StorageBackend::Sqlite => f.write_str("sqlite"),
			StorageBackend::Document => f.write_str("document"),
		}
	}
}

impl FromStr for StorageBackend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"sqlite" => Ok(StorageBackend::Sqlite),
			"document" => Ok(StorageBackend::Document),
			other => Err(format!("unknown storage backend '{other}'")),
		}
	}
}

/// Database configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub backend: StorageBackend,
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			backend: StorageBackend::default(),
			url: DEFAULT_URL.to_string(),
		}
	}
}

/// Database configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub backend: Option<StorageBackend>,
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			backend: self.backend.unwrap_or_default(),
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = DatabaseConfigLayer::default().finalize();
		assert_eq!(config.backend, StorageBackend::Sqlite);
		assert_eq!(config.url, "sqlite:./coffer.db");
	}

	#[test]
	fn test_custom_values() {
		let layer = DatabaseConfigLayer {
			backend: Some(StorageBackend::Document),
			url: Some("sqlite:/var/lib/coffer/data.db".to_string()),
		};
		let config = layer.finalize();
		assert_eq!(config.backend, StorageBackend::Document);
		assert_eq!(config.url, "sqlite:/var/lib/coffer/data.db");
	}

	#[test]
	fn test_backend_from_str() {
		assert_eq!("SQLite".parse::<StorageBackend>(), Ok(StorageBackend::Sqlite));
		assert_eq!("document".parse::<StorageBackend>(), Ok(StorageBackend::Document));
		assert!("mongo".parse::<StorageBackend>().is_err());
	}

	#[test]
	fn test_deserialize_backend() {
		let layer: DatabaseConfigLayer = toml::from_str(r#"backend = "document""#).unwrap();
		assert_eq!(layer.backend, Some(StorageBackend::Document));
		assert!(layer.url.is_none());
	}

	#[test]
	fn test_deserialize_unknown_backend_fails() {
		assert!(toml::from_str::<DatabaseConfigLayer>(r#"backend = "mongo""#).is_err());
	}
}
