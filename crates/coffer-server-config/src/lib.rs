// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Coffer server.
//!
//! Layered from built-in defaults, a TOML file (`/etc/coffer/server.toml` or
//! an explicit path) and `COFFER_SERVER_*` environment variables, in that
//! order of increasing precedence.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! url = "sqlite:/var/lib/coffer/coffer.db"
//!
//! [keys]
//! private_key = "/var/lib/coffer/keys/private.key"
//! public_key = "/var/lib/coffer/keys/public.key"
//! secret_key = "/var/lib/coffer/keys/secret.key"
//!
//! [cache]
//! secrets_capacity = 4096
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use coffer_common_secret::SecretString;
use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub keys: KeysConfig,
	pub cache: CacheConfig,
	pub logging: LoggingConfig,
	/// Set only when supplied through the environment; otherwise the master
	/// key comes from the key files.
	pub master_key: Option<MasterKeyBytes>,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`COFFER_SERVER_*`)
/// 2. Config file (`/etc/coffer/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let master_key =
		load_secret_env(MASTER_KEY_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;
	finalize(merged, master_key)
}

/// Resolve a merged layer. `master_key` is the raw base64 value, if any.
pub fn finalize(
	layer: ServerConfigLayer,
	master_key: Option<SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let keys = layer.keys.unwrap_or_default().finalize();
	let cache = layer.cache.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let master_key = master_key.as_ref().map(decode_master_key).transpose()?;

	validate_config(&database, &cache)?;

	info!(
		backend = %database.backend,
		database = %database.url,
		secret_key = %keys.secret_key.display(),
		secrets_cache = cache.secrets_capacity,
		tokens_cache = cache.tokens_capacity,
		master_key_from_env = master_key.is_some(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		keys,
		cache,
		logging,
		master_key,
	})
}

fn validate_config(database: &DatabaseConfig, cache: &CacheConfig) -> Result<(), ConfigError> {
	if database.backend == StorageBackend::Sqlite && database.url.trim().is_empty() {
		return Err(ConfigError::Validation(
			"database.url must be set when database.backend is sqlite".to_string(),
		));
	}

	if cache.fill_queue_capacity == 0 {
		return Err(ConfigError::Validation(
			"cache.fill_queue_capacity must be at least 1".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn test_finalize_defaults() {
		let config = finalize(ServerConfigLayer::default(), None).unwrap();
		assert_eq!(config.database.backend, StorageBackend::Sqlite);
		assert_eq!(config.database.url, "sqlite:./coffer.db");
		assert_eq!(config.cache.secrets_capacity, 4096);
		assert_eq!(config.logging.level, "info");
		assert!(config.master_key.is_none());
	}

	#[test]
	fn test_finalize_decodes_master_key() {
		let encoded = SecretString::new(BASE64.encode([9u8; 32]));
		let config = finalize(ServerConfigLayer::default(), Some(encoded)).unwrap();
		assert_eq!(config.master_key.unwrap().expose(), &[9u8; 32]);
	}

	#[test]
	fn test_finalize_rejects_short_master_key() {
		let encoded = SecretString::new(BASE64.encode([9u8; 16]));
		let err = finalize(ServerConfigLayer::default(), Some(encoded)).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_empty_sqlite_url_is_invalid() {
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("  ".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(
			finalize(layer, None),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_document_backend_ignores_url() {
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				backend: Some(StorageBackend::Document),
				url: Some(String::new()),
			}),
			..Default::default()
		};
		assert!(finalize(layer, None).is_ok());
	}

	#[test]
	fn test_zero_fill_queue_is_invalid() {
		let layer = ServerConfigLayer {
			cache: Some(CacheConfigLayer {
				fill_queue_capacity: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer, None).unwrap_err();
		assert!(err.to_string().contains("fill_queue_capacity"));
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "[cache]\ntokens_capacity = 7\n[logging]\nlevel = \"debug\"").unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let mut merged = DefaultsSource.load().unwrap();
		merged.merge(layer);

		let config = finalize(merged, None).unwrap();
		assert_eq!(config.cache.tokens_capacity, 7);
		assert_eq!(config.cache.secrets_capacity, 4096);
		assert_eq!(config.logging.level, "debug");
	}

	#[test]
	fn test_debug_does_not_print_master_key() {
		let encoded = SecretString::new(BASE64.encode([0x5a; 32]));
		let config = finalize(ServerConfigLayer::default(), Some(encoded)).unwrap();
		assert!(!format!("{config:?}").contains("90, 90"));
	}
}
