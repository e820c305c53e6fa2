// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	CacheConfigLayer, DatabaseConfigLayer, KeysConfigLayer, LoggingConfigLayer, StorageBackend,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/coffer/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: COFFER_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			keys: Some(load_keys_from_env()),
			cache: Some(load_cache_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	parse_usize(name, env_var(name))
}

fn parse_usize(name: &str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
	match value {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn parse_backend(name: &str, value: Option<String>) -> Result<Option<StorageBackend>, ConfigError> {
	value
		.map(|v| {
			v.parse().map_err(|message| ConfigError::InvalidValue {
				key: name.to_string(),
				message,
			})
		})
		.transpose()
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		backend: parse_backend(
			"COFFER_SERVER_DATABASE_BACKEND",
			env_var("COFFER_SERVER_DATABASE_BACKEND"),
		)?,
		url: env_var("COFFER_SERVER_DATABASE_URL"),
	})
}

fn load_keys_from_env() -> KeysConfigLayer {
	KeysConfigLayer {
		private_key: env_var("COFFER_SERVER_PRIVATE_KEY_PATH").map(PathBuf::from),
		public_key: env_var("COFFER_SERVER_PUBLIC_KEY_PATH").map(PathBuf::from),
		secret_key: env_var("COFFER_SERVER_SECRET_KEY_PATH").map(PathBuf::from),
	}
}

fn load_cache_from_env() -> Result<CacheConfigLayer, ConfigError> {
	Ok(CacheConfigLayer {
		secrets_capacity: env_usize("COFFER_SERVER_SECRETS_CACHE_CAPACITY")?,
		fill_queue_capacity: env_usize("COFFER_SERVER_CACHE_FILL_QUEUE_CAPACITY")?,
		tokens_capacity: env_usize("COFFER_SERVER_TOKENS_CACHE_CAPACITY")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("COFFER_SERVER_LOG_LEVEL"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.database.is_none());
		assert!(layer.keys.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/config.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_reads_sections() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[database]
backend = "document"

[keys]
secret_key = "/var/lib/coffer/secret.key"

[cache]
secrets_capacity = 16
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.database.unwrap().backend,
			Some(StorageBackend::Document)
		);
		assert_eq!(
			layer.keys.unwrap().secret_key,
			Some(PathBuf::from("/var/lib/coffer/secret.key"))
		);
		assert_eq!(layer.cache.unwrap().secrets_capacity, Some(16));
		assert!(layer.logging.is_none());
	}

	#[test]
	fn test_toml_source_parse_error_names_file() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "[cache]\nsecrets_capacity = \"lots\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
		assert!(err.to_string().contains(&file.path().display().to_string()));
	}

	#[test]
	fn test_parse_usize() {
		assert_eq!(parse_usize("X", Some("12".to_string())).unwrap(), Some(12));
		assert_eq!(parse_usize("X", None).unwrap(), None);
		let err = parse_usize("X", Some("-1".to_string())).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "X"));
	}

	#[test]
	fn test_parse_backend() {
		assert_eq!(
			parse_backend("B", Some("document".to_string())).unwrap(),
			Some(StorageBackend::Document)
		);
		assert!(parse_backend("B", Some("redis".to_string())).is_err());
	}
}
