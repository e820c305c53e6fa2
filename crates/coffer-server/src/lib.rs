// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # coffer-server
//!
//! Wires configuration, key material, persistence and the secret and token
//! services into one [`Coffer`] context, and adds application
//! administration on top.
//!
//! ```ignore
//! let config = coffer_server_config::load_config()?;
//! let coffer = Coffer::open(&config).await?;
//!
//! let app = coffer.create_application("billing").await?;
//! coffer.secrets().create(&app.id, "DB_URL", "postgres://x").await?;
//! let token = coffer.tokens().generate(&app.id).await?;
//! ```

pub mod error;

use std::sync::Arc;

use coffer_server_config::{CacheConfig, ServerConfig, StorageBackend};
use coffer_server_crypto::{Encryption, SecretKeyEncryption};
use coffer_server_db::{
	create_pool, run_migrations, Application, ApplicationRepository, ApplicationStore,
	DocumentStore, RecordId, SecretRepository, SecretStore, TokenRepository, TokenStore,
};
use coffer_server_keys::{bootstrap, KeyPaths, MasterKey};
use coffer_server_secrets::{SecretsService, SecretsServiceConfig};
use coffer_server_tokens::TokenService;
use zeroize::Zeroizing;

pub use error::{CofferError, CofferResult};

/// One page of applications plus the total count.
#[derive(Debug, Clone)]
pub struct ApplicationPage {
	pub applications: Vec<Application>,
	pub total: i64,
}

/// The storage-facing halves of a backend.
pub struct Stores {
	pub applications: Arc<dyn ApplicationStore>,
	pub secrets: Arc<dyn SecretStore>,
	pub tokens: Arc<dyn TokenStore>,
}

impl Stores {
	pub async fn sqlite(database_url: &str) -> CofferResult<Self> {
		let pool = create_pool(database_url).await?;
		run_migrations(&pool).await?;

		Ok(Self {
			applications: Arc::new(ApplicationRepository::new(pool.clone())),
			secrets: Arc::new(SecretRepository::new(pool.clone())),
			tokens: Arc::new(TokenRepository::new(pool)),
		})
	}

	pub fn document() -> Self {
		let store = Arc::new(DocumentStore::new());
		Self {
			applications: store.clone(),
			secrets: store.clone(),
			tokens: store,
		}
	}
}

/// Shared process context. Cheap to wrap in an `Arc`; every method takes
/// `&self`.
pub struct Coffer {
	applications: Arc<dyn ApplicationStore>,
	secrets: SecretsService,
	tokens: TokenService,
}

impl Coffer {
	/// Resolve the master key, open the configured backend and start the
	/// services. Must run inside a tokio runtime.
	#[tracing::instrument(skip(config), fields(backend = %config.database.backend))]
	pub async fn open(config: &ServerConfig) -> CofferResult<Self> {
		let master_key = resolve_master_key(config)?;

		let stores = match config.database.backend {
			StorageBackend::Sqlite => Stores::sqlite(&config.database.url).await?,
			StorageBackend::Document => Stores::document(),
		};

		Ok(Self::new(stores, &master_key, &config.cache))
	}

	pub fn new(stores: Stores, master_key: &[u8; 32], cache: &CacheConfig) -> Self {
		let encryption: Arc<dyn Encryption> = Arc::new(SecretKeyEncryption::new(master_key));

		let secrets = SecretsService::new(
			stores.secrets,
			encryption,
			SecretsServiceConfig {
				cache_capacity: cache.secrets_capacity,
				fill_queue_capacity: cache.fill_queue_capacity,
			},
		);
		let tokens = TokenService::new(stores.tokens, cache.tokens_capacity);

		Self {
			applications: stores.applications,
			secrets,
			tokens,
		}
	}

	pub fn secrets(&self) -> &SecretsService {
		&self.secrets
	}

	pub fn tokens(&self) -> &TokenService {
		&self.tokens
	}

	#[tracing::instrument(skip(self))]
	pub async fn create_application(&self, name: &str) -> CofferResult<Application> {
		let name = validate_name(name)?;
		let app = self.applications.create_application(name).await?;
		tracing::info!(application_id = %app.id, "application created");
		Ok(app)
	}

	pub async fn get_application(&self, id: &RecordId) -> CofferResult<Application> {
		self.applications
			.get_application(id)
			.await?
			.ok_or_else(|| CofferError::NotFound(format!("application {id}")))
	}

	pub async fn get_application_by_name(&self, name: &str) -> CofferResult<Application> {
		self.applications
			.get_application_by_name(name)
			.await?
			.ok_or_else(|| CofferError::NotFound(format!("application {name}")))
	}

	/// Look an application up by id, falling back to its name.
	pub async fn resolve_application(&self, reference: &str) -> CofferResult<Application> {
		if let Ok(id) = reference.parse::<RecordId>() {
			if let Some(app) = self.applications.get_application(&id).await? {
				return Ok(app);
			}
		}
		self.get_application_by_name(reference).await
	}

	/// Pages are 1-based.
	pub async fn list_applications(&self, page: u32, per_page: u32) -> CofferResult<ApplicationPage> {
		if page == 0 || per_page == 0 {
			return Err(CofferError::InvalidInput(
				"page and per_page must be at least 1".to_string(),
			));
		}

		let offset = i64::from(page - 1) * i64::from(per_page);
		let (applications, total) = self
			.applications
			.list_applications(i64::from(per_page), offset)
			.await?;

		Ok(ApplicationPage {
			applications,
			total,
		})
	}

	#[tracing::instrument(skip(self), fields(application_id = %id))]
	pub async fn rename_application(&self, id: &RecordId, name: &str) -> CofferResult<Application> {
		let name = validate_name(name)?;
		let app = self.applications.rename_application(id, name).await?;
		self.tokens.evict_application(id).await;
		tracing::info!("application renamed");
		Ok(app)
	}

	/// Delete an application together with its secrets and tokens, and drop
	/// anything cached for it.
	#[tracing::instrument(skip(self), fields(application_id = %id))]
	pub async fn delete_application(&self, id: &RecordId) -> CofferResult<()> {
		let deleted = self.applications.delete_application(id).await?;

		self.secrets.invalidate_cache(id).await;
		self.tokens.evict_application(id).await;

		if !deleted {
			return Err(CofferError::NotFound(format!("application {id}")));
		}
		tracing::info!("application deleted");
		Ok(())
	}
}

/// The master key from configuration, or from the key files.
pub fn resolve_master_key(config: &ServerConfig) -> CofferResult<MasterKey> {
	if let Some(key) = &config.master_key {
		tracing::info!("using master key from environment");
		return Ok(Zeroizing::new(*key.expose()));
	}

	let paths = key_paths(config);
	Ok(bootstrap(&paths)?)
}

pub fn key_paths(config: &ServerConfig) -> KeyPaths {
	KeyPaths {
		private_key: config.keys.private_key.clone(),
		public_key: config.keys.public_key.clone(),
		secret_key: config.keys.secret_key.clone(),
	}
}

fn validate_name(name: &str) -> CofferResult<&str> {
	let name = name.trim();
	if name.is_empty() {
		return Err(CofferError::InvalidInput(
			"application name must not be empty".to_string(),
		));
	}
	Ok(name)
}
