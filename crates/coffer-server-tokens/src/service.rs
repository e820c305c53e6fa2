// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use coffer_common_secret::SecretString;
use coffer_server_db::{Application, DbError, RecordId, TokenStore, TokenWithApplication};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::error::{TokensError, TokensResult};
use crate::format::{digest, format_token, parse_token, SECRET_LEN};

pub const DEFAULT_TOKEN_CACHE_CAPACITY: usize = 1024;

/// Cached token rows plus an epoch that every eviction advances. A fill is
/// only applied if the epoch it was read under is still current.
#[derive(Default)]
struct TokenCache {
	entries: HashMap<RecordId, TokenWithApplication>,
	epoch: u64,
}

/// Issues bearer tokens and resolves them back to applications.
pub struct TokenService {
	store: Arc<dyn TokenStore>,
	cache: RwLock<TokenCache>,
	cache_capacity: usize,
}

impl TokenService {
	pub fn new(store: Arc<dyn TokenStore>, cache_capacity: usize) -> Self {
		Self {
			store,
			cache: RwLock::new(TokenCache::default()),
			cache_capacity,
		}
	}

	/// Issue a token for an application. Only the digest is persisted; the
	/// returned token cannot be recovered later.
	#[tracing::instrument(skip(self), fields(application_id = %application_id))]
	pub async fn generate(&self, application_id: &RecordId) -> TokensResult<SecretString> {
		let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
		OsRng
			.try_fill_bytes(secret.as_mut())
			.map_err(|_| TokensError::Random)?;

		let record = self
			.store
			.create_token(application_id, &digest(secret.as_ref()))
			.await?;

		tracing::info!(token_id = %record.id, "token issued");
		Ok(SecretString::new(format_token(&record.id, secret.as_ref())))
	}

	/// The application a token belongs to, or `None` if the token is not
	/// valid for any reason.
	///
	/// Malformed tokens are rejected before any persistence access. The
	/// digest comparison is constant-time.
	#[tracing::instrument(skip_all)]
	pub async fn verify(&self, token: &str) -> Option<Application> {
		let Some(parsed) = parse_token(token) else {
			tracing::warn!("rejected malformed token");
			return None;
		};

		let record = match self.lookup(&parsed.id).await {
			Ok(Some(record)) => record,
			Ok(None) => {
				tracing::warn!(token_id = %parsed.id, "rejected unknown token");
				return None;
			}
			Err(e) => {
				tracing::warn!(token_id = %parsed.id, error = %e, "token lookup failed");
				return None;
			}
		};

		let presented = digest(&parsed.secret);
		if bool::from(presented[..].ct_eq(record.token.value.as_slice())) {
			Some(record.application)
		} else {
			tracing::warn!(token_id = %parsed.id, "rejected token with wrong secret");
			None
		}
	}

	/// Forget cached tokens of an application after it is renamed or
	/// deleted. Lookups already in flight will not cache what they read.
	pub async fn evict_application(&self, application_id: &RecordId) {
		let mut cache = self.cache.write().await;
		cache.epoch += 1;
		cache
			.entries
			.retain(|_, entry| entry.application.id != *application_id);
	}

	async fn lookup(&self, id: &RecordId) -> Result<Option<TokenWithApplication>, DbError> {
		let epoch = {
			let cache = self.cache.read().await;
			if let Some(entry) = cache.entries.get(id) {
				return Ok(Some(entry.clone()));
			}
			cache.epoch
		};

		let Some(entry) = self.store.get_token_with_application(id).await? else {
			return Ok(None);
		};

		let mut cache = self.cache.write().await;
		if cache.epoch != epoch {
			tracing::debug!(token_id = %id, "dropping stale token cache fill");
		} else if cache.entries.len() < self.cache_capacity {
			cache.entries.insert(*id, entry.clone());
		}
		Ok(Some(entry))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
	use coffer_server_db::testing::{create_test_application, create_test_pool};
	use coffer_server_db::{ApplicationStore, DocumentStore, TokenRecord, TokenRepository};
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::sync::Notify;

	struct CountingStore<S> {
		inner: S,
		calls: AtomicUsize,
	}

	impl<S> CountingStore<S> {
		fn new(inner: S) -> Arc<Self> {
			Arc::new(Self {
				inner,
				calls: AtomicUsize::new(0),
			})
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl<S: TokenStore> TokenStore for CountingStore<S> {
		async fn create_token(
			&self,
			application_id: &RecordId,
			digest: &[u8],
		) -> coffer_server_db::Result<TokenRecord> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.inner.create_token(application_id, digest).await
		}

		async fn get_token_with_application(
			&self,
			id: &RecordId,
		) -> coffer_server_db::Result<Option<TokenWithApplication>> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.inner.get_token_with_application(id).await
		}
	}

	/// Pauses every token read after it has fetched its row, until released.
	struct GatedStore {
		inner: Arc<DocumentStore>,
		fetched: Notify,
		release: Notify,
	}

	#[async_trait]
	impl TokenStore for GatedStore {
		async fn create_token(
			&self,
			application_id: &RecordId,
			digest: &[u8],
		) -> coffer_server_db::Result<TokenRecord> {
			self.inner.create_token(application_id, digest).await
		}

		async fn get_token_with_application(
			&self,
			id: &RecordId,
		) -> coffer_server_db::Result<Option<TokenWithApplication>> {
			let row = self.inner.get_token_with_application(id).await;
			self.fetched.notify_one();
			self.release.notified().await;
			row
		}
	}

	async fn sql_service() -> (TokenService, Arc<CountingStore<TokenRepository>>, Application) {
		let pool = create_test_pool().await;
		let app = create_test_application(&pool, "billing").await;
		let store = CountingStore::new(TokenRepository::new(pool));
		(TokenService::new(store.clone(), DEFAULT_TOKEN_CACHE_CAPACITY), store, app)
	}

	fn flip_secret_bit(token: &str, byte: usize, bit: u8) -> String {
		let (prefix, secret) = token.rsplit_once('.').unwrap();
		let mut raw = URL_SAFE_NO_PAD.decode(secret).unwrap();
		let idx = byte % raw.len();
		raw[idx] ^= 1 << bit;
		format!("{prefix}.{}", URL_SAFE_NO_PAD.encode(raw))
	}

	#[tokio::test]
	async fn generated_token_verifies() {
		let (service, _, app) = sql_service().await;

		let token = service.generate(&app.id).await.unwrap();
		assert!(token.expose().starts_with(&format!("Coffer.{}.", app.id)));

		let verified = service.verify(token.expose()).await.unwrap();
		assert_eq!(verified.id, app.id);
		assert_eq!(verified.name, "billing");
	}

	#[tokio::test]
	async fn document_backend_tokens_verify() {
		let store = Arc::new(DocumentStore::new());
		let app = store.create_application("billing").await.unwrap();
		let service = TokenService::new(store, DEFAULT_TOKEN_CACHE_CAPACITY);

		let token = service.generate(&app.id).await.unwrap();
		let id_segment = token.expose().split('.').nth(1).unwrap().to_string();
		assert_eq!(id_segment.len(), 24);

		assert_eq!(service.verify(token.expose()).await.unwrap().id, app.id);
	}

	#[tokio::test]
	async fn malformed_tokens_never_reach_the_store() {
		let (service, store, app) = sql_service().await;
		let token = service.generate(&app.id).await.unwrap();
		let calls = store.calls();
		let secret = token.expose().rsplit('.').next().unwrap().to_string();

		let malformed = [
			String::new(),
			"Coffer".to_string(),
			"Coffer.1".to_string(),
			format!("Other.1.{secret}"),
			format!("Coffer.1.{secret}.x"),
			format!("Coffer.not-an-id.{secret}"),
			"Coffer.1.%%%".to_string(),
			"Coffer.1.AAAA".to_string(),
		];
		for input in &malformed {
			assert!(service.verify(input).await.is_none(), "{input:?} verified");
		}
		assert_eq!(store.calls(), calls);
	}

	#[tokio::test]
	async fn flipped_bit_fails() {
		let (service, _, app) = sql_service().await;
		let token = service.generate(&app.id).await.unwrap();

		for (byte, bit) in [(0, 0), (17, 3), (63, 7)] {
			let tampered = flip_secret_bit(token.expose(), byte, bit);
			assert!(service.verify(&tampered).await.is_none());
		}
		assert!(service.verify(token.expose()).await.is_some());
	}

	#[tokio::test]
	async fn secret_of_one_token_does_not_open_another() {
		let (service, _, app) = sql_service().await;
		let a = service.generate(&app.id).await.unwrap();
		let b = service.generate(&app.id).await.unwrap();

		let (_, a_secret) = a.expose().rsplit_once('.').unwrap();
		let (b_prefix, _) = b.expose().rsplit_once('.').unwrap();
		assert!(service.verify(&format!("{b_prefix}.{a_secret}")).await.is_none());
	}

	#[tokio::test]
	async fn unknown_id_is_rejected() {
		let (service, _, app) = sql_service().await;
		let token = service.generate(&app.id).await.unwrap();
		let (_, secret) = token.expose().rsplit_once('.').unwrap();

		assert!(service.verify(&format!("Coffer.999.{secret}")).await.is_none());
		assert!(service
			.verify(&format!("Coffer.65f1a2b3c4d5e6f708192a3b.{secret}"))
			.await
			.is_none());
	}

	#[tokio::test]
	async fn repeated_verification_uses_the_cache() {
		let (service, store, app) = sql_service().await;
		let token = service.generate(&app.id).await.unwrap();

		service.verify(token.expose()).await.unwrap();
		let calls = store.calls();
		service.verify(token.expose()).await.unwrap();
		assert_eq!(store.calls(), calls);
	}

	#[tokio::test]
	async fn zero_capacity_cache_always_reads_store() {
		let pool = create_test_pool().await;
		let app = create_test_application(&pool, "billing").await;
		let store = CountingStore::new(TokenRepository::new(pool));
		let service = TokenService::new(store.clone(), 0);
		let token = service.generate(&app.id).await.unwrap();

		let calls = store.calls();
		service.verify(token.expose()).await.unwrap();
		service.verify(token.expose()).await.unwrap();
		assert_eq!(store.calls(), calls + 2);
	}

	#[tokio::test]
	async fn evicted_application_is_looked_up_again() {
		let store = Arc::new(DocumentStore::new());
		let app = store.create_application("billing").await.unwrap();
		let service = TokenService::new(store.clone(), DEFAULT_TOKEN_CACHE_CAPACITY);
		let token = service.generate(&app.id).await.unwrap();
		service.verify(token.expose()).await.unwrap();

		store.delete_application(&app.id).await.unwrap();
		service.evict_application(&app.id).await;

		assert!(service.verify(token.expose()).await.is_none());
	}

	#[tokio::test]
	async fn eviction_during_lookup_is_not_undone() {
		let inner = Arc::new(DocumentStore::new());
		let app = inner.create_application("billing").await.unwrap();
		let store = Arc::new(GatedStore {
			inner: inner.clone(),
			fetched: Notify::new(),
			release: Notify::new(),
		});
		let service = Arc::new(TokenService::new(store.clone(), DEFAULT_TOKEN_CACHE_CAPACITY));
		let token = service.generate(&app.id).await.unwrap();

		let in_flight = tokio::spawn({
			let service = service.clone();
			let token = token.expose().to_string();
			async move { service.verify(&token).await }
		});
		store.fetched.notified().await;

		inner.delete_application(&app.id).await.unwrap();
		service.evict_application(&app.id).await;
		store.release.notify_one();
		in_flight.await.unwrap();

		let after = tokio::spawn({
			let service = service.clone();
			let token = token.expose().to_string();
			async move { service.verify(&token).await }
		});
		store.fetched.notified().await;
		store.release.notify_one();
		assert!(after.await.unwrap().is_none());
	}

	#[tokio::test]
	async fn renamed_application_is_reported_by_its_new_name() {
		let store = Arc::new(DocumentStore::new());
		let app = store.create_application("billing").await.unwrap();
		let service = TokenService::new(store.clone(), DEFAULT_TOKEN_CACHE_CAPACITY);
		let token = service.generate(&app.id).await.unwrap();
		assert_eq!(service.verify(token.expose()).await.unwrap().name, "billing");

		store.rename_application(&app.id, "payments").await.unwrap();
		service.evict_application(&app.id).await;

		assert_eq!(service.verify(token.expose()).await.unwrap().name, "payments");
	}

	#[tokio::test]
	async fn unknown_application_cannot_get_tokens() {
		let (service, _, _) = sql_service().await;
		let err = service.generate(&RecordId::Integer(404)).await.unwrap_err();
		assert!(matches!(err, TokensError::Database(DbError::NotFound(_))));
	}

	#[test]
	fn issued_token_is_redacted_in_debug() {
		let token = SecretString::new("Coffer.1.secret".to_string());
		assert!(!format!("{token:?}").contains("secret"));
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(32))]

		#[test]
		fn any_flipped_bit_fails(byte in 0usize..SECRET_LEN, bit in 0u8..8) {
			let rt = tokio::runtime::Runtime::new().unwrap();
			rt.block_on(async {
				let (service, _, app) = sql_service().await;
				let token = service.generate(&app.id).await.unwrap();
				let tampered = flip_secret_bit(token.expose(), byte, bit);
				assert!(service.verify(&tampered).await.is_none());
			});
		}

		#[test]
		fn garbage_never_verifies(input in "[A-Za-z0-9._-]{0,120}") {
			let rt = tokio::runtime::Runtime::new().unwrap();
			rt.block_on(async {
				let (service, _, _) = sql_service().await;
				assert!(service.verify(&input).await.is_none());
			});
		}
	}
}
