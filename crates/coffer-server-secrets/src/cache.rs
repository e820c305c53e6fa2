// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Two-level secret cache: application id, then secret key.
//!
//! # Locking discipline
//!
//! One [`RwLock`] guards the whole map. Every method takes it for the
//! duration of an in-memory operation only; no method awaits anything else
//! while holding it, so callers can never hold it across persistence I/O.
//!
//! # Generations
//!
//! The cache keeps a clock that every invalidating write (replace, remove,
//! invalidate) advances, stamping the touched application with the new
//! value. A reader snapshots the clock in [`SecretCache::lookup`] before
//! going to persistence and hands it back with the fetched rows;
//! [`SecretCache::populate`] discards the batch if the application was
//! stamped after the snapshot. A slow read can therefore never resurrect a
//! key that was renamed or deleted after the read started.
//!
//! An application left with no cached keys is dropped from the map. The
//! clock value of the latest such drop is kept instead, and a fill for an
//! application with no entry is only accepted if it was snapshotted after
//! that drop. Memory therefore tracks cached keys, not every application
//! ever touched.

use std::collections::HashMap;

use coffer_server_db::{RecordId, SecretRecord};
use tokio::sync::RwLock;

#[derive(Default)]
struct AppEntries {
	generation: u64,
	secrets: HashMap<String, SecretRecord>,
}

#[derive(Default)]
struct CacheState {
	apps: HashMap<RecordId, AppEntries>,
	len: usize,
	clock: u64,
	/// Clock value of the most recent invalidation of an application that
	/// no longer has an entry.
	pruned_at: u64,
}

impl CacheState {
	fn tick(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}

	/// Stamp an application as changed. Nothing is allocated for an
	/// application that has no entry.
	fn bump(&mut self, application_id: &RecordId) {
		let now = self.tick();
		match self.apps.get_mut(application_id) {
			Some(entries) => entries.generation = now,
			None => self.pruned_at = now,
		}
	}

	fn is_current(&self, application_id: &RecordId, snapshot: u64) -> bool {
		match self.apps.get(application_id) {
			Some(entries) => entries.generation <= snapshot,
			None => self.pruned_at <= snapshot,
		}
	}

	/// Drop the application's entry if it no longer caches anything.
	fn prune(&mut self, application_id: &RecordId) {
		let empty = self
			.apps
			.get(application_id)
			.is_some_and(|entries| entries.secrets.is_empty());
		if empty {
			if let Some(entries) = self.apps.remove(application_id) {
				self.pruned_at = self.pruned_at.max(entries.generation);
			}
		}
	}

	/// Insert if there is room or the key is already cached.
	fn insert(&mut self, capacity: usize, application_id: &RecordId, record: SecretRecord) -> bool {
		if let Some(slot) = self
			.apps
			.get_mut(application_id)
			.and_then(|entries| entries.secrets.get_mut(&record.key))
		{
			*slot = record;
			return true;
		}
		if self.len >= capacity {
			return false;
		}

		let pruned_at = self.pruned_at;
		let entries = self.apps.entry(*application_id).or_insert_with(|| AppEntries {
			generation: pruned_at,
			secrets: HashMap::new(),
		});
		entries.secrets.insert(record.key.clone(), record);
		self.len += 1;
		true
	}

	fn remove(&mut self, application_id: &RecordId, key: &str) -> bool {
		let removed = self
			.apps
			.get_mut(application_id)
			.and_then(|entries| entries.secrets.remove(key))
			.is_some();
		if removed {
			self.len -= 1;
		}
		removed
	}
}

/// Result of a cache lookup for a set of keys.
#[derive(Debug, Default)]
pub struct Lookup {
	pub hits: Vec<SecretRecord>,
	pub misses: Vec<String>,
	/// Generation to pass to [`SecretCache::populate`] with the misses.
	pub generation: u64,
}

/// Bounded cache of ciphertext-bearing secret records.
///
/// Absence never implies non-existence. Capacity caps the total number of
/// entries across all applications; fills beyond it are dropped. A capacity
/// of zero disables caching.
pub struct SecretCache {
	capacity: usize,
	state: RwLock<CacheState>,
}

impl SecretCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			state: RwLock::new(CacheState::default()),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.len
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	/// Number of applications with at least one cached key.
	pub async fn applications(&self) -> usize {
		self.state.read().await.apps.len()
	}

	pub async fn get(&self, application_id: &RecordId, key: &str) -> Option<SecretRecord> {
		let state = self.state.read().await;
		state
			.apps
			.get(application_id)
			.and_then(|entries| entries.secrets.get(key))
			.cloned()
	}

	/// Split `keys` into cached records and misses. Duplicate keys are
	/// reported once.
	pub async fn lookup(&self, application_id: &RecordId, keys: &[String]) -> Lookup {
		let state = self.state.read().await;
		let entries = state.apps.get(application_id);

		let mut lookup = Lookup {
			generation: state.clock,
			..Lookup::default()
		};
		let mut seen = std::collections::HashSet::with_capacity(keys.len());

		for key in keys {
			if !seen.insert(key.as_str()) {
				continue;
			}
			match entries.and_then(|e| e.secrets.get(key)) {
				Some(record) => lookup.hits.push(record.clone()),
				None => lookup.misses.push(key.clone()),
			}
		}
		lookup
	}

	/// Apply a fill captured at `generation`. Returns how many records were
	/// stored; zero if the batch was stale or the cache is full.
	pub async fn populate(
		&self,
		application_id: &RecordId,
		generation: u64,
		records: Vec<SecretRecord>,
	) -> usize {
		if self.capacity == 0 {
			return 0;
		}

		let mut state = self.state.write().await;
		if !state.is_current(application_id, generation) {
			tracing::debug!(application_id = %application_id, "dropping stale cache fill");
			return 0;
		}

		let mut stored = 0;
		for record in records {
			if state.insert(self.capacity, application_id, record) {
				stored += 1;
			}
		}
		stored
	}

	/// Swap the entry under `old_key` for `record` (stored under `record.key`)
	/// in one critical section.
	pub async fn replace(&self, application_id: &RecordId, old_key: &str, record: SecretRecord) {
		let mut state = self.state.write().await;
		state.bump(application_id);
		state.remove(application_id, old_key);
		state.remove(application_id, &record.key);
		state.prune(application_id);
		if self.capacity > 0 {
			state.insert(self.capacity, application_id, record);
		}
	}

	pub async fn remove(&self, application_id: &RecordId, key: &str) -> bool {
		let mut state = self.state.write().await;
		state.bump(application_id);
		let removed = state.remove(application_id, key);
		state.prune(application_id);
		removed
	}

	/// Drop every entry of one application. Returns how many were dropped.
	pub async fn invalidate(&self, application_id: &RecordId) -> usize {
		let mut state = self.state.write().await;
		state.bump(application_id);
		let dropped = state
			.apps
			.get_mut(application_id)
			.map(|entries| std::mem::take(&mut entries.secrets).len())
			.unwrap_or_default();
		state.len -= dropped;
		state.prune(application_id);
		dropped
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn record(app: u64, key: &str, value: u8) -> SecretRecord {
		let now = Utc::now();
		SecretRecord {
			id: RecordId::Integer(u64::from(value)),
			application_id: RecordId::Integer(app),
			key: key.to_string(),
			value: vec![value],
			created_at: now,
			updated_at: now,
		}
	}

	const APP: RecordId = RecordId::Integer(1);
	const OTHER: RecordId = RecordId::Integer(2);

	fn keys(names: &[&str]) -> Vec<String> {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[tokio::test]
	async fn lookup_splits_hits_and_misses() {
		let cache = SecretCache::new(16);
		cache.populate(&APP, 0, vec![record(1, "A", 1)]).await;

		let lookup = cache.lookup(&APP, &keys(&["A", "B", "B"])).await;
		assert_eq!(lookup.hits.len(), 1);
		assert_eq!(lookup.misses, keys(&["B"]));
	}

	#[tokio::test]
	async fn capacity_caps_entries_across_applications() {
		let cache = SecretCache::new(2);
		cache.populate(&APP, 0, vec![record(1, "A", 1)]).await;
		let stored = cache
			.populate(&OTHER, 0, vec![record(2, "B", 2), record(2, "C", 3)])
			.await;

		assert_eq!(stored, 1);
		assert_eq!(cache.len().await, 2);
		assert!(cache.get(&OTHER, "C").await.is_none());
	}

	#[tokio::test]
	async fn full_cache_still_refreshes_existing_keys() {
		let cache = SecretCache::new(1);
		cache.populate(&APP, 0, vec![record(1, "A", 1)]).await;
		cache.populate(&APP, 0, vec![record(1, "A", 9)]).await;

		assert_eq!(cache.get(&APP, "A").await.unwrap().value, vec![9]);
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn zero_capacity_disables_caching() {
		let cache = SecretCache::new(0);
		assert_eq!(cache.populate(&APP, 0, vec![record(1, "A", 1)]).await, 0);

		let moved = record(1, "B", 2);
		cache.replace(&APP, "A", moved).await;
		assert!(cache.is_empty().await);
	}

	#[tokio::test]
	async fn stale_fill_is_discarded() {
		let cache = SecretCache::new(16);
		let lookup = cache.lookup(&APP, &keys(&["A"])).await;

		cache.remove(&APP, "A").await;

		let stored = cache
			.populate(&APP, lookup.generation, vec![record(1, "A", 1)])
			.await;
		assert_eq!(stored, 0);
		assert!(cache.get(&APP, "A").await.is_none());
	}

	#[tokio::test]
	async fn replace_moves_entry_to_new_key() {
		let cache = SecretCache::new(16);
		cache.populate(&APP, 0, vec![record(1, "OLD", 1)]).await;

		cache.replace(&APP, "OLD", record(1, "NEW", 2)).await;

		assert!(cache.get(&APP, "OLD").await.is_none());
		assert_eq!(cache.get(&APP, "NEW").await.unwrap().value, vec![2]);
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn invalidate_only_touches_one_application() {
		let cache = SecretCache::new(16);
		cache
			.populate(&APP, 0, vec![record(1, "A", 1), record(1, "B", 2)])
			.await;
		cache.populate(&OTHER, 0, vec![record(2, "A", 3)]).await;

		assert_eq!(cache.invalidate(&APP).await, 2);
		assert!(cache.get(&APP, "A").await.is_none());
		assert!(cache.get(&OTHER, "A").await.is_some());
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn remove_reports_whether_entry_existed() {
		let cache = SecretCache::new(16);
		cache.populate(&APP, 0, vec![record(1, "A", 1)]).await;

		assert!(cache.remove(&APP, "A").await);
		assert!(!cache.remove(&APP, "A").await);
		assert_eq!(cache.len().await, 0);
	}

	#[tokio::test]
	async fn emptied_applications_are_dropped() {
		let cache = SecretCache::new(16);
		for app in 0..100 {
			let id = RecordId::Integer(app);
			let lookup = cache.lookup(&id, &keys(&["A"])).await;
			assert_eq!(cache.populate(&id, lookup.generation, vec![record(app, "A", 1)]).await, 1);
			assert!(cache.remove(&id, "A").await);
		}
		for app in 100..200 {
			let id = RecordId::Integer(app);
			cache.invalidate(&id).await;
			cache.remove(&id, "MISSING").await;
		}

		assert_eq!(cache.applications().await, 0);
		assert!(cache.is_empty().await);
	}

	#[tokio::test]
	async fn stale_fill_is_discarded_after_its_application_was_dropped() {
		let cache = SecretCache::new(16);
		cache.populate(&APP, 0, vec![record(1, "B", 2)]).await;
		let lookup = cache.lookup(&APP, &keys(&["A"])).await;

		cache.invalidate(&APP).await;
		assert_eq!(cache.applications().await, 0);

		let stored = cache
			.populate(&APP, lookup.generation, vec![record(1, "A", 1)])
			.await;
		assert_eq!(stored, 0);
		assert!(cache.get(&APP, "A").await.is_none());

		let fresh = cache.lookup(&APP, &keys(&["A"])).await;
		assert_eq!(cache.populate(&APP, fresh.generation, vec![record(1, "A", 1)]).await, 1);
	}

	#[tokio::test]
	async fn replace_keeps_other_applications_fills_valid() {
		let cache = SecretCache::new(16);
		cache.populate(&OTHER, 0, vec![record(2, "X", 1)]).await;
		let lookup = cache.lookup(&OTHER, &keys(&["Y"])).await;

		cache.populate(&APP, 0, vec![record(1, "OLD", 1)]).await;
		cache.replace(&APP, "OLD", record(1, "NEW", 2)).await;

		assert_eq!(cache.populate(&OTHER, lookup.generation, vec![record(2, "Y", 3)]).await, 1);
	}
}
