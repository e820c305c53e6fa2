// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache sizing.

use serde::Deserialize;

const DEFAULT_SECRETS_CAPACITY: usize = 4096;
const DEFAULT_FILL_QUEUE_CAPACITY: usize = 256;
const DEFAULT_TOKENS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	/// Maximum number of decrypted secrets held in memory. Zero disables the cache.
	pub secrets_capacity: usize,
	/// Pending cache fills; fills beyond this are dropped.
	pub fill_queue_capacity: usize,
	pub tokens_capacity: usize,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			secrets_capacity: DEFAULT_SECRETS_CAPACITY,
			fill_queue_capacity: DEFAULT_FILL_QUEUE_CAPACITY,
			tokens_capacity: DEFAULT_TOKENS_CAPACITY,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub secrets_capacity: Option<usize>,
	#[serde(default)]
	pub fill_queue_capacity: Option<usize>,
	#[serde(default)]
	pub tokens_capacity: Option<usize>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.secrets_capacity.is_some() {
			self.secrets_capacity = other.secrets_capacity;
		}
		if other.fill_queue_capacity.is_some() {
			self.fill_queue_capacity = other.fill_queue_capacity;
		}
		if other.tokens_capacity.is_some() {
			self.tokens_capacity = other.tokens_capacity;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			secrets_capacity: self.secrets_capacity.unwrap_or(DEFAULT_SECRETS_CAPACITY),
			fill_queue_capacity: self
				.fill_queue_capacity
				.unwrap_or(DEFAULT_FILL_QUEUE_CAPACITY),
			tokens_capacity: self.tokens_capacity.unwrap_or(DEFAULT_TOKENS_CAPACITY),
		}
	}
}
