// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Encrypted secret storage for Coffer applications.
//!
//! [`SecretsService`] encrypts values with the master-key engine before they
//! reach a [`SecretStore`](coffer_server_db::SecretStore) and keeps a bounded
//! in-process cache of the stored ciphertext records. The cache is an
//! accelerator only: persistence is always authoritative, and a read racing a
//! write may see the old value, the new value, or a miss.

pub mod cache;
pub mod error;
pub mod filler;
pub mod service;

pub use cache::SecretCache;
pub use error::{SecretsError, SecretsResult};
pub use service::{
	SecretValue, SecretsService, SecretsServiceConfig, DEFAULT_CACHE_CAPACITY,
	DEFAULT_FILL_QUEUE_CAPACITY,
};
