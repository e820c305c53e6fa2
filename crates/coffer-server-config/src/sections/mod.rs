// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for coffer-server.

pub mod cache;
pub mod database;
pub mod keys;
pub mod logging;
pub mod master_key;

pub use cache::{CacheConfig, CacheConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer, StorageBackend};
pub use keys::{KeysConfig, KeysConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use master_key::{decode_master_key, MasterKeyBytes, MASTER_KEY_ENV, MASTER_KEY_SIZE};
