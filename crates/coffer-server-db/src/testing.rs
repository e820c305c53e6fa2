// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests in this and dependent crates.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::migrations::run_migrations;
use crate::types::Application;
use crate::ApplicationRepository;

/// In-memory database with the full schema applied.
///
/// A single connection keeps every query on the same `:memory:` database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool).await.expect("Failed to run migrations");
	pool
}

pub async fn create_test_application(pool: &SqlitePool, name: &str) -> Application {
	ApplicationRepository::new(pool.clone())
		.create_application(name)
		.await
		.expect("Failed to create application")
}
