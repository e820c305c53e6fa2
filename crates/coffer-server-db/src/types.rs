// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// An identity that owns secrets and tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
	pub id: RecordId,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A stored secret. `value` is ciphertext; plaintext never reaches this layer.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SecretRecord {
	pub id: RecordId,
	pub application_id: RecordId,
	pub key: String,
	#[serde(skip_serializing)]
	pub value: Vec<u8>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for SecretRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretRecord")
			.field("id", &self.id)
			.field("application_id", &self.application_id)
			.field("key", &self.key)
			.field("value_len", &self.value.len())
			.finish()
	}
}

/// A bearer token. `value` is the SHA-512 digest of the random secret half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
	pub id: RecordId,
	pub application_id: RecordId,
	pub value: Vec<u8>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A token joined with the application it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWithApplication {
	pub token: TokenRecord,
	pub application: Application,
}
