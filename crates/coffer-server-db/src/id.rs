// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Record identifiers shared by every backend.
//!
//! The SQL backend hands out auto-increment integers, the document backend
//! 12-byte object ids. Both render to a string that parses back to the same
//! variant: all-digit strings of at most 20 characters that fit a `u64` are
//! integers, 24 hex characters are document ids.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DOCUMENT_ID_LEN: usize = 12;

/// Longest decimal rendering of a `u64`.
const MAX_INTEGER_DIGITS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record id: {0:?}")]
pub struct ParseIdError(String);

/// 12-byte document identifier: 4-byte big-endian timestamp, 5 bytes of
/// per-process randomness, 3-byte counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId([u8; DOCUMENT_ID_LEN]);

impl DocumentId {
	pub const fn from_bytes(bytes: [u8; DOCUMENT_ID_LEN]) -> Self {
		Self(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; DOCUMENT_ID_LEN] {
		&self.0
	}

	/// Generate a new id. Ids from one process sort in creation order
	/// unless the 24-bit counter wraps within a single second.
	pub fn generate() -> Self {
		static PROCESS: OnceLock<[u8; 5]> = OnceLock::new();
		static COUNTER: AtomicU32 = AtomicU32::new(0);

		let process = PROCESS.get_or_init(rand::random);
		let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
		let seconds = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs() as u32)
			.unwrap_or_default();

		let mut bytes = [0u8; DOCUMENT_ID_LEN];
		bytes[..4].copy_from_slice(&seconds.to_be_bytes());
		bytes[4..9].copy_from_slice(process);
		bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
		Self(bytes)
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&hex::encode(self.0))
	}
}

impl fmt::Debug for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DocumentId({self})")
	}
}

impl FromStr for DocumentId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut bytes = [0u8; DOCUMENT_ID_LEN];
		hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseIdError(s.to_string()))?;
		Ok(Self(bytes))
	}
}

/// Identifier of an application, secret or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
	Integer(u64),
	Document(DocumentId),
}

impl RecordId {
	pub fn as_integer(&self) -> Option<u64> {
		match self {
			RecordId::Integer(id) => Some(*id),
			RecordId::Document(_) => None,
		}
	}

	pub fn as_document(&self) -> Option<&DocumentId> {
		match self {
			RecordId::Document(id) => Some(id),
			RecordId::Integer(_) => None,
		}
	}
}

impl From<u64> for RecordId {
	fn from(id: u64) -> Self {
		RecordId::Integer(id)
	}
}

impl From<DocumentId> for RecordId {
	fn from(id: DocumentId) -> Self {
		RecordId::Document(id)
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RecordId::Integer(id) => write!(f, "{id}"),
			RecordId::Document(id) => write!(f, "{id}"),
		}
	}
}

impl FromStr for RecordId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !s.is_empty() && s.len() <= MAX_INTEGER_DIGITS && s.bytes().all(|b| b.is_ascii_digit()) {
			if let Ok(id) = s.parse::<u64>() {
				return Ok(RecordId::Integer(id));
			}
		}
		s.parse::<DocumentId>().map(RecordId::Document)
	}
}

impl Serialize for RecordId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for RecordId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
