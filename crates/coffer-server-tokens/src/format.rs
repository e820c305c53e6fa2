// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire format: `Coffer.<id>.<base64url(random)>`.
//!
//! `<id>` is the token record id: decimal for the SQL backend, 24 hex
//! characters for the document backend. The random half is 64 bytes; only
//! its SHA-512 digest is stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use coffer_server_db::RecordId;
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

pub const TOKEN_TAG: &str = "Coffer";

/// Length of the random token secret in bytes.
pub const SECRET_LEN: usize = 64;

/// Length of the stored digest in bytes.
pub const DIGEST_LEN: usize = 64;

/// A token split into its parts. Produced only for well-formed input.
pub struct ParsedToken {
	pub id: RecordId,
	pub secret: Zeroizing<Vec<u8>>,
}

pub fn format_token(id: &RecordId, secret: &[u8]) -> String {
	format!("{TOKEN_TAG}.{id}.{}", URL_SAFE_NO_PAD.encode(secret))
}

/// Split and decode a token without touching persistence.
pub fn parse_token(token: &str) -> Option<ParsedToken> {
	let mut parts = token.split('.');
	let (Some(tag), Some(id), Some(secret), None) =
		(parts.next(), parts.next(), parts.next(), parts.next())
	else {
		return None;
	};

	if tag != TOKEN_TAG {
		return None;
	}
	let id = id.parse::<RecordId>().ok()?;
	let secret = Zeroizing::new(URL_SAFE_NO_PAD.decode(secret).ok()?);
	if secret.len() != SECRET_LEN {
		return None;
	}

	Some(ParsedToken { id, secret })
}

pub fn digest(secret: &[u8]) -> [u8; DIGEST_LEN] {
	let mut out = [0u8; DIGEST_LEN];
	out.copy_from_slice(&Sha512::digest(secret));
	out
}
