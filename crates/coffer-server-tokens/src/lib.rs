// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer tokens for Coffer applications.
//!
//! A token is `Coffer.<id>.<secret>` where `<secret>` is 64 random bytes,
//! base64url encoded. The store keeps `SHA-512(secret)` under `<id>`, so a
//! leaked database does not leak usable tokens. Verification parses the
//! token fully before it looks anything up and compares digests in constant
//! time.

pub mod error;
pub mod format;
pub mod service;

pub use error::{TokensError, TokensResult};
pub use format::{format_token, parse_token, ParsedToken, TOKEN_TAG};
pub use service::{TokenService, DEFAULT_TOKEN_CACHE_CAPACITY};
