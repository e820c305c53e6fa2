// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for decrypted secret values, bearer tokens and key material.
//!
//! [`Secret<T>`] keeps plaintext out of logs and serialized output and wipes
//! its memory when dropped. Reading the value requires an explicit
//! [`Secret::expose`] call so every plaintext access is visible in review.
//!
//! ```
//! use coffer_common_secret::SecretString;
//!
//! let value = SecretString::new("postgres://user:pass@db/app".to_string());
//!
//! assert_eq!(format!("{value}"), "[REDACTED]");
//! assert_eq!(format!("{value:?}"), "Secret(\"[REDACTED]\")");
//! assert_eq!(value.expose(), "postgres://user:pass@db/app");
//! ```
//!
//! With `tracing`, both `%value` and `?value` go through the redacted
//! `Display`/`Debug` impls, so fields recorded from a `Secret` never carry the
//! plaintext.

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A sensitive value that is redacted on output and zeroized on drop.
///
/// There is deliberately no `Deref`; use [`Secret::expose`].
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Decrypted secret values and issued bearer tokens.
pub type SecretString = Secret<String>;

/// Raw key material and decrypted byte payloads.
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the plaintext.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Copy the plaintext out of the wrapper.
	///
	/// The wrapper itself is still zeroized when it drops; the returned copy
	/// is the caller's responsibility.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<Vec<u8>> for SecretBytes {
	fn from(value: Vec<u8>) -> Self {
		Self::new(value)
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
