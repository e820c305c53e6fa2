// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for `coffer-server version`.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn platform() -> String {
	format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

pub fn format_version_info() -> String {
	format!(
		"coffer-server version: {}\n\
         Platform:              {}",
		VERSION,
		platform(),
	)
}
