// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fire-and-forget cache population.
//!
//! Reads hand fetched rows to [`CacheFiller::submit`], which never waits: a
//! full queue drops the batch. One background task drains the queue into the
//! cache.

use std::sync::Arc;

use coffer_server_db::{RecordId, SecretRecord};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::cache::SecretCache;

/// Rows fetched from persistence after a cache miss.
#[derive(Debug)]
pub struct CacheFill {
	pub application_id: RecordId,
	pub generation: u64,
	pub records: Vec<SecretRecord>,
}

pub struct CacheFiller {
	tx: mpsc::Sender<CacheFill>,
}

impl CacheFiller {
	/// Spawn the background task. Must be called inside a tokio runtime.
	pub fn new(cache: Arc<SecretCache>, queue_capacity: usize) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));

		tokio::spawn(Self::background_task(rx, cache));

		Self { tx }
	}

	async fn background_task(mut rx: mpsc::Receiver<CacheFill>, cache: Arc<SecretCache>) {
		while let Some(fill) = rx.recv().await {
			let offered = fill.records.len();
			let stored = cache
				.populate(&fill.application_id, fill.generation, fill.records)
				.await;
			tracing::debug!(
				application_id = %fill.application_id,
				offered,
				stored,
				"cache fill applied"
			);
		}
	}

	/// Queue a fill. Returns `false` if it was dropped.
	pub fn submit(&self, fill: CacheFill) -> bool {
		match self.tx.try_send(fill) {
			Ok(()) => true,
			Err(TrySendError::Full(fill)) => {
				tracing::warn!(
					application_id = %fill.application_id,
					records = fill.records.len(),
					"cache fill queue full, dropping batch"
				);
				false
			}
			Err(TrySendError::Closed(_)) => {
				tracing::debug!("cache fill task has stopped");
				false
			}
		}
	}
}
