//! Polling watcher over the healthy instances of one service.
//!
//! Each successful poll replaces the remembered snapshot and yields the
//! add/remove events since the previous one. An empty event list means
//! "no change" and is not an error.
//!
//! `poll` and `next` are meant for a single sequential caller. The snapshot
//! lock only keeps the stored snapshot whole.
//!
//! Each watcher tracks the catalog change index of its own results. The
//! first poll sends none, and an index that moves backwards resets to 0.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_catalog::HealthApi;
use beacon_core::{CatalogError, Instance, Update, UpdateKind};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::diff::diff;
use crate::config::WatchConfig;

/// Why a watch step produced no events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    /// The watcher was closed. Terminal.
    #[error("watcher closed")]
    Cancelled,

    /// The fetch did not complete in time.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The catalog call failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl WatchError {
    /// True for [`WatchError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WatchError::Cancelled)
    }
}

/// Pull-based stream of endpoint updates.
#[async_trait]
pub trait Watch: Send + Sync {
    /// Blocks until the next successful poll, retrying failures, and
    /// returns its events. Fails only with [`WatchError::Cancelled`].
    async fn next(&self) -> Result<Vec<Update>, WatchError>;

    /// Stops the watcher and unblocks a pending [`next`](Self::next).
    fn close(&self);
}

/// Watches one service through a [`HealthApi`].
pub struct ServiceWatcher {
    health: Arc<dyn HealthApi>,
    service: String,
    config: WatchConfig,
    cancel: CancellationToken,
    previous: Mutex<Vec<Instance>>,
    last_index: AtomicU64,
}

impl ServiceWatcher {
    /// Creates a watcher with an empty snapshot and its own cancellation root.
    pub fn new(health: Arc<dyn HealthApi>, service: impl Into<String>, config: WatchConfig) -> Self {
        Self {
            health,
            service: service.into(),
            config,
            cancel: CancellationToken::new(),
            previous: Mutex::new(Vec::new()),
            last_index: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Copy of the snapshot stored by the last successful poll.
    pub async fn snapshot(&self) -> Vec<Instance> {
        self.previous.lock().await.clone()
    }

    /// Change index of the last successful poll (0 before the first one).
    pub fn last_index(&self) -> u64 {
        self.last_index.load(Ordering::Relaxed)
    }

    /// Fetches once and diffs against the stored snapshot.
    ///
    /// # Errors
    ///
    /// - `WatchError::Cancelled` if the watcher is closed before or during the fetch
    /// - `WatchError::Timeout` if the fetch exceeds `poll_timeout`
    /// - `WatchError::Catalog` if the fetch fails
    ///
    /// The snapshot is left untouched on error.
    pub async fn poll(&self) -> Result<Vec<Update>, WatchError> {
        if self.cancel.is_cancelled() {
            return Err(WatchError::Cancelled);
        }

        let timeout = self.config.poll_timeout;
        let index = self.last_index();
        let fetch = self.health.healthy_instances_since(&self.service, true, index);
        let fetched = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(WatchError::Cancelled),

            result = tokio::time::timeout(timeout, fetch) => result,
        };

        let result = fetched.map_err(|_| WatchError::Timeout(timeout))??;
        let next_index = if result.index < index { 0 } else { result.index };
        self.last_index.store(next_index, Ordering::Relaxed);

        let mut latest = result.instances;
        latest.sort_by(|a, b| a.id.cmp(&b.id));

        let events = {
            let mut previous = self.previous.lock().await;
            let events = diff(&previous, &latest);
            *previous = latest;
            events
        };

        for event in &events {
            match event.kind {
                UpdateKind::Add => {
                    info!(service = %self.service, endpoint = %event.endpoint, "Endpoint added")
                }
                UpdateKind::Remove => {
                    info!(service = %self.service, endpoint = %event.endpoint, "Endpoint removed")
                }
            }
        }

        Ok(events)
    }
}

#[async_trait]
impl Watch for ServiceWatcher {
    async fn next(&self) -> Result<Vec<Update>, WatchError> {
        loop {
            match self.poll().await {
                Ok(events) => {
                    debug!(service = %self.service, count = events.len(), "Found updates");
                    return Ok(events);
                }
                Err(WatchError::Cancelled) => return Err(WatchError::Cancelled),
                Err(e) => {
                    warn!(
                        service = %self.service,
                        error = %e,
                        retry_delay_secs = self.config.retry_delay.as_secs(),
                        "Failed to fetch healthy instances"
                    );
                }
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(WatchError::Cancelled),

                _ = sleep(self.config.retry_delay) => {}
            }
        }
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}
