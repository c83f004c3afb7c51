// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mirror coordinator.
//!
//! The [`Mirror`] ties a [`TreeStore`] to a [`RemoteTracker`] and drives one
//! product's mirror state through three operations:
//!
//! ```text
//!              download                     update (watermark moved)
//!   Absent ─────────────────▶ Mirrored ─────────────────────────────▶ Mirrored'
//!     │                          ▲  │
//!     │ query (fetch-on-miss)    │  └── update (same watermark) ──▶ unchanged, no write
//!     └──────────────────────────┘
//! ```
//!
//! - `download` always replaces the tree with a full fetch.
//! - `update` fetches records created at or after the stored watermark and
//!   appends the new ones. With no stored tree it downloads instead.
//! - `query` returns the stored tree, downloading it first if absent. It
//!   never refreshes an existing tree.
//!
//! # Failure handling
//!
//! Remote failures in `download`/`update` are logged and reported as
//! [`SyncOutcome::Skipped`]; local state is untouched. `query` propagates
//! them, since it has nothing to return. Storage failures and corrupt state
//! always propagate.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bug_mirror::{Mirror, MirrorConfig, RemoteTracker};
//!
//! # async fn example(tracker: Arc<dyn RemoteTracker>) -> bug_mirror::Result<()> {
//! let config = MirrorConfig {
//!     database: "gnome".into(),
//!     ..Default::default()
//! };
//! let mirror = Mirror::open(config, tracker).await?;
//!
//! mirror.update("gnote").await?;
//! let tree = mirror.query("gnote").await?;
//! for (severity, count) in tree.field_histogram("severity") {
//!     println!("{}: {}", severity, count);
//! }
//! # Ok(())
//! # }
//! ```

mod types;
mod api;

pub use types::{SyncOutcome, BatchResult};

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collection::{serialize_batch, RecordSet, RecordTree};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::merge::{merge, MergeOutcome};
use crate::metrics::{self, LatencyTimer};
use crate::remote::{RemoteError, RemoteTracker, SearchFilter};
use crate::resilience::retry::retry_when;
use crate::storage::traits::{validate_product_name, StorageError, TreeStore};

/// Incremental local mirror of a remote tracker.
///
/// Operations are sequential request/response calls. Two calls updating the
/// same product concurrently are not coordinated: `update` reads, merges and
/// writes without a lock.
pub struct Mirror {
    config: MirrorConfig,
    store: Arc<dyn TreeStore>,
    remote: Arc<dyn RemoteTracker>,
}

impl Mirror {
    pub fn new(
        config: MirrorConfig,
        store: Arc<dyn TreeStore>,
        remote: Arc<dyn RemoteTracker>,
    ) -> Self {
        Self { config, store, remote }
    }

    /// Open the store selected by `config` and build a mirror over it.
    pub async fn open(config: MirrorConfig, remote: Arc<dyn RemoteTracker>) -> Result<Self> {
        let store = crate::storage::open(&config).await?;
        info!(backend = store.backend_name(), "Mirror opened");
        Ok(Self::new(config, store, remote))
    }

    #[must_use]
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Fetch the full record set of `product` and replace its stored tree.
    ///
    /// A failed remote fetch yields [`SyncOutcome::Skipped`].
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, product: &str) -> Result<SyncOutcome> {
        let _timer = LatencyTimer::new("download");

        let outcome = match self.fetch_and_store(product).await {
            Ok(tree) => SyncOutcome::Downloaded {
                count: tree.count,
                watermark: tree.watermark,
            },
            Err(MirrorError::RemoteFetch(e)) => {
                warn!(product, error = %e, "Could not fetch product records; local copy left unchanged");
                metrics::record_remote_failure("download");
                SyncOutcome::Skipped { reason: e.to_string() }
            }
            Err(e) => {
                metrics::record_error("download", e.kind());
                return Err(e);
            }
        };

        metrics::record_operation("download", outcome.status());
        Ok(outcome)
    }

    /// Append records created since the stored watermark.
    ///
    /// Downloads instead when nothing is stored yet.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, product: &str) -> Result<SyncOutcome> {
        let _timer = LatencyTimer::new("update");

        let result = self.update_stored(product).await;
        match result {
            Ok(ref outcome) => metrics::record_operation("update", outcome.status()),
            Err(ref e) => metrics::record_error("update", e.kind()),
        }
        result
    }

    /// Stored tree for `product`, downloading it first if absent.
    ///
    /// Unlike `download`, a remote failure here is returned to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn query(&self, product: &str) -> Result<RecordTree> {
        let _timer = LatencyTimer::new("query");

        if let Some(tree) = self.store.read(product).await? {
            debug!(product, count = tree.count, "Serving stored tree");
            return Ok(tree);
        }

        info!(product, "Local copy of product does not exist; fetching it from the tracker");
        metrics::record_query_miss(self.store.backend_name());
        if let Err(e) = self.fetch_and_store(product).await {
            metrics::record_error("query", e.kind());
            return Err(e);
        }

        self.store.read(product).await?.ok_or_else(|| {
            MirrorError::Io(StorageError::Backend(format!(
                "tree for '{}' not readable right after it was written",
                product
            )))
        })
    }

    async fn update_stored(&self, product: &str) -> Result<SyncOutcome> {
        validate_product_name(product)?;

        let Some(existing) = self.store.read(product).await? else {
            info!(product, "No local copy to update; downloading instead");
            return self.download(product).await;
        };

        let filter = SearchFilter::created_since(existing.watermark.clone());
        let fresh = match self.fetch(product, &filter).await {
            Ok(set) => set,
            Err(e) => {
                warn!(product, error = %e, watermark = %existing.watermark, "Could not fetch new records; update skipped");
                metrics::record_remote_failure("update");
                return Ok(SyncOutcome::Skipped { reason: e.to_string() });
            }
        };

        if fresh.is_empty() {
            debug!(product, watermark = %existing.watermark, "Tracker returned no records at or after the watermark");
            return Ok(SyncOutcome::UpToDate {
                count: existing.count,
                watermark: existing.watermark,
            });
        }

        let outcome = merge(self.store.as_ref(), product, &fresh, existing, &self.config.record_node).await?;

        Ok(match outcome {
            MergeOutcome::UpToDate(tree) => {
                info!(product, watermark = %tree.watermark, "Product is already up to date");
                SyncOutcome::UpToDate {
                    count: tree.count,
                    watermark: tree.watermark,
                }
            }
            MergeOutcome::Merged { tree, appended, dropped_boundary } => {
                metrics::record_appended(product, appended);
                metrics::record_boundary_dropped(dropped_boundary);
                metrics::set_tracked_records(product, tree.count);
                SyncOutcome::Updated {
                    appended,
                    count: tree.count,
                    watermark: tree.watermark,
                }
            }
        })
    }

    /// Full fetch → serialize → write. Remote errors propagate.
    async fn fetch_and_store(&self, product: &str) -> Result<RecordTree> {
        validate_product_name(product)?;

        info!(product, "Downloading product records");
        let set = self.fetch(product, &SearchFilter::all()).await?;
        let tree = serialize_batch(&set, &self.config.record_node)?;
        self.store.write(product, &tree).await?;

        metrics::set_tracked_records(product, tree.count);
        info!(
            product,
            count = tree.count,
            watermark = %tree.watermark,
            backend = self.store.backend_name(),
            "Product saved"
        );
        Ok(tree)
    }

    async fn fetch(
        &self,
        product: &str,
        filter: &SearchFilter,
    ) -> std::result::Result<RecordSet, RemoteError> {
        self.call_remote("remote_search", || self.remote.search_records(product, filter))
            .await
    }

    /// Run a remote call with the configured timeout and retry policy.
    ///
    /// Only transient failures (unavailable, timed out) are retried.
    pub(crate) async fn call_remote<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> std::result::Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteError>>,
    {
        let timeout = self.config.remote_timeout();

        retry_when(
            operation,
            &self.config.remote_retry(),
            || {
                let pending = call();
                async move {
                    match tokio::time::timeout(timeout, pending).await {
                        Ok(result) => result,
                        Err(_) => Err(RemoteError::Timeout(timeout)),
                    }
                }
            },
            RemoteError::is_transient,
        )
        .await
    }
}
