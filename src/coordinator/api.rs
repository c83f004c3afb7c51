//! Bulk and listing operations.
//!
//! - `remote_products()` - Products the tracker exposes
//! - `tracked_products()` - Products with local state
//! - `download_all()` - Download every remote product
//! - `update_all()` - Update every tracked product

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::{MirrorError, Result};
use crate::metrics;

use super::{BatchResult, Mirror};

impl Mirror {
    /// Products the remote tracker exposes. Remote errors propagate.
    pub async fn remote_products(&self) -> Result<Vec<String>> {
        let products = self
            .call_remote("remote_list_products", || self.remote.list_products())
            .await?;
        Ok(products)
    }

    /// Products with persisted state in the local store.
    pub async fn tracked_products(&self) -> Result<BTreeSet<String>> {
        let products = self.store.list_products().await?;

        metrics::set_tracked_products(products.len());
        info!(
            count = products.len(),
            backend = self.store.backend_name(),
            "Currently tracking products"
        );
        for product in &products {
            debug!(product = %product, "Tracked product");
        }

        Ok(products)
    }

    /// Download every product the tracker exposes.
    ///
    /// Products that fail on their own (remote failure, unusable name, no or
    /// malformed records) count as failed; storage errors abort the run.
    pub async fn download_all(&self) -> Result<BatchResult> {
        let products = self.remote_products().await?;
        info!(count = products.len(), "Found products for download");

        let mut result = BatchResult::default();
        for product in &products {
            let outcome = self.download(product).await;
            result.record(Self::settle(product, outcome)?);
        }

        info!(total = result.total, succeeded = result.succeeded, failed = result.failed, "Download run finished");
        Ok(result)
    }

    /// Update every product with local state.
    pub async fn update_all(&self) -> Result<BatchResult> {
        let products = self.tracked_products().await?;

        let mut result = BatchResult::default();
        for product in &products {
            let outcome = self.update(product).await;
            result.record(Self::settle(product, outcome)?);
        }

        info!(total = result.total, succeeded = result.succeeded, failed = result.failed, "Update run finished");
        Ok(result)
    }

    /// Fold one product's result into success/failure, or abort the run.
    fn settle(product: &str, outcome: Result<super::SyncOutcome>) -> Result<bool> {
        match outcome {
            Ok(outcome) => {
                debug!(product, outcome = %outcome, "Product processed");
                Ok(outcome.is_success())
            }
            Err(e @ (MirrorError::Validation(_)
            | MirrorError::EmptyBatch { .. }
            | MirrorError::MalformedRecord { .. })) => {
                warn!(product, error = %e, "Product skipped");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
