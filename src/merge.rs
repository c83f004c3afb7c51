// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Merge engine: append newly fetched records to a persisted tree.
//!
//! # Algorithm
//!
//! ```text
//! fresh batch ──serialize──▶ fresh tree (own watermark/count)
//!                               │
//!            existing.watermark == fresh.watermark ? ──yes──▶ UpToDate (no write)
//!                               │ no
//!                               ▼
//!      drop records with creation_time == existing.watermark (boundary)
//!      append the rest, watermark = max(existing, fresh), count += appended
//!                               │
//!                               ▼
//!                         Store.write
//! ```
//!
//! The watermark comparison is exact string equality: two batches sharing
//! a newest `creation_time` are treated as the same state even if older
//! records differ. Trees are only ever appended to, never rebuilt.

use tracing::{debug, info};

use crate::collection::{serialize_batch, RecordSet, RecordTree};
use crate::error::Result;
use crate::storage::traits::TreeStore;

/// Result of merging a fresh batch into an existing tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new; carries the tree as it was.
    UpToDate(RecordTree),
    /// Records were appended (and, from [`merge`], persisted).
    Merged {
        tree: RecordTree,
        appended: usize,
        dropped_boundary: usize,
    },
}

impl MergeOutcome {
    #[must_use]
    pub fn tree(&self) -> &RecordTree {
        match self {
            Self::UpToDate(tree) | Self::Merged { tree, .. } => tree,
        }
    }

    #[must_use]
    pub fn into_tree(self) -> RecordTree {
        match self {
            Self::UpToDate(tree) | Self::Merged { tree, .. } => tree,
        }
    }

    #[must_use]
    pub fn appended(&self) -> usize {
        match self {
            Self::UpToDate(_) => 0,
            Self::Merged { appended, .. } => *appended,
        }
    }
}

/// Decide what merging `fresh` into `existing` yields. Pure; no I/O.
#[must_use]
pub fn plan_merge(existing: RecordTree, fresh: RecordTree) -> MergeOutcome {
    if existing.watermark == fresh.watermark {
        return MergeOutcome::UpToDate(existing);
    }

    let (boundary, new_records): (Vec<_>, Vec<_>) = fresh
        .records
        .into_iter()
        .partition(|node| node.creation_time() == Some(existing.watermark.as_str()));

    let appended = new_records.len();
    let watermark = existing.watermark.clone().max(fresh.watermark);

    if appended == 0 && watermark == existing.watermark {
        return MergeOutcome::UpToDate(existing);
    }

    let mut tree = existing;
    tree.records.extend(new_records);
    tree.count += appended;
    tree.watermark = watermark;

    MergeOutcome::Merged {
        tree,
        appended,
        dropped_boundary: boundary.len(),
    }
}

/// Serialize `fresh`, merge it into `existing` and persist the result.
///
/// Writes only when records were appended.
pub async fn merge(
    store: &dyn TreeStore,
    product: &str,
    fresh: &RecordSet,
    existing: RecordTree,
    record_node: &str,
) -> Result<MergeOutcome> {
    let fresh_tree = serialize_batch(fresh, record_node)?;
    let previous = existing.watermark.clone();

    let outcome = plan_merge(existing, fresh_tree);
    match outcome {
        MergeOutcome::UpToDate(ref tree) => {
            debug!(product, watermark = %tree.watermark, "Tree already up to date");
        }
        MergeOutcome::Merged { ref tree, appended, dropped_boundary } => {
            store.write(product, tree).await?;
            info!(
                product,
                appended,
                dropped_boundary,
                previous_watermark = %previous,
                watermark = %tree.watermark,
                count = tree.count,
                "Merged new records"
            );
        }
    }

    Ok(outcome)
}
