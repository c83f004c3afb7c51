// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote tracker seam.
//!
//! The mirror does not speak any tracker protocol itself. Embedders provide
//! a [`RemoteTracker`] (an XML-RPC or REST client for a Bugzilla instance,
//! for example) and the mirror drives it.
//!
//! # Filter contract
//!
//! [`SearchFilter::created_since`] is an *inclusive* lower bound: the tracker
//! returns every record with `creation_time >= since`, including the record
//! sitting exactly on the bound. The merge step relies on this to drop that
//! boundary record instead of storing it twice.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::collection::RecordSet;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Tracker unavailable: {0}")]
    Unavailable(String),
    #[error("Tracker call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed tracker response: {0}")]
    Malformed(String),
    #[error("Tracker rejected request: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Whether another attempt might succeed. Rejected and malformed
    /// responses will not change on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Filter for [`RemoteTracker::search_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Inclusive lower bound on `creation_time`; `None` fetches everything
    pub created_since: Option<String>,
}

impl SearchFilter {
    /// No filter: every record of the product.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn created_since(since: impl Into<String>) -> Self {
        Self {
            created_since: Some(since.into()),
        }
    }

    /// Whether a record created at `creation_time` passes the filter.
    #[must_use]
    pub fn matches(&self, creation_time: &str) -> bool {
        self.created_since
            .as_deref()
            .map_or(true, |since| creation_time >= since)
    }
}

#[async_trait]
pub trait RemoteTracker: Send + Sync {
    /// Names of all products the tracker exposes.
    async fn list_products(&self) -> Result<Vec<String>, RemoteError>;

    /// Records of `product` passing `filter`.
    async fn search_records(
        &self,
        product: &str,
        filter: &SearchFilter,
    ) -> Result<RecordSet, RemoteError>;
}
