// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for the mirror.
//!
//! Storage backends and the remote tracker each have their own error type
//! ([`StorageError`], [`RemoteError`]). [`MirrorError`] is what the
//! [`Mirror`](crate::Mirror) facade surfaces to callers.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::traits::StorageError;

#[derive(Error, Debug)]
pub enum MirrorError {
    /// A required identifier was missing or unusable. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot serialize an empty '{tag}' batch")]
    EmptyBatch { tag: String },

    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// The storage medium could not be read or written.
    #[error("Storage failure: {0}")]
    Io(#[source] StorageError),

    #[error("Corrupt state for '{product}': {reason}")]
    CorruptState { product: String, reason: String },

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(#[from] RemoteError),
}

impl MirrorError {
    /// Short label used for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EmptyBatch { .. } => "empty_batch",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::Io(_) => "io",
            Self::CorruptState { .. } => "corrupt_state",
            Self::RemoteFetch(_) => "remote_fetch",
        }
    }
}

impl From<StorageError> for MirrorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName { name, reason } => {
                Self::Validation(format!("invalid product name '{}': {}", name, reason))
            }
            StorageError::Corruption { product, reason } => Self::CorruptState { product, reason },
            other => Self::Io(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
