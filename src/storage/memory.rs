use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{decode_tree, encode_tree, validate_product_name, StorageError, TreeStore};
use crate::collection::RecordTree;

/// Keeps encoded trees in memory.
///
/// Trees go through the same encoding as the durable backends, so byte-level
/// comparisons and corruption checks behave the same way.
pub struct InMemoryTreeStore {
    data: DashMap<String, Vec<u8>>,
    writes: AtomicU64,
}

impl InMemoryTreeStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of products held
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of successful `write` calls since creation
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Stored bytes for a product, if any
    #[must_use]
    pub fn raw(&self, product: &str) -> Option<Vec<u8>> {
        self.data.get(product).map(|r| r.value().clone())
    }

    /// Store bytes verbatim, bypassing encoding (does not count as a write)
    pub fn insert_raw(&self, product: &str, bytes: Vec<u8>) {
        self.data.insert(product.to_string(), bytes);
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, product: &str, tree: &RecordTree) -> Result<(), StorageError> {
        validate_product_name(product)?;
        let bytes = encode_tree(tree)?;
        self.data.insert(product.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::Release);
        Ok(())
    }

    async fn read(&self, product: &str) -> Result<Option<RecordTree>, StorageError> {
        validate_product_name(product)?;
        match self.data.get(product) {
            Some(bytes) => decode_tree(product, bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    async fn list_products(&self) -> Result<BTreeSet<String>, StorageError> {
        Ok(self.data.iter().map(|r| r.key().clone()).collect())
    }

    async fn exists(&self, product: &str) -> Result<bool, StorageError> {
        validate_product_name(product)?;
        Ok(self.data.contains_key(product))
    }
}
