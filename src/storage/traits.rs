use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::collection::RecordTree;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid product name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("I/O error on '{target}': {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Corrupt tree for '{product}': {reason}")]
    Corruption { product: String, reason: String },
}

impl StorageError {
    pub(crate) fn io(target: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            target: target.to_string(),
            source,
        }
    }
}

/// Persists one [`RecordTree`] per product.
///
/// `write` is the only mutator and overwrites whatever was stored under the
/// product. `read` reports a product that was never written as `Ok(None)`.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Short backend label for logs and metrics.
    fn backend_name(&self) -> &'static str;

    async fn write(&self, product: &str, tree: &RecordTree) -> Result<(), StorageError>;
    async fn read(&self, product: &str) -> Result<Option<RecordTree>, StorageError>;

    /// All products with persisted state.
    async fn list_products(&self) -> Result<BTreeSet<String>, StorageError>;

    /// Default implementation reads the whole tree.
    async fn exists(&self, product: &str) -> Result<bool, StorageError> {
        Ok(self.read(product).await?.is_some())
    }
}

/// Reject names that cannot map to exactly one storage artifact.
///
/// Names are otherwise case-preserving and not sanitized.
pub fn validate_product_name(name: &str) -> Result<(), StorageError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.contains(['/', '\\']) {
        "must not contain path separators"
    } else if name.contains('\0') {
        "must not contain NUL"
    } else if name.starts_with('.') {
        "must not start with '.'"
    } else {
        return Ok(());
    };

    Err(StorageError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Encode a tree to its stored bytes. Deterministic for a given tree.
pub fn encode_tree(tree: &RecordTree) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(tree).map_err(|e| StorageError::Backend(format!("encode failed: {}", e)))
}

/// Decode stored bytes and check the root attributes against the children.
pub fn decode_tree(product: &str, bytes: &[u8]) -> Result<RecordTree, StorageError> {
    let tree: RecordTree = serde_json::from_slice(bytes).map_err(|e| StorageError::Corruption {
        product: product.to_string(),
        reason: e.to_string(),
    })?;

    tree.check_invariants().map_err(|reason| StorageError::Corruption {
        product: product.to_string(),
        reason,
    })?;

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TreeNode;

    fn tree() -> RecordTree {
        RecordTree {
            tag: "bugs".to_string(),
            watermark: "20200101T00:00:00".to_string(),
            count: 1,
            records: vec![TreeNode::branch("bug", vec![
                TreeNode::leaf("id", "1"),
                TreeNode::leaf("creation_time", "20200101T00:00:00"),
            ])],
        }
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("gnote").is_ok());
        assert!(validate_product_name("GNOME Shell").is_ok());
        assert!(validate_product_name("libgnome-2.0").is_ok());

        for bad in ["", "a/b", "a\\b", "nul\0", ".hidden", ".."] {
            assert!(
                matches!(validate_product_name(bad), Err(StorageError::InvalidName { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_encode_decode() {
        let original = tree();
        let bytes = encode_tree(&original).unwrap();
        let decoded = decode_tree("gnote", &bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode_tree(&tree()).unwrap(), encode_tree(&tree()).unwrap());
    }

    #[test]
    fn test_decode_garbage_is_corruption() {
        let err = decode_tree("gnote", b"<bugs>not json</bugs>").unwrap_err();
        assert!(matches!(err, StorageError::Corruption { ref product, .. } if product == "gnote"));
    }

    #[test]
    fn test_decode_checks_invariants() {
        let mut bad = tree();
        bad.count = 5;
        let bytes = serde_json::to_vec(&bad).unwrap();

        let err = decode_tree("gnote", &bytes).unwrap_err();
        assert!(err.to_string().contains("count is 5"));
    }
}
