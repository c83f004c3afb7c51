// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File-backed tree store.
//!
//! One directory per database, one `<product>.json` file per product:
//!
//! ```text
//! ./gnome/
//!   gnote.json
//!   Gnumeric.json
//!   libgnome.json
//! ```
//!
//! Writes go to a hidden temp file in the same directory and are renamed
//! over the target, so a reader never sees a half-written tree.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::traits::{decode_tree, encode_tree, validate_product_name, StorageError, TreeStore};
use crate::collection::RecordTree;

/// Database directory used when none is named.
pub const DEFAULT_DATABASE: &str = "default";

pub struct FileTreeStore {
    dir: PathBuf,
}

impl FileTreeStore {
    pub const EXTENSION: &'static str = "json";

    /// Open (creating if needed) the database directory `root/database`.
    pub async fn open(root: impl AsRef<Path>, database: &str) -> Result<Self, StorageError> {
        let database = if database.is_empty() { DEFAULT_DATABASE } else { database };
        let dir = root.as_ref().join(database);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(dir.display(), e))?;

        info!(dir = %dir.display(), "File tree store opened");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `product`'s tree.
    pub fn path_for(&self, product: &str) -> Result<PathBuf, StorageError> {
        validate_product_name(product)?;
        Ok(self.dir.join(format!("{}.{}", product, Self::EXTENSION)))
    }

    fn temp_path_for(&self, product: &str) -> PathBuf {
        self.dir.join(format!(".{}.{}.tmp", product, Self::EXTENSION))
    }
}

#[async_trait]
impl TreeStore for FileTreeStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn write(&self, product: &str, tree: &RecordTree) -> Result<(), StorageError> {
        let path = self.path_for(product)?;
        let temp = self.temp_path_for(product);
        let bytes = encode_tree(tree)?;

        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| StorageError::io(temp.display(), e))?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                warn!(path = %temp.display(), error = %cleanup, "Could not remove temp tree file");
            }
            return Err(StorageError::io(path.display(), e));
        }

        debug!(product, path = %path.display(), bytes = bytes.len(), "Tree written");
        Ok(())
    }

    async fn read(&self, product: &str) -> Result<Option<RecordTree>, StorageError> {
        let path = self.path_for(product)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => decode_tree(product, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path.display(), e)),
        }
    }

    async fn list_products(&self) -> Result<BTreeSet<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(self.dir.display(), e))?;

        let suffix = format!(".{}", Self::EXTENSION);
        let mut products = BTreeSet::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(self.dir.display(), e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(product) = name.strip_suffix(&suffix) {
                if !product.is_empty() {
                    products.insert(product.to_string());
                }
            }
        }

        Ok(products)
    }

    async fn exists(&self, product: &str) -> Result<bool, StorageError> {
        let path = self.path_for(product)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(path.display(), e))
    }
}
