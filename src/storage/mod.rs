//! Tree store backends: files (default), SQL, memory.

pub mod traits;
pub mod file;
pub mod memory;
pub mod sql;

use std::sync::Arc;

use crate::config::MirrorConfig;
use traits::{StorageError, TreeStore};

/// Open the backend selected by `config`: SQL when `sql_url` is set,
/// otherwise the file store under `root_dir/database`.
pub async fn open(config: &MirrorConfig) -> Result<Arc<dyn TreeStore>, StorageError> {
    match config.sql_url {
        Some(ref url) => Ok(Arc::new(sql::SqlTreeStore::new(url).await?)),
        None => Ok(Arc::new(
            file::FileTreeStore::open(&config.root_dir, &config.database).await?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_defaults_to_file_store() {
        let root = tempdir().unwrap();
        let config = MirrorConfig {
            root_dir: root.path().to_path_buf(),
            database: "gnome".into(),
            ..Default::default()
        };

        let store = open(&config).await.unwrap();
        assert_eq!(store.backend_name(), "file");
        assert!(root.path().join("gnome").is_dir());
    }

    #[tokio::test]
    async fn test_open_sql_store() {
        let root = tempdir().unwrap();
        let config = MirrorConfig {
            sql_url: Some(format!("sqlite://{}?mode=rwc", root.path().join("m.db").display())),
            ..Default::default()
        };

        let store = open(&config).await.unwrap();
        assert_eq!(store.backend_name(), "sql");
    }
}
