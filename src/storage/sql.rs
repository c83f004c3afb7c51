// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL tree store (SQLite or MySQL through sqlx `Any`).
//!
//! One row per product. The root attributes get their own columns so they
//! can be inspected without decoding the payload:
//!
//! ```sql
//! CREATE TABLE product_trees (
//!   product VARBINARY(255) PRIMARY KEY,  -- case-sensitive key
//!   tag TEXT NOT NULL,
//!   watermark TEXT NOT NULL,
//!   record_count BIGINT NOT NULL,
//!   payload LONGTEXT NOT NULL     -- encoded RecordTree
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! MySQL LONGTEXT and VARBINARY come back through the `Any` driver as bytes,
//! so text columns are read as `String` first and `Vec<u8>` second.

use std::collections::BTreeSet;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use super::traits::{decode_tree, encode_tree, validate_product_name, StorageError, TreeStore};
use crate::collection::RecordTree;
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlTreeStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlTreeStore {
    /// Connect with startup-mode retry (fails fast if config is wrong).
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(sqlite = is_sqlite, "SQL tree store connected");
        Ok(store)
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    /// Table definition for the connected dialect.
    ///
    /// MySQL compares product names under a case-insensitive collation by
    /// default, so the key is stored as bytes to keep `Gnome` and `gnome`
    /// apart.
    fn schema_sql(is_sqlite: bool) -> &'static str {
        if is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS product_trees (
                product TEXT PRIMARY KEY,
                tag TEXT NOT NULL,
                watermark TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                payload TEXT NOT NULL
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS product_trees (
                product VARBINARY(255) PRIMARY KEY,
                tag TEXT NOT NULL,
                watermark TEXT NOT NULL,
                record_count BIGINT NOT NULL,
                payload LONGTEXT NOT NULL
            )
            "#
        }
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = Self::schema_sql(self.is_sqlite);

        retry("sql_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    /// Read a text column as String (SQLite) or bytes (MySQL LONGTEXT).
    fn text_column(row: &AnyRow, column: &str) -> Option<String> {
        row.try_get::<String, _>(column).ok().or_else(|| {
            row.try_get::<Vec<u8>, _>(column)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
    }
}

#[async_trait]
impl TreeStore for SqlTreeStore {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    async fn write(&self, product: &str, tree: &RecordTree) -> Result<(), StorageError> {
        validate_product_name(product)?;

        let payload = String::from_utf8(encode_tree(tree)?)
            .map_err(|e| StorageError::Backend(format!("encoded tree is not UTF-8: {}", e)))?;
        let record_count = tree.count as i64;

        let sql = if self.is_sqlite {
            "INSERT INTO product_trees (product, tag, watermark, record_count, payload)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(product) DO UPDATE SET
                tag = excluded.tag,
                watermark = excluded.watermark,
                record_count = excluded.record_count,
                payload = excluded.payload"
        } else {
            "INSERT INTO product_trees (product, tag, watermark, record_count, payload)
             VALUES (?, ?, ?, ?, ?)
             ON DUPLICATE KEY UPDATE
                tag = VALUES(tag),
                watermark = VALUES(watermark),
                record_count = VALUES(record_count),
                payload = VALUES(payload)"
        };

        retry("sql_write_tree", &RetryConfig::query(), || async {
            sqlx::query(sql)
                .bind(product)
                .bind(&tree.tag)
                .bind(&tree.watermark)
                .bind(record_count)
                .bind(&payload)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok::<_, StorageError>(())
        })
        .await?;

        debug!(product, watermark = %tree.watermark, count = tree.count, "Tree row written");
        Ok(())
    }

    async fn read(&self, product: &str) -> Result<Option<RecordTree>, StorageError> {
        validate_product_name(product)?;

        let row = retry("sql_read_tree", &RetryConfig::query(), || async {
            sqlx::query(
                "SELECT watermark, record_count, payload FROM product_trees WHERE product = ?",
            )
            .bind(product)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let corruption = |reason: String| StorageError::Corruption {
            product: product.to_string(),
            reason,
        };

        let payload = Self::text_column(&row, "payload")
            .ok_or_else(|| corruption("payload column unreadable".to_string()))?;
        let tree = decode_tree(product, payload.as_bytes())?;

        let watermark = Self::text_column(&row, "watermark").unwrap_or_default();
        let record_count: i64 = row.try_get("record_count").unwrap_or(-1);
        if watermark != tree.watermark || record_count != tree.count as i64 {
            return Err(corruption(format!(
                "row columns (watermark '{}', count {}) disagree with payload (watermark '{}', count {})",
                watermark, record_count, tree.watermark, tree.count
            )));
        }

        Ok(Some(tree))
    }

    async fn list_products(&self) -> Result<BTreeSet<String>, StorageError> {
        let rows = retry("sql_list_products", &RetryConfig::query(), || async {
            sqlx::query("SELECT product FROM product_trees")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| Self::text_column(row, "product"))
            .collect())
    }

    async fn exists(&self, product: &str) -> Result<bool, StorageError> {
        validate_product_name(product)?;

        retry("sql_exists", &RetryConfig::query(), || async {
            let result = sqlx::query("SELECT 1 FROM product_trees WHERE product = ? LIMIT 1")
                .bind(product)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok::<_, StorageError>(result.is_some())
        })
        .await
    }
}
