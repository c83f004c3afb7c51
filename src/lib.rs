//! # Bug Mirror
//!
//! An incremental local mirror of a bug tracker's per-product record sets.
//!
//! ## Architecture
//!
//! Each product's records are fetched from a remote tracker, turned into a
//! persisted record tree, and later extended with only the records created
//! since the newest one already stored:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RemoteTracker                          │
//! │  • list_products / search_records(created_since)           │
//! │  • Wrapped in timeout + retry by the Mirror                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  RecordSet
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Record Tree Builder                        │
//! │  • One node per record, one leaf per scalar field          │
//! │  • Nested objects recurse, arrays are dropped              │
//! │  • Watermark = max creation_time, count = records          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  RecordTree
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Merge Engine                           │
//! │  • Same watermark → up to date, nothing written            │
//! │  • Otherwise drop boundary duplicates and append           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TreeStore                             │
//! │  • File (one JSON document per product), SQL, Memory       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bug_mirror::{Mirror, MirrorConfig, RemoteTracker};
//!
//! # async fn run(tracker: Arc<dyn RemoteTracker>) -> bug_mirror::Result<()> {
//! let config = MirrorConfig {
//!     root_dir: "/var/lib/bug-mirror".into(),
//!     database: "gnome".into(),
//!     ..Default::default()
//! };
//! let mirror = Mirror::open(config, tracker).await?;
//!
//! // First run fetches everything, later runs only what is new
//! let outcome = mirror.update("gnote").await?;
//! println!("gnote: {}", outcome);
//!
//! let tree = mirror.query("gnote").await?;
//! println!("{} bugs, newest created at {}", tree.count, tree.watermark);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`Mirror`] facade (download, update, query, bulk runs)
//! - [`record`]: Record → tree node conversion
//! - [`collection`]: Record sets and record trees
//! - [`merge`]: Incremental merge of fresh records into a stored tree
//! - [`storage`]: Tree stores (file, SQL, memory)
//! - [`remote`]: The remote tracker seam
//! - [`resilience`]: Retry policies for remote and startup calls

pub mod config;
pub mod error;
pub mod record;
pub mod collection;
pub mod storage;
pub mod merge;
pub mod remote;
pub mod resilience;
pub mod coordinator;
pub mod metrics;

pub use config::MirrorConfig;
pub use coordinator::{Mirror, SyncOutcome, BatchResult};
pub use error::{MirrorError, Result};
pub use record::{Record, TreeNode, NodeBody, FieldShape, build_node};
pub use collection::{RecordSet, RecordTree, serialize_batch};
pub use storage::traits::{TreeStore, StorageError};
pub use storage::file::FileTreeStore;
pub use storage::memory::InMemoryTreeStore;
pub use storage::sql::SqlTreeStore;
pub use remote::{RemoteTracker, RemoteError, SearchFilter};
pub use merge::{MergeOutcome, plan_merge, merge};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
