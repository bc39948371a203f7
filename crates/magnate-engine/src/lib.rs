//! Magnate - progression engine for an incremental-game economy.
//!
//! Authenticated users accumulate typed resources and spend them to unlock
//! a fixed catalog of upgrades; each upgrade carries a production multiplier
//! and may require owning a prerequisite upgrade first.
//!
//! # Architecture
//!
//! - **Models**: catalog entities (Resource, Upgrade) and ownership links
//! - **Storage**: RocksDB-backed persistent store enforcing the link
//!   uniqueness invariants
//! - **Ledger**: per-user holdings and idempotent bulk initialization
//! - **Engine**: purchase validation and next-available/next-locked queries
//! - **Stats**: per-user resource aggregation
//! - **Auth**: accounts, bearer sessions, admin gating
//! - **API**: HTTP endpoints
//!
//! # Example
//!
//! ```no_run
//! use magnate_engine::{Node, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let node = Node::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod node;
pub mod stats;
pub mod storage;

pub use engine::{Engine, NextUpgrades, Pagination, SortField, SortOrder, UpgradePage, UpgradeQuery};
pub use error::{Error, Result};
pub use ledger::{Ledger, ResourceHolding};
pub use models::{PurchasedUpgrade, Resource, StoredUser, Upgrade, User, UserResourceLink, UserUpgradeLink};
pub use node::{AppState, Node, NodeConfig};
pub use stats::{user_resource_stats, ResourceStat, UserResourceStats};
pub use storage::Storage;
