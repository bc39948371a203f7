//! Node wiring - configuration, shared state, and the run loop.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API for clients (catalog, ledger, purchases, stats)
//! - Access gate issuing bearer sessions

use crate::api;
use crate::auth::AuthGate;
use crate::engine::Engine;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a Magnate node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Username always granted admin at registration (bootstrap override;
    /// the first registered account is admin regardless)
    pub admin_username: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("MAGNATE_DATA_DIR").unwrap_or_else(|_| "./magnate-data".to_string()),
        );

        let api_addr = std::env::var("MAGNATE_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid MAGNATE_API_ADDR");

        let admin_username = std::env::var("MAGNATE_ADMIN_USER").ok().filter(|s| !s.is_empty());

        Self {
            data_dir,
            api_addr,
            admin_username,
        }
    }
}

/// Shared state handed to every API handler - one storage instance behind
/// the components that use it.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub ledger: Ledger,
    pub engine: Engine,
    pub gate: AuthGate,
}

impl AppState {
    /// Build the component stack over one opened storage.
    pub fn new(storage: Arc<Storage>, admin_username: Option<String>) -> Self {
        Self {
            ledger: Ledger::new(Arc::clone(&storage)),
            engine: Engine::new(Arc::clone(&storage)),
            gate: AuthGate::new(Arc::clone(&storage), admin_username),
            storage,
        }
    }
}

/// A Magnate node instance.
pub struct Node {
    state: AppState,
    config: NodeConfig,
}

impl Node {
    /// Create a new node, opening (or creating) its storage.
    pub fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Arc::new(Storage::open(&config.data_dir)?);
        let state = AppState::new(storage, config.admin_username.clone());
        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers and tests).
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the node (starts the HTTP server).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Magnate node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let app = api::build_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
