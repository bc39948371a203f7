//! Magnate node binary
//!
//! Backend progression engine for an incremental-game economy.

use magnate_engine::{Node, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "magnate_node=info,magnate_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Magnate node");

    let config = NodeConfig::from_env();

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}
