//! Shards Demo - Main entry point

use shards_core::RouterConfig;
use shards_demo::{DemoCluster, DEMO_USERS};
use shards_router::ShardedSession;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration from environment
    let config = RouterConfig::from_env();
    let virtual_west = std::env::var("SHARDS_VIRTUAL_WEST").map_or(false, |v| v == "1" || v == "true");

    let cluster = DemoCluster::new(virtual_west);
    let session = ShardedSession::from_config(&cluster.topology, &config)?;

    let report = shards_demo::run(&session, &config, DEMO_USERS).await?;
    info!(
        placements = ?report.placements,
        east_users = cluster.east.row_count("User"),
        west_users = cluster.west.row_count("User"),
        "Demo finished"
    );

    session.close()?;
    Ok(())
}
