use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use shopinfo_harvester::application::export_to_file;
use shopinfo_harvester::infrastructure::{init_logging_with_config, AppConfig};
use shopinfo_harvester::Harvester;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional single argument: path to a TOML config file.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging_with_config(config.logging.clone())?;

    let output = config.output.path.clone();
    let harvester = Harvester::from_config(config)?;

    let shutdown = harvester.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, stopping harvest");
            shutdown.cancel();
        }
    });

    info!("🚀 Starting harvest");
    let summary = harvester.run().await?;
    export_to_file(&summary, &output).await?;

    info!(
        "Done: {} shops, {} products, {} panicked, {} cancelled",
        summary.reports.len(),
        summary.product_count(),
        summary.panicked,
        summary.cancelled
    );
    Ok(())
}
