use anyhow::Result;
use tracing::{error, info};

use pressgraph_core::{AppConfig, Pipeline};

/// Process every configured channel once, strictly in order. A channel
/// failure is logged and the remaining channels still run.
pub async fn run(config: &AppConfig) -> Result<()> {
    if config.channels.is_empty() {
        info!("no channels configured, nothing to do");
        return Ok(());
    }

    let pipeline = Pipeline::new(config)?;

    for channel in &config.channels {
        if let Err(e) = pipeline.process_channel(channel).await {
            error!(channel = %channel.short_name, error = %e, "channel run failed");
        }
    }

    Ok(())
}
