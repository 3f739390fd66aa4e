use std::path::Path;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use yt_channel_stats::{config, run};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report; logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("yt_channel_stats=warn"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = config::load(Path::new(".env"))?;

    let outcome = run(&config).await?;
    tracing::debug!("finished: {:?}", outcome);
    Ok(())
}
