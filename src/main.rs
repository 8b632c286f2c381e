use chrono::Local;
use clap::Parser;
use landpatents::{config::CrawlConfig, info_time, process::process_site, Result};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let start_time = Local::now();
    let config = CrawlConfig::parse();
    let summary = process_site(&config).await?;
    info_time!(
        start_time,
        "Full program time: {} records, {} images, {} counties ({} skipped)",
        summary.records_written,
        summary.images_downloaded,
        summary.units_processed,
        summary.units_skipped
    );

    Ok(())
}
