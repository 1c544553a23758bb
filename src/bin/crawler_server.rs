// src/bin/crawler_server.rs
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;
use ticker_crawler::{Crawler, CrawlerConfig};

#[derive(Parser)]
#[command(name = "crawler-server")]
#[command(about = "Surveys ticker symbols after hours and records quotes while the market is open", long_about = None)]
struct Args {
    /// Overrides CRAWLER_DATA_DIR.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Overrides CRAWLER_WORKERS.
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = CrawlerConfig::from_env()?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;

    info!("📁 Data directory: {}", config.data_dir.display());
    info!(
        "🕘 Market hours {}..{} minutes ({})",
        config.market_hours.open_minute,
        config.market_hours.close_minute,
        config.market_hours.timezone
    );

    let crawler = Crawler::from_config(&config)?;
    let summary = crawler.run(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}. Shutting down.", e),
        }
    })?;

    println!("✅ Crawler stopped: {}", summary);
    Ok(())
}
