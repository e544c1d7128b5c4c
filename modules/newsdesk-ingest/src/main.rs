use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use newsdesk_common::Config;
use newsdesk_ingest::{Ingestor, MemoryStore};

#[derive(Parser)]
#[command(name = "newsdesk-ingest", about = "Article discovery and ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic monitoring loop.
    Monitor,
    /// Run a single manual ingestion pass.
    Run,
    /// Discover a feed URL for a site.
    Discover { url: String },
    /// Check whether a URL serves feed content.
    Validate { url: String },
    /// Retry date extraction for recent date-less articles.
    EnrichDates {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newsdesk=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    // The persistence backend is deployment-specific; stand-alone runs use
    // the in-memory store.
    let store = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::from_config(store, &config);

    match cli.command {
        Command::Monitor => {
            let monitor = ingestor.monitor();
            monitor.start();
            info!(
                interval_minutes = config.check_interval_minutes,
                "Monitoring sources"
            );
            ingestor.run_periodic().await;
        }
        Command::Run => {
            let report = ingestor.run_pass(true).await?;
            print!("{report}");
        }
        Command::Discover { url } => match ingestor.discover_feed_url(&url).await {
            Some(feed) => println!("{feed}"),
            None => {
                println!("No feed found for {url}");
                std::process::exit(1);
            }
        },
        Command::Validate { url } => {
            if ingestor.validate_feed(&url).await {
                println!("{url} serves feed content");
            } else {
                println!("{url} is not a feed");
                std::process::exit(1);
            }
        }
        Command::EnrichDates { limit } => {
            let enriched = ingestor.enrich_missing_dates(limit).await?;
            println!("Enriched {enriched} article dates");
        }
    }

    Ok(())
}
