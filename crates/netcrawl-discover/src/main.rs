//! CLI entry point for the netcrawl topology crawler.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use netcrawl_discover::config::load_crawl_config;
use netcrawl_discover::report::TopologyReport;
use netcrawl_discover::ssh::SshConnector;
use netcrawl_discover::strategy::strategies_from_config;
use netcrawl_discover::{ExploreOptions, Explorer};

#[derive(Parser)]
#[command(name = "netcrawl")]
#[command(about = "Map a network by crawling CDP neighbors over SSH")]
struct Cli {
    /// Device to start from (IP address or host name).
    #[arg(short, long)]
    root: String,

    /// Config file prefix (default: netcrawl).
    #[arg(short, long, default_value = "netcrawl")]
    config: String,

    /// Print the topology as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Override crawl.max_concurrent_discoveries.
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut crawl_config = load_crawl_config(&cli.config)?;
    if let Some(max) = cli.max_concurrent {
        crawl_config.max_concurrent_discoveries = max;
    }

    let connector = Arc::new(SshConnector::new(crawl_config.port));
    let strategies = strategies_from_config(&crawl_config, connector)?;
    let explorer = Explorer::new(strategies, ExploreOptions::from(&crawl_config))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight discoveries");
            let _ = cancel_tx.send(true);
        }
    });

    let result = explorer.explore(&cli.root, cancel_rx).await?;
    let report = TopologyReport::from_result(&result);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(())
}
