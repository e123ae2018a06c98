use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hiscores_client::HttpPageFetcher;
use rank_scout::checkpoint::JsonCheckpointStore;
use rank_scout::config::AppConfig;
use rank_scout::locator::BoundaryLocator;
use rank_scout::logging::{self, LOG_RETENTION_DAYS};
use rank_scout::orchestrator::RunOrchestrator;
use rank_scout::publisher::{JsonReportPublisher, LogPublisher, Publisher};
use rank_scout::rate_limiter::RateLimiter;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Find the last ranked player of every metric (default)
    #[default]
    LastRanks,
    /// Collect the top players of every metric
    Leaders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let _guard = logging::init_logging(&config.log_dir, args.verbose, args.quiet)
        .context("Failed to initialize logging")?;

    if let Err(e) = logging::cleanup_old_logs(&config.log_dir, LOG_RETENTION_DAYS).await {
        warn!(error = %e, "Failed to cleanup old logs");
    }

    let fetcher = HttpPageFetcher::new(&config.fetcher_config())
        .context("Failed to create hiscores client")?;
    let locator = BoundaryLocator::new(
        fetcher,
        RateLimiter::new(&config.rate_limit),
        config.retry.clone(),
        config.search.clone(),
    );

    let publisher: Arc<dyn Publisher> = match &config.report_path {
        Some(path) => Arc::new(JsonReportPublisher::new(path)),
        None => Arc::new(LogPublisher),
    };
    let orchestrator = RunOrchestrator::new(
        locator,
        config.registry(),
        Arc::new(JsonCheckpointStore::new(&config.checkpoint_path)),
        publisher,
    )
    .with_metric_limit(config.metric_limit);

    match args.command.unwrap_or_default() {
        Command::LastRanks => {
            let report = orchestrator
                .run_last_ranks()
                .await
                .context("Last rank run failed")?;
            for failure in &report.failures {
                warn!(metric = %failure.metric, "No result: {}", failure.error);
            }
            info!(
                found = report.success_count(),
                failed = report.failure_count(),
                published = report.published,
                "Done"
            );
        }
        Command::Leaders => {
            let report = orchestrator
                .run_leaders()
                .await
                .context("Leaders run failed")?;
            info!(
                leaders = report.leaders.len(),
                failed = report.failures.len(),
                published = report.published,
                "Done"
            );
        }
    }

    Ok(())
}
