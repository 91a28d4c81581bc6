//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `reality_checker` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Ctrl-C handling
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use reality_checker::batch::LogProgressObserver;
use reality_checker::initialization::{init_crypto_provider, init_logger_with};
use reality_checker::report::{render_text, BatchReport};
use reality_checker::{BatchManager, Config, DetectionResult, LogFormat, LogLevel, OutputFormat};

/// Checks domains for suitability as Reality camouflage targets.
#[derive(Debug, Parser)]
#[command(
    name = "reality-checker",
    version,
    about = "Checks whether domains are suitable Reality camouflage targets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file; command-line flags override its values
    #[arg(long, global = true, value_parser)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Report format
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Maximum number of domains checked concurrently
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Network timeout per request, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Upper bound for one domain's whole check, in seconds
    #[arg(long, global = true)]
    domain_timeout: Option<u64>,

    /// Upper bound for a whole batch, in seconds
    #[arg(long, global = true)]
    batch_timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a single domain
    Check {
        /// Domain to check, e.g. www.microsoft.com
        domain: String,
    },
    /// Check many domains on a worker pool
    Batch {
        /// Domains to check
        domains: Vec<String>,

        /// File with one domain per line (`#` starts a comment)
        #[arg(long, short, value_parser)]
        file: Option<PathBuf>,

        /// Print each result as soon as it lands
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    init_logger_with(config.log_level(cli.log_level.clone().into()), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    // Initialize crypto provider for TLS operations
    init_crypto_provider();

    if let Err(e) = run(cli, config).await {
        eprintln!("reality-checker error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    colored::control::set_override(config.output.color);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling checks");
                cancel.cancel();
            }
        });
    }

    let mut manager = BatchManager::new(config);
    manager.start().context("Failed to start checker")?;

    let (domains, stream) = match &cli.command {
        Command::Check { domain } => (vec![domain.clone()], false),
        Command::Batch {
            domains,
            file,
            stream,
        } => {
            let mut all = domains.clone();
            if let Some(path) = file {
                all.extend(read_domain_file(path).await?);
            }
            (all, *stream || manager.config().batch.stream_output)
        }
    };
    if domains.is_empty() {
        bail!("No domains given; pass them as arguments or with --file");
    }

    let start = Utc::now();
    let results = if stream {
        stream_results(&manager, domains, cancel.clone()).await?
    } else if manager.config().batch.progress_bar {
        manager
            .check_domains_with_progress(&domains, &cancel, Arc::new(LogProgressObserver))
            .await
            .context("Batch check failed")?
    } else {
        manager
            .check_domains(&domains, &cancel)
            .await
            .context("Batch check failed")?
    };
    let report = BatchReport::new(results, start, Utc::now());

    let is_batch = matches!(cli.command, Command::Batch { .. });
    match manager.config().report_format(is_batch) {
        OutputFormat::Table => print!("{}", render_text(&report, manager.config().output.color)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
    }

    if let Some(stats) = manager.cache_stats() {
        info!(
            "Cache: {} dns, {} cdn, {} results, hit rate {:.1}%",
            stats.dns_cache_size,
            stats.cdn_cache_size,
            stats.result_cache_size,
            stats.hit_rate * 100.0
        );
    }
    manager.stop().context("Failed to stop checker")?;
    Ok(())
}

/// Prints one line per landed result and returns them in input order.
async fn stream_results(
    manager: &BatchManager,
    domains: Vec<String>,
    cancel: CancellationToken,
) -> Result<Vec<DetectionResult>> {
    let total = domains.len();
    let stream = manager
        .check_domains_stream(domains, cancel.clone())
        .context("Failed to start streaming batch")?;
    futures::pin_mut!(stream);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = stream.next().await {
        let line = match &result.error {
            _ if result.suitable => format!("suitable ({})", reality_checker::scoring::recommendation(&result)),
            Some(error) => error.to_string(),
            None => "unsuitable".to_string(),
        };
        println!("[{}/{}] {}: {}", results.len() + 1, total, result.domain, line);
        results.push(result);
    }
    if cancel.is_cancelled() {
        bail!("Batch cancelled");
    }
    results.sort_by_key(|r| r.index);
    Ok(results)
}

async fn read_domain_file(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read domain file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<Config>(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(format) = cli.output {
        config.output.format = format;
        config.batch.report_format = format;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency.max_concurrent = concurrency;
    }
    if let Some(secs) = cli.timeout {
        config.network.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.domain_timeout {
        config.concurrency.domain_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.batch_timeout {
        config.batch.timeout = Duration::from_secs(secs);
    }
    if cli.no_color {
        config.output.color = false;
    }
    Ok(config)
}
