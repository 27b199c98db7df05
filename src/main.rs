//! Log Collector - tails a directory of log files to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use log_collector::config::{CollectorConfig, ConfigLoader};
use log_collector::record::{ConsoleSink, DefaultParser};
use log_collector::watcher::{
    ensure_directory, Collector, CollectorError, NotifyWatcher, SharedSource,
};

#[derive(Parser)]
#[command(
    name = "log-collector",
    about = "Tail a directory of log files and emit new lines as JSON records",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch (overrides config).
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// File name glob, e.g. "*.log" (overrides config).
    #[arg(short, long)]
    pattern: Option<String>,

    /// Seconds between directory rescans (overrides config).
    #[arg(short, long)]
    interval: Option<u64>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Records own stdout; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<CollectorConfig, CollectorError> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    if let Some(dir) = &cli.dir {
        config.log_directory.clone_from(dir);
    }
    if let Some(pattern) = &cli.pattern {
        config.file_pattern.clone_from(pattern);
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CollectorError> {
    let config = load_config(&cli)?;
    ensure_directory(&config.log_directory)?;

    let (watcher, events) = NotifyWatcher::new(config.debounce())?;
    let source: SharedSource = Arc::new(Mutex::new(watcher));

    let collector = Collector::new(
        &config,
        source,
        Arc::new(DefaultParser::new()),
        Arc::new(ConsoleSink::new()),
    )?;

    tracing::info!(
        directory = %collector.directory().display(),
        pattern = %config.file_pattern,
        interval_secs = config.poll_interval_secs,
        "Starting log collector"
    );

    let cancel = collector.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, draining");
            cancel.cancel();
        }
    });

    collector.run(events).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Log collector failed");
        eprintln!("log-collector: {e}");
        std::process::exit(1);
    }
}
