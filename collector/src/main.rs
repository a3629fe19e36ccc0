//! Metron collector entry point
//!
//! Runs the full collection pipeline: per-test resource sampling, optional
//! functional-metrics extraction, historical table appends, and publishing
//! to the remote artifact store.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use metron_collector::{
    config::{CollectorConfig, RunOptions},
    error::{format_error, Result},
    pipeline::CollectorService,
};

/// Metron collector command line interface
#[derive(Parser)]
#[command(name = "metron")]
#[command(about = "Collects test resource metrics and appends them to remote CSV history")]
#[command(version)]
struct Cli {
    /// Path to the JSON file describing tests and their metric groups
    #[arg(short = 'j', long, default_value = "./descriptors/performance_tests.json")]
    descriptors: PathBuf,

    /// Path to the HTML dashboard stamped with host information
    #[arg(long)]
    dashboard: Option<PathBuf>,

    /// Path to the test executable
    #[arg(short = 't', long, default_value = "./build/tests/performance-tests")]
    test_exec: PathBuf,

    /// Directory for logs, recordings, reports and built tables
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Base URL of the artifact store (derived from ARTIFACTORY_HOST when omitted)
    #[arg(short = 'a', long)]
    store_url: Option<String>,

    /// Run identifier recorded in the version column of every table
    #[arg(long, env = "CI_JOB_ID")]
    version_token: Option<String>,

    /// Build the tables locally without uploading them
    #[arg(long)]
    no_upload: bool,

    /// Also run the batched functional-metrics pass
    #[arg(long)]
    functional_metrics: bool,

    /// Monitor program attached to the running test process
    #[arg(long, default_value = "psrecord")]
    monitor: String,

    /// Monitor sampling interval in seconds
    #[arg(long, default_value_t = 0.5)]
    interval: f64,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    initialize_logging(&cli);

    if let Err(e) = run(cli).await {
        error!(category = e.category(), "run failed");
        eprintln!("{}", format_error(&e));
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = RunOptions {
        descriptor_file: cli.descriptors,
        dashboard_file: cli.dashboard,
        test_executable: cli.test_exec,
        output_dir: cli.output_dir,
        store_url: cli.store_url,
        version_token: cli.version_token,
        monitor_program: cli.monitor,
        sample_interval_secs: cli.interval,
        functional_metrics: cli.functional_metrics,
        no_upload: cli.no_upload,
    };

    let config = CollectorConfig::resolve_from_env(options)?;
    config.validate()?;

    let summary = CollectorService::new(config).run().await?;

    info!(
        tests = summary.tests_measured,
        artifacts = summary.artifacts.len(),
        published = summary.published,
        "run completed"
    );
    Ok(())
}

/// Initialize logging based on the CLI flags
fn initialize_logging(cli: &Cli) {
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "metron_collector={log_level},metron={log_level},hyper=warn,reqwest=warn"
        ))
    });

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
