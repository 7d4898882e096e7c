use anyhow::Context;
use api_loadtest::client::HttpClient;
use api_loadtest::config::LoadConfig;
use api_loadtest::metrics::Metrics;
use api_loadtest::runner::{Runner, Schedule};
use api_loadtest::scenarios::ScenarioKind;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP load test for the login and product-listing endpoints
#[derive(Parser, Debug)]
#[command(name = "api-loadtest")]
#[command(version)]
struct Cli {
    /// Scenario to run
    #[arg(value_enum)]
    scenario: ScenarioKind,

    /// Concurrent virtual users (overrides LOADTEST_VUS)
    #[arg(long)]
    vus: Option<u32>,

    /// Run duration such as 30s or 1m30s (overrides LOADTEST_DURATION)
    #[arg(long)]
    duration: Option<String>,

    /// Base URL of the API (overrides LOADTEST_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Run a fixed number of iterations per VU instead of a duration
    #[arg(long)]
    iterations: Option<u64>,

    /// Write the end-of-test summary as JSON to this file
    #[arg(long)]
    summary_export: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(config: &LoadConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_new(format!("{level},hyper=warn,reqwest=warn"))
        .unwrap_or_else(|_| EnvFilter::new(level));

    match config.log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_current_span(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = LoadConfig::load()
        .and_then(|c| c.with_overrides(cli.vus, cli.duration.clone(), cli.base_url.clone()))
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load configuration: {e}. Please check your LOADTEST_* environment variables and flags."
            )
        })?;

    setup_logging(&config, cli.verbose);

    info!("Starting api-loadtest v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Config loaded: base_url={}, vus={}, duration={}",
        config.base_url, config.vus, config.duration
    );

    let thresholds = config.threshold_set()?;
    let schedule = Schedule::select(cli.iterations, &config)?;

    let config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());
    let client = HttpClient::new(&config, Arc::clone(&metrics))?;
    let scenario = cli
        .scenario
        .build(&config)
        .with_context(|| format!("Failed to build scenario '{}'", cli.scenario))?;

    let runner = Runner::new(Arc::clone(&config), scenario, client, metrics);

    let stop = runner.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping virtual users after their current iteration");
            stop.store(true, Ordering::Relaxed);
        }
    });

    let summary = runner.run_with_summary(schedule, &thresholds).await;
    println!("{}", summary.render());

    if let Some(path) = &cli.summary_export {
        summary
            .export(path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    Ok(summary.exit_code())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };

    std::process::exit(code);
}
