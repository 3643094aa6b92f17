//! Rate-limit guard CLI.
//!
//! Drives traffic at an endpoint through a [`GuardedClient`] so the guard's
//! behaviour can be watched against a real server, and inspects configs.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use rate_limit_guard::config::{load_config, AdmissionMode, GuardConfig};
use rate_limit_guard::observability::{logging::init_logging, metrics::init_metrics};
use rate_limit_guard::resilience::backoff::retry_delay;
use rate_limit_guard::{Alert, Guard, GuardError, GuardSnapshot, GuardedClient};

const RETRY_BASE_MS: u64 = 250;
const RETRY_MAX_MS: u64 = 10_000;

#[derive(Parser)]
#[command(name = "rate-limit-guard")]
#[command(about = "Client-side rate-limit guard", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `observability.log_level`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send GET requests to a URL through the guard
    Run {
        #[arg(short, long)]
        url: String,

        #[arg(short = 'n', long, default_value_t = 100)]
        requests: usize,

        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Queue refused requests instead of failing them
        #[arg(long)]
        queue: bool,

        #[arg(long, default_value_t = 5)]
        max_attempts: u32,
    },
    /// Validate the configuration and print its effective form
    CheckConfig,
    /// Print the state of a fresh guard
    Status,
}

#[derive(Default)]
struct Tally {
    succeeded: AtomicUsize,
    failed_status: AtomicUsize,
    blocked: AtomicUsize,
    cancelled: AtomicUsize,
    overloaded: AtomicUsize,
    transport_errors: AtomicUsize,
    retries: AtomicUsize,
    gave_up: AtomicUsize,
}

impl Tally {
    fn record_error(&self, err: &GuardError) {
        let counter = match err {
            GuardError::Blocked { .. } => &self.blocked,
            GuardError::Cancelled { .. } => &self.cancelled,
            GuardError::ServerOverload { .. } => &self.overloaded,
            GuardError::Transport(_) | GuardError::QueueClosed => &self.transport_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize)]
struct Summary {
    requests: usize,
    interrupted: bool,
    succeeded: usize,
    failed_status: usize,
    blocked: usize,
    cancelled: usize,
    overloaded: usize,
    transport_errors: usize,
    retries: usize,
    gave_up: usize,
    final_state: GuardSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Commands::Run { queue: true, .. } = &cli.command {
        config.admission.mode = AdmissionMode::Queue;
    }

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_logging(&level);

    match cli.command {
        Commands::Run {
            url,
            requests,
            concurrency,
            max_attempts,
            ..
        } => run(config, url, requests, concurrency, max_attempts).await?,
        Commands::CheckConfig => {
            Guard::new(config.clone())?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Status => {
            let guard = Guard::new(config)?;
            println!("{}", serde_json::to_string_pretty(&guard.state())?);
        }
    }

    Ok(())
}

async fn run(
    config: GuardConfig,
    url: String,
    requests: usize,
    concurrency: usize,
    max_attempts: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let guard = Guard::new(config)?;
    let client = GuardedClient::from_guard(guard.clone())?;
    let _banner = guard.subscribe(alert_logger());

    tracing::info!(
        url = %url,
        requests,
        concurrency,
        mode = ?guard.config().admission.mode,
        "Starting run"
    );

    let tally = Arc::new(Tally::default());
    let work = drive(
        client,
        url,
        requests,
        concurrency.max(1),
        max_attempts.max(1),
        tally.clone(),
    );

    let interrupted = tokio::select! {
        _ = work => false,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling in-flight requests");
            guard.cancel_all();
            true
        }
    };

    let summary = Summary {
        requests,
        interrupted,
        succeeded: tally.succeeded.load(Ordering::Relaxed),
        failed_status: tally.failed_status.load(Ordering::Relaxed),
        blocked: tally.blocked.load(Ordering::Relaxed),
        cancelled: tally.cancelled.load(Ordering::Relaxed),
        overloaded: tally.overloaded.load(Ordering::Relaxed),
        transport_errors: tally.transport_errors.load(Ordering::Relaxed),
        retries: tally.retries.load(Ordering::Relaxed),
        gave_up: tally.gave_up.load(Ordering::Relaxed),
        final_state: guard.state(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn drive(
    client: GuardedClient,
    url: String,
    requests: usize,
    concurrency: usize,
    max_attempts: u32,
    tally: Arc<Tally>,
) {
    let slots = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for _ in 0..requests {
        let Ok(slot) = slots.clone().acquire_owned().await else {
            break;
        };
        let client = client.clone();
        let url = url.clone();
        let tally = tally.clone();
        tasks.spawn(async move {
            fetch(&client, &url, max_attempts, &tally).await;
            drop(slot);
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Request task failed");
        }
    }
}

async fn fetch(client: &GuardedClient, url: &str, max_attempts: u32, tally: &Tally) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match client.send(client.get(url)).await {
            Ok(response) if response.status().is_success() => {
                tally.succeeded.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Non-success status");
                tally.failed_status.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => err,
        };

        tally.record_error(&err);
        let delay = match retry_delay(&err, attempt, RETRY_BASE_MS, RETRY_MAX_MS) {
            Some(delay) if attempt < max_attempts => delay,
            _ => {
                tracing::warn!(error = %err, attempt, "Giving up on request");
                tally.gave_up.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        tracing::debug!(error = %err, attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "Retrying");
        tally.retries.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(delay).await;
    }
}

/// Logs a line whenever the alert level changes, like a status banner would.
fn alert_logger() -> impl Fn(&GuardSnapshot) + Send + Sync + 'static {
    let last = Mutex::new(None::<Alert>);
    move |snapshot| {
        let alert = snapshot.alert();
        let mut last = last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if *last == alert {
            return;
        }
        *last = alert;
        match alert {
            Some(Alert::Open) | Some(Alert::Paused) => tracing::warn!("{}", snapshot.describe()),
            Some(Alert::NearLimit) => tracing::info!("{}", snapshot.describe()),
            None => tracing::info!("Guard clear: {}", snapshot.describe()),
        }
    }
}
