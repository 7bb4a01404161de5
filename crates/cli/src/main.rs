//! cropwatch CLI - crop pest detection client.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cropwatch_api::{BackendApi, HttpBackend};
use cropwatch_core::{ClientConfig, MetricsSnapshot};
use cropwatch_detection::{DetectionService, ServerStatus, UploadPolicy};
use cropwatch_monitor::{FetchError, MetricsPoller, PollPhase, PollerConfig};
use cropwatch_storage::{HistoryStore, JsonHistoryStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cropwatch")]
#[command(about = "Client for the crop pest detection service", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inference API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory for client-side state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the inference server is up
    Health,
    /// Show server metrics
    Metrics {
        /// Keep polling and print every update until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Detect pests in an image
    Detect {
        /// Image file (jpg, png, gif, bmp, tiff)
        image: PathBuf,
    },
    /// Show past detections
    History {
        /// Forget all past detections
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    debug!("Using {}", config.base_url);
    let backend = Arc::new(HttpBackend::new(&config).context("Failed to build HTTP client")?);

    match cli.command {
        Commands::Health => {
            let status = match backend.health().await {
                Ok(()) => ServerStatus::Online,
                Err(e) => {
                    debug!("Health check failed: {}", e);
                    ServerStatus::Offline
                }
            };
            println!("Server {}: {}", config.base_url, status);
        }
        Commands::Metrics { watch } => {
            let poller = MetricsPoller::new(backend, PollerConfig::from(&config))?;
            if watch {
                watch_metrics(&poller).await?;
            } else {
                show_metrics_once(&poller).await?;
            }
        }
        Commands::Detect { image } => {
            let store = JsonHistoryStore::new(config.history_path()).await?;
            let mut service = DetectionService::new(
                backend,
                store,
                UploadPolicy::from(&config),
                config.history_capacity,
            );

            service.mount().await;
            let record = service
                .analyze_file(&image)
                .await
                .with_context(|| format!("Detection failed for {}", image.display()))?;
            print!("{}", render::prediction(&record));
        }
        Commands::History { clear } => {
            let mut store = JsonHistoryStore::new(config.history_path()).await?;
            if clear {
                store.clear().await?;
                println!("History cleared");
                return Ok(());
            }

            let records = store
                .load()
                .await
                .with_context(|| format!("Cannot read {}", store.path().display()))?;
            println!("History ({})", records.len());
            for record in records.iter().take(config.history_capacity) {
                println!("  {}", render::history_row(record));
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run the poller until it has a snapshot or has given up.
async fn show_metrics_once<A: BackendApi + 'static>(poller: &MetricsPoller<A>) -> Result<()> {
    let mut rx = poller.subscribe();
    poller.start();

    let status = rx
        .wait_for(|s| s.has_data() || s.phase == PollPhase::Failed)
        .await
        .context("Metrics poller went away")?
        .clone();
    poller.shutdown().await;

    match &status.latest_snapshot {
        Some(snapshot) => {
            print!("{}", render::snapshot(snapshot));
            Ok(())
        }
        None => anyhow::bail!("Could not fetch metrics: {}", render::status_line(&status)),
    }
}

/// Print every new snapshot or error until Ctrl-C.
async fn watch_metrics<A: BackendApi + 'static>(poller: &MetricsPoller<A>) -> Result<()> {
    let mut rx = poller.subscribe();
    poller.start();
    info!("Watching metrics, press Ctrl-C to stop");

    let mut shown_snapshot: Option<Arc<MetricsSnapshot>> = None;
    let mut shown_error: Option<FetchError> = None;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = rx.borrow_and_update().clone();

                if let Some(snapshot) = &status.latest_snapshot {
                    let is_new = shown_snapshot
                        .as_ref()
                        .map_or(true, |shown| !Arc::ptr_eq(shown, snapshot));
                    if is_new {
                        print!("{}", render::snapshot(snapshot));
                        println!();
                        shown_snapshot = Some(snapshot.clone());
                    }
                }
                if status.last_error.is_some() && status.last_error != shown_error {
                    eprintln!("{}", render::status_line(&status));
                }
                shown_error = status.last_error;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.shutdown().await;
    Ok(())
}
