//! Tally - Background daemon that syncs PayPal resource purchases
//!
//! This is the main entry point for the Tally sync daemon. It loads
//! settings, sets up logging and runs the sync scheduler until it receives
//! Ctrl-C or SIGTERM.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use log::{error, info, warn};
use purchases::config::LoggingSettings;
use purchases::sync::SharedShutdown;
use purchases::{
    CredentialManager, PaypalClient, ScheduleSummary, Scheduler, Settings, Shutdown,
    SqlitePurchaseStore, SyncEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(&LoggingSettings::default())?;
            error!("Failed to load settings: {:#}", e);
            if let Some(path) = Settings::default_settings_path() {
                warn!(
                    "To configure Tally, either:\n\
                     1. Write settings to: {}\n\
                     2. Or set environment variables: PAYPAL_CLIENT_ID and PAYPAL_SECRET",
                    path.display()
                );
            }
            return Err(e);
        }
    };

    init_logging(&settings.logging)?;

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    info!(
        "Starting tally against {} (every {} min)",
        settings.paypal.api_url(),
        settings.sync.interval_minutes
    );

    let shutdown = Shutdown::shared();
    tokio::spawn(stop_on_signal(shutdown.clone()));

    let worker = {
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || run_worker(&settings, &shutdown))
    };

    let summary = worker.await.context("Sync worker panicked")??;
    if summary.failures == summary.cycles && summary.cycles > 0 {
        warn!("Every sync cycle failed; check credentials and database settings");
    }
    info!("Tally stopped");
    Ok(())
}

/// Install env_logger, appending to the configured log file if there is one
fn init_logging(logging: &LoggingSettings) -> Result<()> {
    let default_filter = logging.level.as_deref().unwrap_or("info");
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();

    if let Some(path) = &logging.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialize logging")?;
    Ok(())
}

/// Build the engine and run cycles until shutdown is requested
fn run_worker(settings: &Settings, shutdown: &Shutdown) -> Result<ScheduleSummary> {
    let client = PaypalClient::new(settings.paypal.api_url())?;
    let checkpoints = settings.checkpoint_store()?;
    let purchases = SqlitePurchaseStore::new(settings.database_path()?);
    let credentials =
        CredentialManager::new(settings.paypal.client_id.clone(), settings.paypal.secret.clone())?;

    info!(
        "Checkpoint at {}, purchases in {}",
        checkpoints.path().display(),
        purchases.path().display()
    );

    let mut engine = SyncEngine::new(
        &client,
        &checkpoints,
        &purchases,
        credentials,
        settings.sync_options()?,
    );
    let scheduler = Scheduler::new(settings.interval());
    Ok(scheduler.run(&mut engine, shutdown))
}

async fn stop_on_signal(shutdown: SharedShutdown) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
                terminate().await;
            }
        }
        _ = terminate() => {}
    }
    info!("Shutdown requested, finishing current cycle");
    shutdown.request();
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
