//! Background worker for processing recherche orders.
//!
//! Polls the database for confirmed orders, leases them one at a time,
//! runs the provider searches, deduplicates the results, and settles the
//! cost. Run several instances against the same database to scale out;
//! the lease keeps them from stepping on each other.
//!
//! ```text
//! recherche-worker --db recherche.db
//! recherche-worker --db recherche.db --poll-interval 10
//! recherche-worker --db recherche.db --once
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recherche::{Worker, WorkerConfig};
use recherche_store::Store;

#[derive(Debug, Parser)]
#[command(name = "recherche-worker", about = "Background worker for recherche orders")]
struct Args {
    /// Path to the SQLite database.
    #[arg(long, env = "RECHERCHE_DB", default_value = "recherche.db")]
    db: PathBuf,

    /// Seconds between database polls.
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Process at most one order, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let store = Store::open(&args.db)
        .with_context(|| format!("failed to open database at {}", args.db.display()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received, finishing in-flight work");
        let _ = shutdown_tx.send(true);
    });

    let worker = Worker::new(
        store,
        WorkerConfig {
            poll_interval: Duration::from_secs(args.poll_interval),
            once: args.once,
        },
    );
    worker.run(shutdown_rx).await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
