//! tagsync - problem tag reconciler
//!
//! Copies topic tags from a source judge site onto matching problems of a
//! destination judge site. Produces an SQL file of tag inserts and a list of
//! source tags the destination catalog does not know.
//!
//! Interrupting the run (Ctrl+C / SIGTERM) stops at the current problem, saves
//! the lookup caches and writes the outputs gathered so far. A second interrupt
//! exits immediately with status 130.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tagsync::output;
use tagsync::services::{AliasTable, HttpJudgeClient, LookupCaches, Reconciler};
use tagsync_common::config::RunConfig;
use tagsync_common::TagCatalog;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tagsync
#[derive(Parser, Debug)]
#[command(name = "tagsync")]
#[command(about = "Reconcile problem tags from a source judge onto a destination judge")]
#[command(version)]
struct Args {
    /// Run configuration (TOML)
    #[arg(short, long, default_value = "tagsync.toml", env = "TAGSYNC_CONFIG")]
    config: PathBuf,

    /// Directory for caches, outputs and run logs (default: the config file's directory)
    #[arg(short, long, env = "TAGSYNC_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Log the SQL instead of writing output files
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let work_dir = args.work_dir.clone().unwrap_or_else(|| {
        match args.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    });

    let log_path = init_tracing(&work_dir)?;

    info!("Starting tagsync {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Run log: {}", log_path.display());

    let config = RunConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    let files = config.files.resolved(&work_dir);

    let catalog = TagCatalog::load(&files.dest_tags)
        .with_context(|| format!("Failed to load tag catalog {}", files.dest_tags.display()))?;
    info!("Tag catalog: {} tags", catalog.len());

    let alias_text = std::fs::read_to_string(&files.tag_alias)
        .with_context(|| format!("Failed to read tag aliases {}", files.tag_alias.display()))?;
    let aliases = AliasTable::parse(&alias_text).context("Failed to parse tag aliases")?;
    info!(
        "Tag aliases: {} exact, {} pattern",
        aliases.exact_rules(),
        aliases.pattern_rules()
    );

    let destination = HttpJudgeClient::new(&config.destination, config.timeout())
        .context("Failed to initialize destination client")?;
    let source = HttpJudgeClient::new(&config.source, config.timeout())
        .context("Failed to initialize source client")?;

    let caches = LookupCaches::open(&files);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        forward_interrupts(shutdown_signal, signal_token).await;
        warn!("Second interrupt, exiting without waiting for outputs");
        std::process::exit(130);
    });

    let mut reconciler = Reconciler::new(
        destination,
        source,
        caches,
        aliases,
        catalog,
        config.cache.clone(),
    );
    let result = reconciler.run(&config.id_ranges, &cancel).await;

    if result.interrupted {
        info!("process exiting");
    }

    output::emit(&result, &files, args.dry_run).context("Failed to write outputs")?;

    info!("ok");
    Ok(())
}

/// Console logging plus a plain-text copy in `logs-<unix millis>.txt`
fn init_tracing(work_dir: &Path) -> Result<PathBuf> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let log_path = work_dir.join(format!("logs-{}.txt", millis));
    let log_file = File::create(&log_path)
        .with_context(|| format!("Failed to create run log {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagsync=info,tagsync_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(log_path)
}

/// Cancel `cancel` on the first signal; return on the second
async fn forward_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    next_signal().await;
    cancel.cancel();
    next_signal().await;
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, saving progress");
        },
        _ = terminate => {
            info!("Received terminate signal, saving progress");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_returns() {
        let signals = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let source = signals.clone();
        let watcher = tokio::spawn(forward_interrupts(
            move || {
                let source = source.clone();
                async move { source.notified().await }
            },
            cancel.clone(),
        ));

        signals.notify_one();
        tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .unwrap();
        assert!(!watcher.is_finished());

        signals.notify_one();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
    }
}
