//! `kubevet watch`: keep a check registry snapshot live while the config
//! file changes underneath it.
//!
//! The file is polled (metadata only) and reloaded after it has been stable
//! for the debounce window. Parsed configs go to the reconfiguration loop;
//! every snapshot it installs invalidates the outcome cache unless
//! `--keep-cache` is set.

use anyhow::{Context, Result};
use kubevet_core::{
    load_config_or_default, BuiltinChecks, CheckConfig, CheckRegistrySnapshot, CheckSource,
    OutcomeCache, ReconfigurationLoop, SnapshotHandle, ValidationEngine,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::cli::args::WatchArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: WatchArgs) -> Result<i32> {
    let source: Arc<dyn CheckSource> = Arc::new(BuiltinChecks::new());
    let config = load_config_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let initial = CheckRegistrySnapshot::build(&config, source.as_ref(), 0)
        .context("building initial check registry")?;
    info!(
        config = %args.config.display(),
        checks = initial.enabled_checks().len(),
        "serving initial check registry snapshot"
    );

    let snapshots = SnapshotHandle::new(initial);
    let engine: ValidationEngine =
        ValidationEngine::new(Arc::new(OutcomeCache::new()), snapshots);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("stopping watch loop");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                // Keep the sender alive so the watch keeps running.
                std::future::pending::<()>().await;
            }
        }
    });

    serve(&args, &engine, source, shutdown_rx).await?;
    Ok(SUCCESS)
}

/// Poll the config file and feed changes to a reconfiguration loop until
/// `shutdown` flips to `true` or its sender is dropped.
pub(crate) async fn serve(
    args: &WatchArgs,
    engine: &ValidationEngine,
    source: Arc<dyn CheckSource>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut published = engine.snapshots().subscribe();
    let (config_tx, config_rx) = mpsc::channel(4);
    let reconfig = ReconfigurationLoop::new(engine.snapshots().clone(), source, config_rx);
    let task = tokio::spawn(reconfig.run(shutdown.clone()));

    let poll_interval = Duration::from_millis(args.poll_ms);
    let debounce = Duration::from_millis(args.debounce_ms);
    let mut state = FileState::of(&args.config);

    'watch: loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break 'watch,
            changed = published.changed() => {
                if changed.is_ok() {
                    let snapshot = published.borrow_and_update().clone();
                    on_snapshot(engine, &snapshot, args.keep_cache);
                }
                continue 'watch;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let current = FileState::of(&args.config);
        if current == state {
            continue;
        }

        // Wait for the file to settle before reading it.
        let mut stable = current;
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break 'watch,
                _ = tokio::time::sleep(debounce) => {}
            }
            let next = FileState::of(&args.config);
            if next == stable {
                break;
            }
            stable = next;
        }
        state = stable;

        if let Some(config) = read_config(&args.config) {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break 'watch,
                sent = config_tx.send(config) => {
                    sent.context("reconfiguration loop exited")?;
                }
            }
        }
    }

    drop(config_tx);
    let final_state = task.await.context("reconfiguration loop panicked")?;
    info!(state = ?final_state, "watch stopped");
    Ok(())
}

/// Resolves once shutdown is requested or can no longer be requested.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn read_config(path: &Path) -> Option<CheckConfig> {
    match load_config_or_default(path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable check configuration");
            None
        }
    }
}

fn on_snapshot(engine: &ValidationEngine, snapshot: &CheckRegistrySnapshot, keep_cache: bool) {
    if keep_cache {
        info!(version = snapshot.version(), "new snapshot, keeping cached outcomes");
        return;
    }
    let dropped = engine.cache().len();
    engine.reset();
    info!(version = snapshot.version(), dropped, "new snapshot, cached outcomes discarded");
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FileState {
    exists: bool,
    len: Option<u64>,
    modified: Option<SystemTime>,
}

impl FileState {
    fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) => Self {
                exists: true,
                len: Some(meta.len()),
                modified: meta.modified().ok(),
            },
            Err(_) => Self {
                exists: false,
                len: None,
                modified: None,
            },
        }
    }
}
