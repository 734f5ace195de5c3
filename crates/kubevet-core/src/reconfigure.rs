//! Hot reconfiguration of the check registry.
//!
//! [`SnapshotHandle`] publishes the current [`CheckRegistrySnapshot`].
//! Readers load an `Arc` and keep using it for a whole validation pass; the
//! [`ReconfigurationLoop`] is the single writer and swaps in a freshly built
//! snapshot whenever a new [`CheckConfig`] arrives.
//!
//! ```text
//!            CheckConfig (mpsc)
//!                  │
//!                  ▼
//!   ┌──────── Running ────────┐  build ok  → swap + publish
//!   │                         │  build err → log, keep current
//!   └──────────┬──────────────┘
//!              │ shutdown
//!              ▼
//!           Stopped
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::checks::CheckSource;
use crate::config::CheckConfig;
use crate::error::RegistryResult;
use crate::registry::CheckRegistrySnapshot;

/// Shared, atomically replaceable reference to the current snapshot.
#[derive(Clone)]
pub struct SnapshotHandle {
    current: Arc<ArcSwap<CheckRegistrySnapshot>>,
    published: Arc<watch::Sender<Arc<CheckRegistrySnapshot>>>,
}

impl SnapshotHandle {
    pub fn new(initial: CheckRegistrySnapshot) -> Self {
        let initial = Arc::new(initial);
        let (published, _) = watch::channel(initial.clone());
        Self {
            current: Arc::new(ArcSwap::new(initial)),
            published: Arc::new(published),
        }
    }

    /// The snapshot in force right now. Never blocks.
    pub fn current(&self) -> Arc<CheckRegistrySnapshot> {
        self.current.load_full()
    }

    /// Receive every snapshot installed from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CheckRegistrySnapshot>> {
        self.published.subscribe()
    }

    fn install(&self, snapshot: CheckRegistrySnapshot) -> Arc<CheckRegistrySnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(snapshot.clone());
        // No subscribers is fine.
        self.published.send_replace(snapshot.clone());
        snapshot
    }
}

/// Terminal state reported when the loop returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Single-writer loop installing snapshots built from incoming configs.
pub struct ReconfigurationLoop {
    handle: SnapshotHandle,
    source: Arc<dyn CheckSource>,
    updates: mpsc::Receiver<CheckConfig>,
    next_version: u64,
}

impl ReconfigurationLoop {
    pub fn new(
        handle: SnapshotHandle,
        source: Arc<dyn CheckSource>,
        updates: mpsc::Receiver<CheckConfig>,
    ) -> Self {
        let next_version = handle.current().version() + 1;
        Self {
            handle,
            source,
            updates,
            next_version,
        }
    }

    /// Build and install a snapshot for `config`.
    ///
    /// On error the current snapshot stays in force.
    pub fn apply(&mut self, config: &CheckConfig) -> RegistryResult<Arc<CheckRegistrySnapshot>> {
        let snapshot =
            CheckRegistrySnapshot::build(config, self.source.as_ref(), self.next_version)?;
        self.next_version += 1;
        let installed = self.handle.install(snapshot);
        info!(
            version = installed.version(),
            checks = installed.enabled_checks().len(),
            "installed check registry snapshot"
        );
        Ok(installed)
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopState {
        let mut updates_open = true;
        let mut state = LoopState::Running;

        while state == LoopState::Running {
            if *shutdown.borrow_and_update() {
                state = LoopState::Stopped;
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        state = LoopState::Stopped;
                    }
                }
                update = self.updates.recv(), if updates_open => match update {
                    Some(config) => {
                        if let Err(e) = self.apply(&config) {
                            error!(
                                error = %e,
                                current = self.handle.current().version(),
                                "failed to apply check configuration, keeping current snapshot"
                            );
                        }
                    }
                    None => {
                        warn!(
                            "configuration channel closed, serving current snapshot until shutdown"
                        );
                        updates_open = false;
                    }
                },
            }
        }

        debug!("reconfiguration loop stopped");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::BuiltinChecks;
    use crate::config::ChecksConfig;

    fn only(include: &[&str]) -> CheckConfig {
        CheckConfig {
            checks: ChecksConfig {
                do_not_auto_add_defaults: true,
                include: include.iter().map(|s| s.to_string()).collect(),
                ..ChecksConfig::default()
            },
            ..CheckConfig::default()
        }
    }

    fn handle(include: &[&str]) -> SnapshotHandle {
        SnapshotHandle::new(
            CheckRegistrySnapshot::build(&only(include), &BuiltinChecks::new(), 0).unwrap(),
        )
    }

    #[test]
    fn test_apply_swaps_and_bumps_version() {
        let handle = handle(&["host-pid"]);
        let (_tx, rx) = mpsc::channel(1);
        let mut reconfig =
            ReconfigurationLoop::new(handle.clone(), Arc::new(BuiltinChecks::new()), rx);

        let before = handle.current();
        let installed = reconfig.apply(&only(&["run-as-non-root"])).unwrap();

        assert_eq!(installed.version(), 1);
        assert_eq!(handle.current().version(), 1);
        assert!(handle.current().is_enabled("run-as-non-root"));
        // Readers holding the old snapshot keep a complete view.
        assert_eq!(before.version(), 0);
        assert!(before.is_enabled("host-pid"));
        assert!(!before.is_enabled("run-as-non-root"));
    }

    #[test]
    fn test_failed_apply_keeps_current() {
        let handle = handle(&["host-pid"]);
        let (_tx, rx) = mpsc::channel(1);
        let mut reconfig =
            ReconfigurationLoop::new(handle.clone(), Arc::new(BuiltinChecks::new()), rx);

        assert!(reconfig.apply(&only(&["no-such-check"])).is_err());
        assert_eq!(handle.current().version(), 0);

        // Versions are only consumed by successful builds.
        assert_eq!(reconfig.apply(&only(&["host-ipc"])).unwrap().version(), 1);
    }

    #[test]
    fn test_subscribers_see_installed_snapshot() {
        let handle = handle(&["host-pid"]);
        let mut sub = handle.subscribe();
        let (_tx, rx) = mpsc::channel(1);
        let mut reconfig =
            ReconfigurationLoop::new(handle.clone(), Arc::new(BuiltinChecks::new()), rx);

        reconfig.apply(&only(&["host-ipc"])).unwrap();
        assert!(sub.has_changed().unwrap());
        assert_eq!(sub.borrow_and_update().version(), 1);
    }
}
