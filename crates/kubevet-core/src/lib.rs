//! Validation outcome cache and hot-swappable check registry.
//!
//! This crate provides the shared state of a Kubernetes object validator:
//!
//! - An outcome cache keyed by object identity that skips re-validation of
//!   objects whose resource version has not changed
//! - Immutable check registry snapshots with per-check Prometheus gauges
//! - A reconfiguration loop that swaps snapshots atomically when the check
//!   configuration changes
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kubevet_core::{
//!     BuiltinChecks, CheckConfig, CheckRegistrySnapshot, ObjectMeta, OutcomeCache,
//!     ReconfigurationLoop, SnapshotHandle, ValidationOutcome,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = Arc::new(BuiltinChecks::new());
//! let config = CheckConfig::builtin_default();
//! let initial = CheckRegistrySnapshot::build(&config, source.as_ref(), 0)?;
//! let snapshots = SnapshotHandle::new(initial);
//!
//! let (config_tx, config_rx) = tokio::sync::mpsc::channel(8);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let reconfig = ReconfigurationLoop::new(snapshots.clone(), source, config_rx);
//! let task = tokio::spawn(reconfig.run(shutdown_rx));
//!
//! let cache = OutcomeCache::new();
//! let obj = ObjectMeta::new("apps", "v1", "Deployment", "ns1", "web")
//!     .with_uid("abc")
//!     .with_resource_version("1");
//! if !cache.is_already_validated(&obj) {
//!     cache.store(&obj, ValidationOutcome::Valid);
//! }
//!
//! config_tx.send(CheckConfig::default()).await?;
//! shutdown_tx.send(true)?;
//! task.await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod object;
pub mod outcome;
pub mod reconfigure;
pub mod registry;

pub use cache::{CacheEntry, OutcomeCache};
pub use checks::{BuiltinChecks, CheckSource, CheckSpec, INCOMPATIBLE_CHECKS};
pub use config::{load_config, load_config_or_default, CheckConfig, ChecksConfig};
pub use engine::{CheckRunner, Validation, ValidationEngine};
pub use error::{ConfigError, RegistryError, RegistryResult};
pub use key::{IdentityKey, VersionTag};
pub use object::{ObjectMeta, ResourceObject};
pub use outcome::ValidationOutcome;
pub use reconfigure::{LoopState, ReconfigurationLoop, SnapshotHandle};
pub use registry::{CheckRegistrySnapshot, ObjectLabels, RegisteredCheck};
