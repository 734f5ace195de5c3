//! Caller-side glue between the outcome cache, the current snapshot and the
//! external check runner.

use std::sync::Arc;

use tracing::debug;

use crate::cache::OutcomeCache;
use crate::key::IdentityKey;
use crate::object::ResourceObject;
use crate::outcome::ValidationOutcome;
use crate::reconfigure::SnapshotHandle;
use crate::registry::{CheckRegistrySnapshot, ObjectLabels};

/// Runs the enabled checks of a snapshot against one object.
pub trait CheckRunner<O = ValidationOutcome>: Send + Sync {
    fn run(&self, obj: &dyn ResourceObject, snapshot: &CheckRegistrySnapshot) -> anyhow::Result<O>;
}

/// Result of [`ValidationEngine::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation<O> {
    /// Object unchanged since its cached outcome; the runner was skipped.
    Cached,
    /// The runner produced a new outcome, now cached.
    Fresh(O),
}

impl<O> Validation<O> {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached)
    }
}

/// Validates objects through the cache using the current snapshot.
pub struct ValidationEngine<O = ValidationOutcome> {
    cache: Arc<OutcomeCache<O>>,
    snapshots: SnapshotHandle,
}

impl<O: Clone> ValidationEngine<O> {
    pub fn new(cache: Arc<OutcomeCache<O>>, snapshots: SnapshotHandle) -> Self {
        Self { cache, snapshots }
    }

    pub fn cache(&self) -> &Arc<OutcomeCache<O>> {
        &self.cache
    }

    pub fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }

    /// Validate `obj` unless its current resource version already has a
    /// cached outcome.
    ///
    /// Runner errors are returned as-is and nothing is cached for them. An
    /// outcome is not cached if [`reset`](Self::reset) ran while the runner
    /// was working, since it may belong to a replaced snapshot.
    pub fn validate(
        &self,
        obj: &dyn ResourceObject,
        runner: &dyn CheckRunner<O>,
    ) -> anyhow::Result<Validation<O>> {
        // Read before the snapshot: a reset after a swap always moves it.
        let epoch = self.cache.epoch();
        if self.cache.is_already_validated(obj) {
            return Ok(Validation::Cached);
        }

        let snapshot = self.snapshots.current();
        let outcome = runner.run(obj, &snapshot)?;
        self.cache.store_unless_drained(obj, outcome.clone(), epoch);
        debug!(
            key = %IdentityKey::from_object(obj),
            snapshot = snapshot.version(),
            "validated object"
        );
        Ok(Validation::Fresh(outcome))
    }

    /// Forget a deleted object: uncache it and drop its metric series.
    pub fn forget(&self, obj: &dyn ResourceObject, namespace_uid: &str) {
        self.cache.remove(obj);
        self.snapshots
            .current()
            .delete_metrics(&ObjectLabels::new(obj, namespace_uid));
    }

    /// Discard all cached outcomes.
    pub fn reset(&self) {
        self.cache.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::BuiltinChecks;
    use crate::config::CheckConfig;
    use crate::object::ObjectMeta;
    use crate::reconfigure::ReconfigurationLoop;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    struct CountingRunner {
        runs: AtomicUsize,
        outcome: ValidationOutcome,
    }

    impl CountingRunner {
        fn new(outcome: ValidationOutcome) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                outcome,
            }
        }
    }

    impl CheckRunner for CountingRunner {
        fn run(
            &self,
            obj: &dyn ResourceObject,
            snapshot: &CheckRegistrySnapshot,
        ) -> anyhow::Result<ValidationOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.outcome == ValidationOutcome::NeedsImprovement {
                snapshot.record("run-as-non-root", &ObjectLabels::new(obj, "ns-uid"), 1)?;
            }
            Ok(self.outcome)
        }
    }

    struct FailingRunner;

    impl CheckRunner for FailingRunner {
        fn run(
            &self,
            _: &dyn ResourceObject,
            _: &CheckRegistrySnapshot,
        ) -> anyhow::Result<ValidationOutcome> {
            anyhow::bail!("linter crashed")
        }
    }

    fn engine() -> ValidationEngine {
        let snapshot =
            CheckRegistrySnapshot::build(&CheckConfig::builtin_default(), &BuiltinChecks::new(), 1)
                .unwrap();
        ValidationEngine::new(Arc::new(OutcomeCache::new()), SnapshotHandle::new(snapshot))
    }

    fn web(rv: &str) -> ObjectMeta {
        ObjectMeta::new("apps", "v1", "Deployment", "ns1", "web")
            .with_uid("abc")
            .with_resource_version(rv)
    }

    #[test]
    fn test_unchanged_object_skips_runner() {
        let engine = engine();
        let runner = CountingRunner::new(ValidationOutcome::Valid);

        let first = engine.validate(&web("1"), &runner).unwrap();
        assert_eq!(first, Validation::Fresh(ValidationOutcome::Valid));
        let second = engine.validate(&web("1"), &runner).unwrap();
        assert!(second.is_cached());
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        engine.validate(&web("2"), &runner).unwrap();
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_runner_error_caches_nothing() {
        let engine = engine();
        assert!(engine.validate(&web("1"), &FailingRunner).is_err());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_forget_removes_entry_and_series() {
        let engine = engine();
        let runner = CountingRunner::new(ValidationOutcome::NeedsImprovement);
        engine.validate(&web("1"), &runner).unwrap();

        let before = engine.snapshots().current().render_metrics().unwrap();
        assert!(before.contains("run_as_non_root{"));

        engine.forget(&web("1"), "ns-uid");
        assert!(engine.cache().retrieve(&web("1")).is_none());
        let after = engine.snapshots().current().render_metrics().unwrap();
        assert!(!after.contains("run_as_non_root{"));
    }

    #[test]
    fn test_reset_forces_revalidation() {
        let engine = engine();
        let runner = CountingRunner::new(ValidationOutcome::Valid);
        engine.validate(&web("1"), &runner).unwrap();
        engine.reset();
        assert!(!engine.validate(&web("1"), &runner).unwrap().is_cached());
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
    }

    /// Holds the first run until released, reporting the snapshot it saw.
    struct BlockingRunner {
        block: AtomicBool,
        started: Barrier,
        release: Barrier,
        seen: std::sync::Mutex<Vec<u64>>,
    }

    impl CheckRunner for BlockingRunner {
        fn run(
            &self,
            _: &dyn ResourceObject,
            snapshot: &CheckRegistrySnapshot,
        ) -> anyhow::Result<ValidationOutcome> {
            self.seen.lock().unwrap().push(snapshot.version());
            if self.block.swap(false, Ordering::SeqCst) {
                self.started.wait();
                self.release.wait();
            }
            Ok(ValidationOutcome::Valid)
        }
    }

    #[test]
    fn test_outcome_from_replaced_snapshot_not_cached_after_reset() {
        let engine = Arc::new(engine());
        let runner = Arc::new(BlockingRunner {
            block: AtomicBool::new(true),
            started: Barrier::new(2),
            release: Barrier::new(2),
            seen: std::sync::Mutex::new(Vec::new()),
        });

        let in_flight = {
            let engine = engine.clone();
            let runner = runner.clone();
            thread::spawn(move || engine.validate(&web("1"), runner.as_ref()).unwrap())
        };
        runner.started.wait();

        // New check set installed and past outcomes invalidated mid-run.
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let mut reconfig = ReconfigurationLoop::new(
            engine.snapshots().clone(),
            Arc::new(BuiltinChecks::new()),
            rx,
        );
        reconfig.apply(&CheckConfig::default()).unwrap();
        engine.reset();
        runner.release.wait();

        assert_eq!(in_flight.join().unwrap(), Validation::Fresh(ValidationOutcome::Valid));
        assert!(engine.cache().is_empty());

        let again = engine.validate(&web("1"), runner.as_ref()).unwrap();
        assert!(!again.is_cached());
        assert_eq!(*runner.seen.lock().unwrap(), vec![1, 2]);

        // The outcome computed under the new snapshot is cached as usual.
        assert!(engine.validate(&web("1"), runner.as_ref()).unwrap().is_cached());
    }
}
