//! Immutable snapshots of the enabled check set.
//!
//! A [`CheckRegistrySnapshot`] is built once per configuration and never
//! mutated afterwards. Each enabled check gets a gauge vector registered in
//! the snapshot's own Prometheus registry, so replacing a snapshot also
//! replaces the exported metric families without unregistering anything.
//!
//! # Resolution
//!
//! ```text
//! start  = all checks         if addAllBuiltIn
//!        | source defaults    unless doNotAutoAddDefaults
//!        | ∅
//! start += custom checks + include
//! start -= exclude
//! start -= checks that need related objects (always)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::checks::{CheckSource, CheckSpec, LayeredChecks};
use crate::config::CheckConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::object::ResourceObject;

/// Label names attached to every per-check gauge.
pub const OBJECT_LABELS: [&str; 5] = ["namespace_uid", "namespace", "uid", "name", "kind"];

/// Label values identifying one object in per-check gauges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLabels {
    pub namespace_uid: String,
    pub namespace: String,
    pub uid: String,
    pub name: String,
    pub kind: String,
}

impl ObjectLabels {
    pub fn new(obj: &(impl ResourceObject + ?Sized), namespace_uid: impl Into<String>) -> Self {
        Self {
            namespace_uid: namespace_uid.into(),
            namespace: obj.namespace().to_string(),
            uid: obj.uid().to_string(),
            name: obj.name().to_string(),
            kind: obj.kind().to_string(),
        }
    }

    fn as_map(&self) -> HashMap<&str, &str> {
        HashMap::from([
            ("namespace_uid", self.namespace_uid.as_str()),
            ("namespace", self.namespace.as_str()),
            ("uid", self.uid.as_str()),
            ("name", self.name.as_str()),
            ("kind", self.kind.as_str()),
        ])
    }
}

/// An enabled check and its gauge handle.
pub struct RegisteredCheck {
    pub spec: CheckSpec,
    pub gauge: IntGaugeVec,
}

/// Immutable set of enabled checks for one configuration version.
pub struct CheckRegistrySnapshot {
    version: u64,
    built_at: DateTime<Utc>,
    enabled: Vec<String>,
    checks: BTreeMap<String, RegisteredCheck>,
    registry: Registry,
}

impl fmt::Debug for CheckRegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistrySnapshot")
            .field("version", &self.version)
            .field("built_at", &self.built_at)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl CheckRegistrySnapshot {
    /// Resolve the enabled checks for `config` against `source` and
    /// materialize their gauges.
    pub fn build(
        config: &CheckConfig,
        source: &dyn CheckSource,
        version: u64,
    ) -> RegistryResult<Self> {
        let custom = custom_checks(config, source)?;
        let layered = LayeredChecks::new(source, custom);
        let enabled = resolve_enabled(config, &layered)?;
        if enabled.is_empty() {
            return Err(RegistryError::NoChecksEnabled);
        }

        let registry = Registry::new();
        let mut checks = BTreeMap::new();
        for name in &enabled {
            let spec = layered
                .load(name)
                .ok_or_else(|| RegistryError::UnknownCheck { name: name.clone() })?;
            let gauge = register_gauge(&registry, &spec)?;
            checks.insert(name.clone(), RegisteredCheck { spec, gauge });
        }

        debug!(version, checks = enabled.len(), "built check registry snapshot");
        Ok(Self {
            version,
            built_at: Utc::now(),
            enabled,
            checks,
            registry,
        })
    }

    /// Monotonic snapshot version assigned by the builder's caller.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Enabled check names, sorted.
    pub fn enabled_checks(&self) -> &[String] {
        &self.enabled
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    /// Spec of an enabled check.
    pub fn check(&self, name: &str) -> RegistryResult<&CheckSpec> {
        self.checks
            .get(name)
            .map(|c| &c.spec)
            .ok_or_else(|| RegistryError::CheckNotRegistered {
                name: name.to_string(),
            })
    }

    /// Enabled checks in name order.
    pub fn checks(&self) -> impl Iterator<Item = &RegisteredCheck> {
        self.checks.values()
    }

    /// Gauge vector for an enabled check.
    pub fn metric(&self, name: &str) -> Option<&IntGaugeVec> {
        self.checks.get(name).map(|c| &c.gauge)
    }

    /// Set the finding count reported by `check` for one object.
    pub fn record(&self, check: &str, labels: &ObjectLabels, findings: i64) -> RegistryResult<()> {
        let gauge = self
            .metric(check)
            .ok_or_else(|| RegistryError::CheckNotRegistered {
                name: check.to_string(),
            })?;
        gauge.with(&labels.as_map()).set(findings);
        Ok(())
    }

    /// Drop the object's label set from every check's gauge.
    pub fn delete_metrics(&self, labels: &ObjectLabels) {
        let map = labels.as_map();
        for check in self.checks.values() {
            // Absent label sets are expected here.
            let _ = check.gauge.remove(&map);
        }
    }

    /// Drop the object's label set from gauges of checks that did not
    /// report on it in the latest run.
    pub fn clear_metrics<S: AsRef<str>>(&self, reported: &[S], labels: &ObjectLabels) {
        let reported: HashSet<&str> = reported.iter().map(|s| s.as_ref()).collect();
        let map = labels.as_map();
        for (name, check) in &self.checks {
            if !reported.contains(name.as_str()) {
                let _ = check.gauge.remove(&map);
            }
        }
    }

    /// Current metric families of this snapshot.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Prometheus text exposition of [`gather`](Self::gather).
    pub fn render_metrics(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

fn custom_checks(
    config: &CheckConfig,
    source: &dyn CheckSource,
) -> RegistryResult<BTreeMap<String, CheckSpec>> {
    let mut custom = BTreeMap::new();
    for spec in &config.custom_checks {
        if source.load(&spec.name).is_some() || custom.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateCheck {
                name: spec.name.clone(),
            });
        }
        custom.insert(spec.name.clone(), spec.clone());
    }
    Ok(custom)
}

fn resolve_enabled(
    config: &CheckConfig,
    source: &LayeredChecks<'_>,
) -> RegistryResult<Vec<String>> {
    let checks = &config.checks;

    for name in checks.include.iter().chain(&checks.exclude) {
        if source.load(name).is_none() {
            return Err(RegistryError::UnknownCheck { name: name.clone() });
        }
    }

    let mut enabled: BTreeSet<String> = if checks.add_all_builtin {
        source.names().into_iter().collect()
    } else if !checks.do_not_auto_add_defaults {
        source
            .names()
            .into_iter()
            .filter(|name| source.is_default(name))
            .collect()
    } else {
        BTreeSet::new()
    };

    enabled.extend(source.custom_names().cloned());
    enabled.extend(checks.include.iter().cloned());
    for name in &checks.exclude {
        enabled.remove(name);
    }

    enabled.retain(|name| {
        let single_object = source.load(name).is_some_and(|spec| spec.is_single_object());
        if !single_object && checks.include.contains(name) {
            warn!(check = %name, "check needs related objects, ignoring include");
        }
        single_object
    });

    Ok(enabled.into_iter().collect())
}

fn register_gauge(registry: &Registry, spec: &CheckSpec) -> RegistryResult<IntGaugeVec> {
    let wrap = |source: prometheus::Error| RegistryError::CounterRegistration {
        check: spec.name.clone(),
        source,
    };

    let opts = Opts::new(
        spec.name.replace('-', "_"),
        format!(
            "Description: {} ; Remediation: {}",
            spec.description, spec.remediation
        ),
    )
    .const_label("check_description", spec.description.clone())
    .const_label("check_remediation", spec.remediation.clone());

    let gauge = IntGaugeVec::new(opts, &OBJECT_LABELS).map_err(wrap)?;
    registry.register(Box::new(gauge.clone())).map_err(wrap)?;
    Ok(gauge)
}
