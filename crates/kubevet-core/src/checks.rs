//! Check specifications and the sources they are loaded from.
//!
//! A [`CheckSource`] answers "given a check name, what is its spec?". The
//! registry builder is written against that trait so any catalog can back
//! it; [`BuiltinChecks`] is the catalog compiled into the binary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Checks that correlate several objects (e.g. a Service and the Pods it
/// selects). Objects are validated one at a time, so these always fail and
/// are excluded regardless of configuration.
pub const INCOMPATIBLE_CHECKS: &[&str] = &["dangling-service", "non-existent-service-account"];

/// Declarative description of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    pub name: String,

    /// Template the check is instantiated from.
    #[serde(default)]
    pub template: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub remediation: String,

    /// Object kinds the check applies to; empty means all.
    #[serde(default)]
    pub scope: Vec<String>,

    /// Check needs other objects than the one being validated.
    #[serde(default)]
    pub requires_related_objects: bool,
}

impl CheckSpec {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        description: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            description: description.into(),
            remediation: remediation.into(),
            scope: Vec::new(),
            requires_related_objects: false,
        }
    }

    fn multi_object(mut self) -> Self {
        self.requires_related_objects = true;
        self
    }

    /// Whether this check can run against a single object in isolation.
    pub fn is_single_object(&self) -> bool {
        !self.requires_related_objects && !INCOMPATIBLE_CHECKS.contains(&self.name.as_str())
    }
}

/// Capability to resolve check names into specifications.
pub trait CheckSource: Send + Sync {
    /// Load the spec for a check, if known.
    fn load(&self, name: &str) -> Option<CheckSpec>;

    /// All check names this source knows, sorted.
    fn names(&self) -> Vec<String>;

    /// Whether the check is enabled when the config does not opt out of
    /// defaults.
    fn is_default(&self, name: &str) -> bool;
}

struct BuiltinCheck {
    spec: CheckSpec,
    default: bool,
}

/// Catalog of checks compiled into the binary.
pub struct BuiltinChecks {
    checks: BTreeMap<String, BuiltinCheck>,
}

impl BuiltinChecks {
    pub fn new() -> Self {
        let mut checks = BTreeMap::new();
        for (spec, default) in builtin_catalog() {
            checks.insert(spec.name.clone(), BuiltinCheck { spec, default });
        }
        Self { checks }
    }
}

impl Default for BuiltinChecks {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckSource for BuiltinChecks {
    fn load(&self, name: &str) -> Option<CheckSpec> {
        self.checks.get(name).map(|c| c.spec.clone())
    }

    fn names(&self) -> Vec<String> {
        self.checks.keys().cloned().collect()
    }

    fn is_default(&self, name: &str) -> bool {
        self.checks.get(name).is_some_and(|c| c.default)
    }
}

/// Custom checks from configuration layered over a base source.
///
/// Custom checks shadow nothing: the builder rejects names that already
/// exist in the base before constructing this.
pub(crate) struct LayeredChecks<'a> {
    base: &'a dyn CheckSource,
    custom: BTreeMap<String, CheckSpec>,
}

impl<'a> LayeredChecks<'a> {
    pub(crate) fn new(base: &'a dyn CheckSource, custom: BTreeMap<String, CheckSpec>) -> Self {
        Self { base, custom }
    }

    pub(crate) fn custom_names(&self) -> impl Iterator<Item = &String> {
        self.custom.keys()
    }
}

impl CheckSource for LayeredChecks<'_> {
    fn load(&self, name: &str) -> Option<CheckSpec> {
        self.custom
            .get(name)
            .cloned()
            .or_else(|| self.base.load(name))
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.base.names();
        names.extend(self.custom.keys().cloned());
        names.sort();
        names
    }

    fn is_default(&self, name: &str) -> bool {
        !self.custom.contains_key(name) && self.base.is_default(name)
    }
}

fn builtin_catalog() -> Vec<(CheckSpec, bool)> {
    vec![
        (
            CheckSpec::new(
                "dangling-service",
                "dangling-service",
                "Indicates when services do not have any associated deployments.",
                "Confirm that your service's selector correctly matches the labels on one of your deployments.",
            )
            .multi_object(),
            true,
        ),
        (
            CheckSpec::new(
                "host-ipc",
                "host-ipc",
                "Alert on pods/deployment-likes with sharing host's IPC namespace",
                "Ensure the host's IPC namespace is not shared.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "host-network",
                "host-network",
                "Alert on pods/deployment-likes with sharing host's network namespace",
                "Ensure the host's network namespace is not shared.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "host-pid",
                "host-pid",
                "Alert on pods/deployment-likes with sharing host's process namespace",
                "Ensure the host's process namespace is not shared.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "latest-tag",
                "latest-tag",
                "Indicates when a deployment-like object is running a container with a floating image tag, \"latest\".",
                "Use a container image with a specific tag other than latest.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "no-read-only-root-fs",
                "read-only-root-fs",
                "Indicates when containers are running without a read-only root filesystem.",
                "Set readOnlyRootFilesystem to true in the container securityContext.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "non-existent-service-account",
                "service-account",
                "Indicates when pods reference a service account that is not found.",
                "Create the missing service account, or refer to an existing service account.",
            )
            .multi_object(),
            true,
        ),
        (
            CheckSpec::new(
                "non-isolated-pod",
                "non-isolated-pod",
                "Alert on deployment-like objects that are not selected by any NetworkPolicy.",
                "Ensure pod does not accept unsafe traffic by isolating it with a NetworkPolicy.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "pdb-max-unavailable",
                "pdb-max-unavailable",
                "Indicates when a PodDisruptionBudget has a maxUnavailable value that will always prevent disruptions of pods created by related deployment-like objects.",
                "Change the PodDisruptionBudget to have maxUnavailable set to a value greater than 0.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "pdb-min-available",
                "pdb-min-available",
                "Indicates when a PodDisruptionBudget sets a minAvailable value that will always prevent disruptions of pods created by related deployment-like objects.",
                "Change the PodDisruptionBudget to have minAvailable set to a number lower than the number of replicas in the related deployment-like objects.",
            ),
            false,
        ),
        (
            CheckSpec::new(
                "privilege-escalation-container",
                "privilege-escalation-container",
                "Alert on containers of allowing privilege escalation that could gain more privileges than its parent process.",
                "Ensure containers do not allow privilege escalation by setting allowPrivilegeEscalation=false.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "privileged-container",
                "privileged",
                "Indicates when deployments have containers running in privileged mode.",
                "Do not run your container as privileged unless it is required.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "run-as-non-root",
                "run-as-non-root",
                "Indicates when containers are not set to runAsNonRoot.",
                "Set runAsUser to a non-zero number and runAsNonRoot to true in your pod or container securityContext.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "unsafe-sysctls",
                "unsafe-sysctls",
                "Alert on deployments specifying unsafe sysctls that may lead to severe problems like wrong behavior of containers",
                "Ensure container does not allow unsafe allocation of system resources by removing unsafe sysctls configurations.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "unset-cpu-requirements",
                "cpu-requirements",
                "Indicates when containers do not have CPU requests and limits set.",
                "Set CPU requests and limits for your container based on its requirements.",
            ),
            true,
        ),
        (
            CheckSpec::new(
                "unset-memory-requirements",
                "memory-requirements",
                "Indicates when containers do not have memory requests and limits set.",
                "Set memory requests and limits for your container based on its requirements.",
            ),
            true,
        ),
    ]
}
