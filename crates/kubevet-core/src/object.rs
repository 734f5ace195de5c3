//! Read-only view of a watched Kubernetes object.
//!
//! The cache and the engine only ever need a handful of metadata fields, so
//! they are written against [`ResourceObject`] instead of a concrete client
//! type. [`ObjectMeta`] is a plain implementation used by the CLI and tests.

use serde::{Deserialize, Serialize};

/// Metadata accessors the validation core consumes.
pub trait ResourceObject {
    /// API group (`""` for the core group).
    fn group(&self) -> &str;

    /// API version within the group (e.g. `v1`).
    fn version(&self) -> &str;

    fn kind(&self) -> &str;

    fn namespace(&self) -> &str;

    fn name(&self) -> &str;

    /// Server-assigned UID. Empty until the object has been persisted.
    fn uid(&self) -> &str;

    /// Current resource version; changes on every persisted mutation.
    fn resource_version(&self) -> &str;
}

/// Owned object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub resource_version: String,
}

impl ObjectMeta {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Set the resource version.
    pub fn with_resource_version(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = resource_version.into();
        self
    }
}

impl ResourceObject for ObjectMeta {
    fn group(&self) -> &str {
        &self.group
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uid(&self) -> &str {
        &self.uid
    }

    fn resource_version(&self) -> &str {
        &self.resource_version
    }
}
