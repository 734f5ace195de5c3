//! Identity and version derivation for cached objects.

use std::fmt;

use crate::object::ResourceObject;

/// Composite identity of a watched object.
///
/// Includes the UID so that an object deleted and recreated under the same
/// namespace/name gets a fresh identity. Objects without a UID (not yet
/// persisted) share the empty UID component and may collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl IdentityKey {
    /// Derive the key from an object's metadata. Pure and total.
    pub fn from_object(obj: &(impl ResourceObject + ?Sized)) -> Self {
        Self {
            group: obj.group().to_string(),
            version: obj.version().to_string(),
            kind: obj.kind().to_string(),
            namespace: obj.namespace().to_string(),
            name: obj.name().to_string(),
            uid: obj.uid().to_string(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)?;
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)?;
        }
        write!(f, " {}/{} ({})", self.namespace, self.name, self.uid)
    }
}

/// Opaque change marker captured when an object was last observed.
///
/// Only equality is meaningful; tags carry no ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Read the current tag from an object.
    pub fn of(obj: &(impl ResourceObject + ?Sized)) -> Self {
        Self(obj.resource_version().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this tag matches the object's current resource version.
    pub fn matches(&self, obj: &(impl ResourceObject + ?Sized)) -> bool {
        self.0 == obj.resource_version()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
