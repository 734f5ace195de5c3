//! Error types for registry construction and configuration loading.

use std::path::PathBuf;

/// Errors raised while building a check registry snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// An include/exclude entry names a check no source knows.
    #[error("unknown check referenced: {name}")]
    UnknownCheck { name: String },

    /// A custom check reuses the name of an existing check.
    #[error("duplicate check definition: {name}")]
    DuplicateCheck { name: String },

    /// The check's gauge could not be created or registered.
    #[error("check {check} failed to register a counter: {source}")]
    CounterRegistration {
        check: String,
        #[source]
        source: prometheus::Error,
    },

    /// Resolution left no check enabled.
    #[error("no checks enabled")]
    NoChecksEnabled,

    /// Lookup of a check that is not part of the snapshot.
    #[error("check '{name}' is not registered")]
    CheckNotRegistered { name: String },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while loading check configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}
