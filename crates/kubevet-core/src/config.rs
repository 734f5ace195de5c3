//! Check configuration.
//!
//! ```yaml
//! version: 1
//! checks:
//!   doNotAutoAddDefaults: true
//!   include: [run-as-non-root, host-pid]
//!   exclude: []
//! customChecks:
//!   - name: team-label
//!     template: required-label
//!     description: Objects must carry a team label
//!     remediation: Add metadata.labels.team
//! ```
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `KUBEVET_CONFIG` | Config file path (default: `/config/kubevet.yaml`) |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checks::CheckSpec;
use crate::error::ConfigError;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub const CONFIG_PATH_ENV: &str = "KUBEVET_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "/config/kubevet.yaml";

/// Checks enabled when no config file is present.
pub const DEFAULT_INCLUDED_CHECKS: &[&str] = &[
    "host-ipc",
    "host-network",
    "host-pid",
    "non-isolated-pod",
    "pdb-max-unavailable",
    "pdb-min-available",
    "privilege-escalation-container",
    "privileged-container",
    "run-as-non-root",
    "unsafe-sysctls",
    "unset-cpu-requirements",
    "unset-memory-requirements",
];

/// Top-level check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub checks: ChecksConfig,

    /// Checks defined in configuration rather than the builtin catalog.
    #[serde(default)]
    pub custom_checks: Vec<CheckSpec>,
}

/// Which checks are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksConfig {
    /// Do not start from the source's default checks.
    #[serde(default)]
    pub do_not_auto_add_defaults: bool,

    /// Start from every known check.
    #[serde(default, rename = "addAllBuiltIn")]
    pub add_all_builtin: bool,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            checks: ChecksConfig::default(),
            custom_checks: Vec::new(),
        }
    }
}

impl CheckConfig {
    /// Configuration used when no config file exists: exactly the
    /// [`DEFAULT_INCLUDED_CHECKS`].
    pub fn builtin_default() -> Self {
        Self {
            checks: ChecksConfig {
                do_not_auto_add_defaults: true,
                include: DEFAULT_INCLUDED_CHECKS.iter().map(|s| s.to_string()).collect(),
                ..ChecksConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: CheckConfig = serde_yaml::from_str(raw)?;
        if cfg.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: cfg.version,
                supported: SUPPORTED_CONFIG_VERSION,
            });
        }
        Ok(cfg)
    }
}

/// Config path from `KUBEVET_CONFIG`, falling back to [`DEFAULT_CONFIG_PATH`].
pub fn config_path_from_env() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read and parse a config file.
pub fn load_config(path: &Path) -> Result<CheckConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    CheckConfig::from_yaml(&raw)
}

/// Like [`load_config`], but a missing file yields
/// [`CheckConfig::builtin_default`].
pub fn load_config_or_default(path: &Path) -> Result<CheckConfig, ConfigError> {
    if !path.is_file() {
        info!(path = %path.display(), "config file does not exist, using default configuration");
        return Ok(CheckConfig::builtin_default());
    }
    load_config(path)
}
