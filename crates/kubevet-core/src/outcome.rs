use std::fmt;

use serde::{Deserialize, Serialize};

/// Result kind of validating one object against the enabled checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// At least one enabled check reported a finding.
    NeedsImprovement,
    /// No enabled check reported a finding.
    Valid,
    /// The object was skipped (e.g. opted out via annotation).
    Ignored,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsImprovement => write!(f, "needs_improvement"),
            Self::Valid => write!(f, "valid"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}
