//! Orchestration modes and per-component self-init policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InitError;

/// Process-wide orchestration mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitMode {
    /// Components initialize themselves as they mount.
    #[default]
    InitSelf,
    /// Components must be prepared by an external caller before they mount.
    Prepare,
}

impl InitMode {
    /// Stable name used in configuration files and environment variables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitSelf => "init-self",
            Self::Prepare => "prepare",
        }
    }
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitMode {
    type Err = InitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "init-self" | "init_self" | "self" => Ok(Self::InitSelf),
            "prepare" => Ok(Self::Prepare),
            other => Err(InitError::configuration(format!(
                "unknown init mode '{other}' (expected 'init-self' or 'prepare')"
            ))),
        }
    }
}

/// Whether a component type may initialize itself while the mode is
/// [`InitMode::InitSelf`], and at which lifecycle point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitSelfPolicy {
    /// Self-init after the first paint.
    #[default]
    Async,
    /// Self-init before the first paint.
    Blocking,
    /// Never self-init; the component relies on being prepared.
    Never,
}

impl InitSelfPolicy {
    /// Anything but [`InitSelfPolicy::Never`] permits self-init.
    pub fn permits_self_init(&self) -> bool {
        !matches!(self, Self::Never)
    }
}
