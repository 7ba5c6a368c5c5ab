//! Host configuration.
//!
//! Selects the orchestration mode at startup. Values come from defaults, an
//! optional TOML file, and `COMPONENT_INIT_*` environment variables, in that
//! order of increasing precedence.
//!
//! ```toml
//! mode = "prepare"
//! allow_lazy = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::InitError;
use crate::mode::InitMode;
use crate::state::InitState;

/// Environment variable overriding [`HostConfig::mode`].
pub const ENV_MODE: &str = "COMPONENT_INIT_MODE";
/// Environment variable overriding [`HostConfig::allow_lazy`].
pub const ENV_ALLOW_LAZY: &str = "COMPONENT_INIT_ALLOW_LAZY";

/// Startup configuration of the init orchestration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Orchestration mode.
    pub mode: InitMode,
    /// Default `allow_lazy` for components bound through a registry.
    pub allow_lazy: bool,
}

impl HostConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, InitError> {
        toml::from_str(source)
            .map_err(|e| InitError::configuration(format!("invalid host config: {e}")))
    }

    /// Load a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, InitError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InitError::configuration(format!(
                "failed to read host config '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), InitError> {
        self.merge_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn merge_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), InitError> {
        if let Some(raw) = lookup(ENV_MODE) {
            self.mode = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_LAZY) {
            self.allow_lazy = parse_bool(ENV_ALLOW_LAZY, &raw)?;
        }
        Ok(())
    }

    /// Check the configuration for consistency.
    ///
    /// `allow_lazy` only applies to prepare mode; setting it under
    /// init-self mode is rejected.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.allow_lazy && self.mode == InitMode::InitSelf {
            return Err(InitError::configuration(format!(
                "allow_lazy requires mode = \"{}\", got \"{}\"",
                InitMode::Prepare,
                self.mode
            )));
        }
        Ok(())
    }

    /// Registry slice to install in the host state at startup.
    pub fn initial_state(&self) -> InitState {
        InitState::new(self.mode)
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, InitError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(InitError::configuration(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
