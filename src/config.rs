//! Machine configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// File name looked up inside the user's configuration directory.
const CONFIG_FILE: &str = "config.toml";

/// Settings for a [`crate::Machine`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Method started by the machine, without the `@` sigil.
    pub entry: String,
    /// Maximum number of frames on the call stack.
    pub max_call_depth: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            max_call_depth: 4096,
        }
    }
}

impl MachineConfig {
    pub fn with_entry(mut self, entry: impl AsRef<str>) -> Self {
        let entry = entry.as_ref();
        self.entry = entry.strip_prefix('@').unwrap_or(entry).to_string();
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.max_call_depth == 0 {
            return Err(LoadError::InvalidCallDepth(
                "call depth limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(data).context("parsing machine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// Loads `path` when given, else the user configuration file when it
    /// exists, else the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// `<config dir>/sml/config.toml`, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sml").join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = MachineConfig::from_toml_str("max_call_depth = 12").unwrap();
        assert_eq!(config.entry, "main");
        assert_eq!(config.max_call_depth, 12);
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert!(MachineConfig::from_toml_str("max_call_depth = 0").is_err());
    }

    #[test]
    fn entry_sigil_is_stripped() {
        let config = MachineConfig::default().with_entry("@start");
        assert_eq!(config.entry, "start");
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = MachineConfig::default().with_max_call_depth(7);
        let text = config.to_toml_string().unwrap();
        assert_eq!(MachineConfig::from_toml_str(&text).unwrap(), config);
    }
}
