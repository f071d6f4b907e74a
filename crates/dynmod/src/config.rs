//! Manifest-driven registry provisioning.
//!
//! A TOML manifest names the modules a process registers at startup, so
//! deployments can change candidate paths and reload policies without a
//! rebuild. [`crate::registry::LoaderRegistry::apply_config`] consumes it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::ReloadPolicy;

/// One module entry in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Registry key callers look the loader up by.
    pub name: String,
    /// Candidate paths, tried in order.
    pub paths: Vec<String>,
    /// Swap behavior. Cold when omitted.
    #[serde(default)]
    pub policy: ReloadPolicy,
}

/// Manifest listing the modules a process registers.
///
/// ```toml
/// [[modules]]
/// name = "codec"
/// paths = ["/opt/plugins/libcodec.so", "/usr/lib/libcodec.so"]
/// policy = "hot"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl RegistryConfig {
    /// Parse a manifest from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        for spec in &self.modules {
            if spec.name.is_empty() {
                return Err(Error::config("module entry with an empty name"));
            }
            if spec.paths.is_empty() {
                return Err(Error::config(format!(
                    "module '{}' has no candidate paths",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}
