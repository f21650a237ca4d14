use std::path::Path;

use serde::{Deserialize, Serialize};

/// Handler manifest — `plugin.toml` inside `<plugins_dir>/<name>/`.
///
/// The manifest is the only thing the registry trusts: a handler directory
/// without one is invisible, whatever code it contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub description: String,
    /// Capability keys this handler answers for.
    pub capabilities: Vec<String>,
    /// Path of the entry script, relative to the manifest directory.
    pub specialist: String,
}

impl PluginManifest {
    pub const FILE_NAME: &'static str = "plugin.toml";

    pub fn from_toml(s: &str) -> forge_core::Result<Self> {
        toml::from_str(s).map_err(|e| {
            forge_core::ForgeError::Config(format!("failed to parse plugin.toml: {e}"))
        })
    }

    pub fn to_toml(&self) -> forge_core::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| forge_core::ForgeError::Config(format!("failed to render manifest: {e}")))
    }

    /// Load from `<dir>/plugin.toml`.
    pub fn load(dir: &Path) -> forge_core::Result<Self> {
        let raw = std::fs::read_to_string(dir.join(Self::FILE_NAME))?;
        Self::from_toml(&raw)
    }

    /// Write to `<dir>/plugin.toml`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> forge_core::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(Self::FILE_NAME), self.to_toml()?)?;
        Ok(())
    }
}
