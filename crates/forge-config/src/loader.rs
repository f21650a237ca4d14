use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::{forge_home, ForgeConfig};

/// Loads the Forge configuration from disk.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > FORGE_CONFIG env > ~/.forge/forge.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("FORGE_CONFIG") {
            return PathBuf::from(p);
        }
        forge_home().join("forge.toml")
    }

    /// Load the config from disk, falling back to defaults when the file
    /// does not exist. A file that exists but does not parse is an error —
    /// silently ignoring a broken config hides misconfiguration.
    pub fn load(path: Option<&Path>) -> forge_core::Result<ForgeConfig> {
        let config_path = Self::resolve_path(path);
        if !config_path.exists() {
            warn!(?config_path, "config file not found, using defaults");
            return Ok(ForgeConfig::default());
        }

        info!(?config_path, "loading configuration");
        let raw = std::fs::read_to_string(&config_path)?;
        toml::from_str::<ForgeConfig>(&raw).map_err(|e| {
            forge_core::ForgeError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }
}
