use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `forge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub oracle: OracleConfig,
    pub memory: MemoryConfig,
    pub registry: RegistryConfig,
    pub builder: BuilderConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

// ── Oracle ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible chat-completions endpoint.
    pub base_url: String,
    /// Model identifier, e.g. "gpt-4o-mini".
    pub model: String,
    /// Environment variable holding the API key (never stored in the file).
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call transport timeout.
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "FORGE_ORACLE_API_KEY".into(),
            max_tokens: 2048,
            temperature: 0.2,
            request_timeout_secs: 60,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite database path. Empty = `~/.forge/forge.db`.
    pub db_path: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: forge_home().join("forge.db"),
        }
    }
}

// ── Registry ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding one `<capability>/plugin.toml` manifest per
    /// published handler.
    pub plugins_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            plugins_dir: forge_home().join("plugins"),
        }
    }
}

// ── Builder ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum repair attempts before a build cycle is declared failed.
    pub max_repair_attempts: u32,
    /// Wall-clock budget for one scaffold/test/repair cycle.
    pub build_timeout_secs: u64,
    /// Command run inside the target directory to execute its test suite.
    pub test_command: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 3,
            build_timeout_secs: 300,
            test_command: "sh test.sh".into(),
        }
    }
}

// ── Scheduler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the autonomous background loop runs at all.
    pub enabled: bool,
    /// Seconds between autonomous ticks.
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 600,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via RUST_LOG.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// `~/.forge`, falling back to the current directory when no home exists.
pub fn forge_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".forge")
}
