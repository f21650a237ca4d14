//! # forge-config
//!
//! Configuration system for the Forge engine. Reads from `forge.toml`,
//! with environment-variable path override — missing files fall back to
//! documented defaults.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BuilderConfig, ForgeConfig, LoggingConfig, MemoryConfig, OracleConfig, RegistryConfig,
    SchedulerConfig,
};
