use thiserror::Error;

/// Unified error type for the entire Forge engine.
#[derive(Error, Debug)]
pub enum ForgeError {
    // ── Envelope / contract errors ─────────────────────────────
    #[error("envelope rejected: {0}")]
    SchemaViolation(String),

    // ── Oracle errors ──────────────────────────────────────────
    #[error("reasoning oracle unavailable: {0}")]
    OracleUnavailable(String),

    // ── Registry / dispatch errors ─────────────────────────────
    #[error("capability mismatch: handler for {capability} declined goal: {goal}")]
    CapabilityMismatch { capability: String, goal: String },

    #[error("dispatch failed: {capability}: {reason}")]
    Dispatch { capability: String, reason: String },

    // ── Builder errors ─────────────────────────────────────────
    #[error("build failed for {target}: {reason}")]
    Build { target: String, reason: String },

    #[error("build for {target} timed out after {secs}s")]
    BuildTimeout { target: String, secs: u64 },

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
