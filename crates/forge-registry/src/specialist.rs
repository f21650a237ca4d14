use async_trait::async_trait;
use forge_core::{Action, FactToSave, Result};
use serde::{Deserialize, Serialize};

/// Outcome status of one handled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerStatus {
    Ok,
    Error,
    Skipped,
}

/// The structured result every specialist returns. A handler that fails
/// reports `Error` here; transport-level failures (spawn, malformed
/// output) surface as `Err` from `handle` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResult {
    pub status: HandlerStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Facts the handler wants persisted alongside its result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<FactToSave>,
}

impl HandlerResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HandlerStatus::Ok,
            message: message.into(),
            data: None,
            facts: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HandlerStatus::Error,
            message: message.into(),
            data: None,
            facts: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == HandlerStatus::Ok
    }
}

/// Trait implemented by anything that can execute actions — in-process
/// built-ins and subprocess handlers alike.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// The capability strings this specialist covers.
    fn describe_capabilities(&self) -> Vec<String>;

    /// Whether this specialist will accept the given action.
    fn can_handle(&self, action: &Action) -> bool;

    /// Execute the action. Must return a structured result, never free text.
    async fn handle(&self, action: &Action) -> Result<HandlerResult>;
}
