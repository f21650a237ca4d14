use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// The structured, validated output of the reasoning oracle for one turn:
/// what to say, ask, remember, and do.
///
/// This contract is the sole boundary between free-form natural language and
/// the deterministic orchestration core — nothing downstream ever inspects
/// raw oracle text. Validation is all-or-nothing: a rejected envelope yields
/// no side effects anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionEnvelope {
    pub assistant_message: String,
    pub mode: Mode,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub ideas: Vec<String>,
    #[serde(default)]
    pub facts_to_save: Vec<FactToSave>,
    #[serde(default)]
    pub tasks_to_add: Vec<TaskToAdd>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub directive_updates: serde_json::Map<String, serde_json::Value>,
}

/// The turn's control-flow decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Brainstorming,
    Clarification,
    Execution,
}

/// A clarifying question the assistant wants answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Question {
    pub id: String,
    pub scope: String,
    pub question: String,
}

/// A fact the oracle wants persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactToSave {
    pub key: String,
    pub value: String,
}

/// A backlog task proposed by the oracle. Appended regardless of mode —
/// planning is orthogonal to execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskToAdd {
    pub title: String,
    #[serde(default)]
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Normal,
    High,
}

/// One unit of work addressed to a capability handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    /// Capability key naming the handler.
    pub plugin: String,
    /// What the handler should accomplish; also the build goal when no
    /// handler exists yet.
    pub goal: String,
    pub status: ActionStatus,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Ready,
}

impl ActionEnvelope {
    /// Validate raw oracle output into an envelope.
    ///
    /// Any contract violation — unknown top-level key, bad `mode`, a list
    /// element missing a required field, an out-of-range `status` — maps to
    /// [`ForgeError::SchemaViolation`] carrying the parser message verbatim.
    pub fn parse(raw: &str) -> Result<Self> {
        let json = extract_json(raw)
            .ok_or_else(|| ForgeError::SchemaViolation("no JSON object found in oracle output".into()))?;
        serde_json::from_str(json).map_err(|e| ForgeError::SchemaViolation(e.to_string()))
    }

    /// Actions with `status = ready`, the only ones the dispatcher accepts.
    pub fn ready_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Ready)
    }

    /// Actions with `status = pending` — recorded, never dispatched.
    pub fn pending_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
    }
}

/// Slice the first `{` .. last `}` span out of raw model output, so replies
/// wrapped in prose or code fences still reach the validator.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "Sure! Here you go:\n```json\n{\"a\":1}\n```";
        assert_eq!(extract_json(raw), Some("{\"a\":1}"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no braces here"), None);
    }
}
