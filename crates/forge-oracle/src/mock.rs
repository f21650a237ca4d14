//! Mock oracle for deterministic testing.
//!
//! Returns queued responses in order without any HTTP calls, and records
//! every prompt it receives for assertions.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{ForgeError, Result};
use parking_lot::Mutex;

use crate::provider::Oracle;

/// What a [`MockOracle`] call received, for assertions in tests.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// "interpret" or "draft".
    pub kind: &'static str,
    /// The context (interpret) or prompt (draft).
    pub prompt: String,
    /// The user input (interpret only).
    pub input: Option<String>,
}

/// An oracle that replays pre-configured responses.
///
/// # Example
/// ```
/// use forge_oracle::MockOracle;
/// let oracle = MockOracle::new()
///     .with_response(r#"{"assistant_message": "hi", "mode": "brainstorming"}"#);
/// ```
#[derive(Clone, Default)]
pub struct MockOracle {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, msg: &str) -> Self {
        self.responses
            .lock()
            .push_back(Err(ForgeError::OracleUnavailable(msg.to_string())));
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn next_response(&self) -> Result<String> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ForgeError::OracleUnavailable("mock queue empty".into())))
    }
}

#[async_trait]
impl Oracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn interpret(&self, context: &str, input: &str) -> Result<String> {
        self.calls.lock().push(RecordedCall {
            kind: "interpret",
            prompt: context.to_string(),
            input: Some(input.to_string()),
        });
        self.next_response()
    }

    async fn draft(&self, prompt: &str) -> Result<String> {
        self.calls.lock().push(RecordedCall {
            kind: "draft",
            prompt: prompt.to_string(),
            input: None,
        });
        self.next_response()
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
