use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use forge_core::{Action, ForgeError, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::specialist::{HandlerResult, Specialist};

/// A specialist backed by a handler script on disk.
///
/// The contract is JSON-over-pipes: the action object goes to the child's
/// stdin, a [`HandlerResult`] object comes back on stdout. Non-zero exit
/// or unparseable output is a dispatch failure, not a handler `Error` —
/// a handler that wants to report an error does so in its result.
pub struct ProcessSpecialist {
    capabilities: Vec<String>,
    script: PathBuf,
}

impl ProcessSpecialist {
    pub fn new(capabilities: Vec<String>, script: PathBuf) -> Self {
        Self {
            capabilities,
            script,
        }
    }

    pub fn script(&self) -> &PathBuf {
        &self.script
    }
}

#[async_trait]
impl Specialist for ProcessSpecialist {
    fn describe_capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    fn can_handle(&self, action: &Action) -> bool {
        self.capabilities.iter().any(|c| c == &action.plugin)
    }

    async fn handle(&self, action: &Action) -> Result<HandlerResult> {
        let dispatch_err = |reason: String| ForgeError::Dispatch {
            capability: action.plugin.clone(),
            reason,
        };

        let payload = serde_json::to_vec(action)?;
        debug!(capability = %action.plugin, script = ?self.script, "spawning handler");

        let mut child = Command::new("sh")
            .arg(&self.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| dispatch_err(format!("failed to spawn handler: {e}")))?;

        // A handler is free to exit without consuming stdin, so a broken
        // pipe here is not a failure. Dropping the handle closes the pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&payload).await;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| dispatch_err(format!("handler did not complete: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(dispatch_err(format!(
                "handler exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str::<HandlerResult>(stdout.trim())
            .map_err(|e| dispatch_err(format!("malformed handler output: {e}")))
    }
}
