use std::sync::Arc;
use std::time::Instant;

use forge_core::{Action, ActionStatus, Result};
use tracing::{info, warn};

use crate::registry::CapabilityRegistry;
use crate::specialist::HandlerResult;

/// What happened to a dispatched action.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran; its structured result is attached (which may
    /// itself report an error).
    Completed(HandlerResult),
    /// No handler covers this capability — the signal to build one.
    NeedsBuild { target: String, goal: String },
    /// A handler exists for the key but declined the action.
    Mismatch { capability: String, goal: String },
}

/// Routes ready actions to their specialists.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch one ready action.
    ///
    /// An unresolved capability is not an error here — it comes back as
    /// [`DispatchOutcome::NeedsBuild`] for the caller to act on. Errors
    /// are reserved for transport failures inside a resolved handler.
    pub async fn dispatch(&self, action: &Action) -> Result<DispatchOutcome> {
        debug_assert_eq!(action.status, ActionStatus::Ready);

        let Some(handler) = self.registry.resolve(&action.plugin) else {
            info!(capability = %action.plugin, "capability not registered, needs building");
            return Ok(DispatchOutcome::NeedsBuild {
                target: action.plugin.clone(),
                goal: action.goal.clone(),
            });
        };

        if !handler.specialist.can_handle(action) {
            warn!(
                capability = %action.plugin,
                goal = %action.goal,
                "handler declined action"
            );
            return Ok(DispatchOutcome::Mismatch {
                capability: action.plugin.clone(),
                goal: action.goal.clone(),
            });
        }

        let started = Instant::now();
        let result = handler.specialist.handle(action).await?;
        info!(
            capability = %action.plugin,
            success = result.succeeded(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "action dispatched"
        );
        Ok(DispatchOutcome::Completed(result))
    }
}
