use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Stable identifier naming a unit of functionality a handler provides.
pub type CapabilityKey = String;

/// Which control loop produced a side effect. Persisted as the fact `source`
/// so repair history and preferences can be traced back to their origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The interactive foreground loop.
    Foreground,
    /// The autonomous background scheduler.
    Scheduler,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Foreground => "foreground",
            Origin::Scheduler => "scheduler",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
