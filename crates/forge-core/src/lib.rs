//! # forge-core
//!
//! Core types, errors, and the action envelope contract for the Forge
//! orchestration engine. This crate defines the shared vocabulary used by
//! every other crate in the workspace.

pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::{
    Action, ActionEnvelope, ActionStatus, FactToSave, Mode, Question, TaskPriority, TaskToAdd,
};
pub use error::{ForgeError, Result};
pub use types::{CapabilityKey, Origin, SessionId};
