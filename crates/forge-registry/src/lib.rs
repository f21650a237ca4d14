//! # forge-registry
//!
//! The live map from capability keys to specialists. Registration is
//! copy-on-write so dispatch never blocks on a refresh; the authoritative
//! source of published handlers is the manifest directory, re-scanned on
//! demand rather than watched.

pub mod dispatcher;
pub mod manifest;
pub mod process;
pub mod registry;
pub mod specialist;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use manifest::PluginManifest;
pub use process::ProcessSpecialist;
pub use registry::{CapabilityRegistry, HandlerDescriptor, RegisteredHandler};
pub use specialist::{HandlerResult, HandlerStatus, Specialist};
