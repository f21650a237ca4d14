//! # forge-runtime
//!
//! Ties the engine together: the router that turns validated envelopes
//! into side effects, the persistent task docket, the autonomous
//! scheduler, and the `Engine` facade both loops share.

pub mod docket;
pub mod engine;
pub mod router;
pub mod scheduler;

pub use docket::{Docket, DocketTask};
pub use engine::Engine;
pub use router::{ActionReport, ActionResultKind, Router, TurnOutcome};
pub use scheduler::{Scheduler, SchedulerHandle};
