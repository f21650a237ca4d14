//! # forge-builder
//!
//! Manufactures missing capability handlers: scaffold from an oracle draft,
//! run the handler's own tests, repair on failure, and publish a manifest
//! only once the tests pass. Per-target gates coalesce concurrent build
//! requests into a single cycle.

pub mod builder;
pub mod gate;

pub use builder::{BuildOutcome, BuildReport, Builder, BuilderSettings};
pub use gate::{await_report, BuildGates, GateLease, GateTicket};
