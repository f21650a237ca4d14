//! # forge-oracle
//!
//! Abstraction over the language-model backend. The oracle does two jobs:
//! interpret user input into a raw envelope string (validated elsewhere),
//! and draft source text for the capability builder. Nothing here parses
//! envelopes — the oracle returns text, the core validator owns structure.

pub mod http;
pub mod mock;
pub mod prompts;
pub mod provider;

pub use http::HttpOracle;
pub use mock::MockOracle;
pub use prompts::PromptBuilder;
pub use provider::Oracle;
