//! # forge-memory
//!
//! Durable storage for atomic facts, promoted preferences, repair history,
//! and turn history. Backed by SQLite; every write is atomic and durable
//! before the call returns. This store is the only state shared between the
//! foreground loop and the background scheduler besides the registry.

pub mod store;

pub use store::{
    ConversationTurn, Fact, FactType, MemoryStore, NewFact, Preference, RepairRecord,
};
