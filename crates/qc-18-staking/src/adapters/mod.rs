//! Adapters for the Staking subsystem.

pub mod memory_store;

pub use memory_store::{InMemoryRelationalStore, InMemorySnapshot, InMemoryTx};
