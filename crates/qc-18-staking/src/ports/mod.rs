//! Ports layer for the Staking subsystem.
//!
//! Outbound (Driven) ports only: the relational candidate store, the native
//! key-value store and the execution engine's account balances.

pub mod outbound;

pub use outbound::*;
