//! # Application Bridge
//!
//! The application-logic layer between a BFT consensus engine and two
//! execution backends: an EVM-compatible execution engine and the staking
//! state machine persisted in a relational store.
//!
//! ## Purpose
//!
//! Drives the six-message lifecycle (info, check-tx, deliver-tx, begin-block,
//! end-block, commit), routes native transactions to their module, reconciles
//! the validator set every block and produces one composite state commitment
//! per block.
//!
//! ## Failure Model
//!
//! | Failure | Outcome |
//! |---------|---------|
//! | Decode, validation, business rule | `TxError` in the response code, block continues |
//! | Illegal lifecycle call | `BridgeFault::Phase` |
//! | Relational or native store fault | `BridgeFault`, process terminated by `Supervisor` |
//! | Engine commit failure | Relational transaction rolled back, block hash still produced |
//!
//! The engine commit and the relational commit are two independent commits.
//! A crash between them leaves the stores one block apart; nothing here
//! detects or repairs that.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - InMemoryEngine, InMemoryGovernance, EngineLedger     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - ExecutionEngine, GovernanceGateway          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service/ - ConsensusBridge, MempoolConnection, ShutdownSignal   │
//! │  router.rs - module routing    domain/ - app hash, lifecycle     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod router;
pub mod service;
pub mod supervisor;
pub mod telemetry;

pub use config::{BridgeConfig, ConfigError};
pub use domain::*;
pub use error::{BridgeFault, BridgeResult, TxError};
pub use router::{classify, route, Module, RoutedTx, RouterError};
pub use service::{ConsensusBridge, MempoolConnection, ShutdownSignal};
pub use supervisor::{SupervisedBridge, Supervisor};
