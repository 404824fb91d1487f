//! # Staking Subsystem
//!
//! Candidacy lifecycle, validator-set reconciliation and the block-bound
//! relational transaction of the PoS application layer.
//!
//! ## Purpose
//!
//! Owns every candidate row. Each staking transaction is implemented twice: a
//! read-only **check** against the committed snapshot (mempool admission) and
//! an authoritative **deliver** that re-checks against the block's relational
//! transaction before mutating it.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Owner address and public key unique among candidates | `domain/check.rs`, `adapters/memory_store.rs` |
//! | At most one PENDING account update per destination | `domain/check.rs` - `update_candidate_account()` |
//! | Key rotations never apply in place | `domain/deliver.rs` - `update_candidacy()` |
//! | Validator view: power desc, address asc, no zero power | `domain/reconciler.rs` - `validator_view()` |
//! | Relational commit follows the engine commit | `service/block_tx.rs` - `finalize()` |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - InMemoryRelationalStore (snapshot + tx)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - CandidateReader/Writer, RelationalStore,    │
//! │                      KeyValueStore, BalanceReader/Ledger         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/  - entities, StakeTx, check, deliver, reconciler        │
//! │  service/ - StakeModule, BlockTransaction                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryRelationalStore;
pub use domain::*;
pub use ports::*;
pub use service::{with_autocommit, BlockTransaction, Finalized, StakeModule};
