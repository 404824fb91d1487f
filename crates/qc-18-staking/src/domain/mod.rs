//! # Domain Layer - Staking Subsystem
//!
//! Pure candidacy rules and the validator-set algorithm.
//!
//! ## Components
//!
//! - `entities`: Candidate, AccountUpdateRequest, PubKeyUpdate, Validator
//! - `tx`: StakeTx tagged union, ExecutionContext
//! - `check`: read-only precondition pass
//! - `deliver`: mutating pass (re-runs check first)
//! - `reconciler`: validator view, diff, retirement plan
//! - `errors`: StakeError, StoreError

pub mod check;
pub mod deliver;
pub mod entities;
pub mod errors;
pub mod reconciler;
pub mod tx;

pub use check::*;
pub use deliver::*;
pub use entities::*;
pub use errors::*;
pub use reconciler::*;
pub use tx::*;
