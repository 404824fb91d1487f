//! # Shared Types Crate
//!
//! Identifiers, the envelope transaction, hex encoding helpers and the global
//! parameter set shared by the staking module and the application bridge.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Types that cross crate boundaries live here.
//! - **Fixed-width digests**: `Hash` and `AppHash` are arrays, never `Vec<u8>`,
//!   so composite commitments cannot be fed a short input.
//! - **Explicit configuration**: `Params` is a value passed by its owner, not
//!   a process-global.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod params;

pub use entities::*;
pub use errors::*;
pub use params::{ParamKind, Params, ParamsStore, PARAM_KEY, PARAM_TABLE};
