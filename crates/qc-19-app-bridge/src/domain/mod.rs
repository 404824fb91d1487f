pub mod app_hash;
pub mod lifecycle;
pub mod native_store;
pub mod types;

pub use app_hash::*;
pub use lifecycle::*;
pub use native_store::*;
pub use types::*;
