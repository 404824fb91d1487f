pub mod engine_ledger;
pub mod memory_engine;
pub mod memory_governance;

pub use engine_ledger::EngineLedger;
pub use memory_engine::InMemoryEngine;
pub use memory_governance::InMemoryGovernance;
