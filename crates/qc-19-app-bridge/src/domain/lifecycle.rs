//! Block lifecycle phases.
//!
//! ```text
//! Idle --begin_block--> BlockOpen --commit--> Committing --> Idle
//! ```
//!
//! DeliverTx and EndBlock need an open block. Info and CheckTx are accepted in
//! any phase.

use crate::error::{BridgeFault, BridgeResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    BlockOpen,
    Committing,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fail with a phase fault unless the current phase is `expected`.
    pub fn require(&self, expected: Phase, call: &'static str) -> BridgeResult<()> {
        if self.phase != expected {
            return Err(BridgeFault::Phase {
                call,
                phase: self.phase,
            });
        }
        Ok(())
    }

    pub fn begin_block(&mut self) -> BridgeResult<()> {
        self.require(Phase::Idle, "begin_block")?;
        self.phase = Phase::BlockOpen;
        Ok(())
    }

    pub fn start_commit(&mut self) -> BridgeResult<()> {
        self.require(Phase::BlockOpen, "commit")?;
        self.phase = Phase::Committing;
        Ok(())
    }

    pub fn finish_commit(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut lc = Lifecycle::default();
        lc.begin_block().unwrap();
        lc.require(Phase::BlockOpen, "deliver_tx").unwrap();
        lc.start_commit().unwrap();
        assert_eq!(lc.phase(), Phase::Committing);
        lc.finish_commit();
        assert_eq!(lc.phase(), Phase::Idle);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut lc = Lifecycle::default();
        assert!(matches!(
            lc.start_commit(),
            Err(BridgeFault::Phase { call: "commit", phase: Phase::Idle })
        ));
        lc.begin_block().unwrap();
        assert!(lc.begin_block().is_err());
    }
}
