//! Binding of one relational transaction to one block.
//!
//! Opened at BeginBlock, it is the only write path for native modules during
//! the block. At Commit it is committed if the execution engine committed and
//! rolled back otherwise.
//!
//! The two commits are not atomic: a crash between the engine commit and the
//! relational commit leaves the stores one block apart.

use tracing::{debug, warn};

use crate::domain::StoreError;
use crate::ports::{RelationalStore, RelationalTx};

/// What happened to a block's relational transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    Committed,
    RolledBack,
}

pub struct BlockTransaction<S: RelationalStore> {
    height: u64,
    tx: S::Tx,
}

impl<S: RelationalStore> BlockTransaction<S> {
    pub fn open(store: &S, height: u64) -> Result<Self, StoreError> {
        let tx = store.begin()?;
        debug!(height, "relational transaction opened");
        Ok(Self { height, tx })
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// The block's write path.
    pub fn writer(&mut self) -> &mut S::Tx {
        &mut self.tx
    }

    /// Commit when `engine_committed`, roll back otherwise.
    pub fn finalize(self, engine_committed: bool) -> Result<Finalized, StoreError> {
        if engine_committed {
            self.tx.commit()?;
            debug!(height = self.height, "relational transaction committed");
            Ok(Finalized::Committed)
        } else {
            self.tx.rollback()?;
            warn!(
                height = self.height,
                "execution engine commit failed; relational transaction rolled back"
            );
            Ok(Finalized::RolledBack)
        }
    }
}

/// Run `f` in its own transaction and commit it (genesis, out-of-block writes).
pub fn with_autocommit<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: RelationalStore,
    E: From<StoreError>,
    F: FnOnce(&mut S::Tx) -> Result<T, E>,
{
    let mut tx = store.begin()?;
    match f(&mut tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            tx.rollback()?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryRelationalStore;
    use crate::domain::{Candidate, CandidateState, Description, StakeError};
    use crate::ports::{CandidateReader, CandidateWriter};

    fn candidate() -> Candidate {
        Candidate {
            id: 0,
            pub_key: [1; 32],
            owner_address: [1; 20],
            voting_power: 0,
            description: Description::default(),
            verified: false,
            active: true,
            created_at: 0,
            block_height: 1,
            state: CandidateState::Candidate,
        }
    }

    #[test]
    fn test_finalize_follows_engine_outcome() {
        let store = InMemoryRelationalStore::new();

        let mut block = BlockTransaction::open(&store, 1).unwrap();
        block.writer().insert_candidate(candidate()).unwrap();
        assert_eq!(block.finalize(false).unwrap(), Finalized::RolledBack);
        assert!(store.snapshot().unwrap().candidates().unwrap().is_empty());

        let mut block = BlockTransaction::open(&store, 1).unwrap();
        block.writer().insert_candidate(candidate()).unwrap();
        assert_eq!(block.finalize(true).unwrap(), Finalized::Committed);
        assert_eq!(store.snapshot().unwrap().candidates().unwrap().len(), 1);
    }

    #[test]
    fn test_open_fails_when_store_unavailable() {
        let store = InMemoryRelationalStore::new();
        store.set_unavailable(true);
        assert!(BlockTransaction::open(&store, 1).is_err());
    }

    #[test]
    fn test_autocommit_rolls_back_on_error() {
        let store = InMemoryRelationalStore::new();
        let result: Result<(), StakeError> = with_autocommit(&store, |tx| {
            tx.insert_candidate(candidate())?;
            Err(StakeError::InvalidGenesisAddress)
        });
        assert!(result.is_err());
        assert!(store.snapshot().unwrap().candidates().unwrap().is_empty());
    }
}
