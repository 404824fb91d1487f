//! In-memory relational store.
//!
//! Committed state is an immutable `Arc<Tables>`. Snapshots share it, and a
//! transaction works on a private copy that replaces it on commit, so readers
//! never wait on an open transaction.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sha3::{Digest, Sha3_256};
use shared_types::{Address, Hash, PublicKey};

use crate::domain::{AccountUpdateRequest, Candidate, StoreError};
use crate::ports::{CandidateReader, CandidateWriter, RelationalStore, RelationalTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    candidates: BTreeMap<u64, Candidate>,
    requests: BTreeMap<u64, AccountUpdateRequest>,
    next_candidate_id: u64,
    next_request_id: u64,
}

impl Tables {
    fn digest(&self) -> Hash {
        let mut hasher = Sha3_256::new();
        for candidate in self.candidates.values() {
            hasher.update(candidate.row_hash());
        }
        for request in self.requests.values() {
            hasher.update(request.row_hash());
        }
        hasher.finalize().into()
    }

    fn check_unique(&self, candidate: &Candidate) -> Result<(), StoreError> {
        for other in self.candidates.values() {
            if other.id == candidate.id {
                continue;
            }
            if other.owner_address == candidate.owner_address {
                return Err(StoreError::ConstraintViolation(
                    "candidates.owner_address".into(),
                ));
            }
            if other.pub_key == candidate.pub_key {
                return Err(StoreError::ConstraintViolation("candidates.pub_key".into()));
            }
        }
        Ok(())
    }

    fn candidate_by_address(&self, address: &Address) -> Option<Candidate> {
        self.candidates
            .values()
            .find(|c| &c.owner_address == address)
            .cloned()
    }

    fn candidate_by_pub_key(&self, pub_key: &PublicKey) -> Option<Candidate> {
        self.candidates
            .values()
            .find(|c| &c.pub_key == pub_key)
            .cloned()
    }

    fn pending_requests_to(&self, address: &Address) -> Vec<AccountUpdateRequest> {
        self.requests
            .values()
            .filter(|r| &r.to_address == address && r.is_pending())
            .cloned()
            .collect()
    }

    fn pending_requests_for(&self, candidate_id: u64) -> Vec<AccountUpdateRequest> {
        self.requests
            .values()
            .filter(|r| r.candidate_id == candidate_id && r.is_pending())
            .cloned()
            .collect()
    }
}

macro_rules! impl_reader {
    ($ty:ty, $tables:ident) => {
        impl CandidateReader for $ty {
            fn candidate_by_id(&self, id: u64) -> Result<Option<Candidate>, StoreError> {
                Ok(self.$tables.candidates.get(&id).cloned())
            }

            fn candidate_by_address(
                &self,
                address: &Address,
            ) -> Result<Option<Candidate>, StoreError> {
                Ok(self.$tables.candidate_by_address(address))
            }

            fn candidate_by_pub_key(
                &self,
                pub_key: &PublicKey,
            ) -> Result<Option<Candidate>, StoreError> {
                Ok(self.$tables.candidate_by_pub_key(pub_key))
            }

            fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
                Ok(self.$tables.candidates.values().cloned().collect())
            }

            fn request_by_id(&self, id: u64) -> Result<Option<AccountUpdateRequest>, StoreError> {
                Ok(self.$tables.requests.get(&id).cloned())
            }

            fn pending_requests_to(
                &self,
                address: &Address,
            ) -> Result<Vec<AccountUpdateRequest>, StoreError> {
                Ok(self.$tables.pending_requests_to(address))
            }

            fn pending_requests_for(
                &self,
                candidate_id: u64,
            ) -> Result<Vec<AccountUpdateRequest>, StoreError> {
                Ok(self.$tables.pending_requests_for(candidate_id))
            }
        }
    };
}

/// In-memory implementation of RelationalStore for testing
#[derive(Clone, Default)]
pub struct InMemoryRelationalStore {
    committed: Arc<RwLock<Arc<Tables>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `begin`/`snapshot`/`digest` fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".into()));
        }
        Ok(())
    }
}

impl RelationalStore for InMemoryRelationalStore {
    type Tx = InMemoryTx;
    type Snapshot = InMemorySnapshot;

    fn begin(&self) -> Result<InMemoryTx, StoreError> {
        self.ensure_available()?;
        let base = self.committed.read().clone();
        Ok(InMemoryTx {
            committed: Arc::clone(&self.committed),
            working: (*base).clone(),
            base,
        })
    }

    fn snapshot(&self) -> Result<InMemorySnapshot, StoreError> {
        self.ensure_available()?;
        Ok(InMemorySnapshot {
            tables: self.committed.read().clone(),
        })
    }

    fn digest(&self) -> Result<Hash, StoreError> {
        self.ensure_available()?;
        Ok(self.committed.read().digest())
    }
}

/// Read-only view of committed state.
pub struct InMemorySnapshot {
    tables: Arc<Tables>,
}

impl_reader!(InMemorySnapshot, tables);

/// An open transaction over a private copy of the tables.
pub struct InMemoryTx {
    committed: Arc<RwLock<Arc<Tables>>>,
    base: Arc<Tables>,
    working: Tables,
}

impl_reader!(InMemoryTx, working);

impl CandidateWriter for InMemoryTx {
    fn insert_candidate(&mut self, mut candidate: Candidate) -> Result<u64, StoreError> {
        self.working.next_candidate_id += 1;
        candidate.id = self.working.next_candidate_id;
        self.working.check_unique(&candidate)?;
        let id = candidate.id;
        self.working.candidates.insert(id, candidate);
        Ok(id)
    }

    fn update_candidate(&mut self, candidate: &Candidate) -> Result<(), StoreError> {
        if !self.working.candidates.contains_key(&candidate.id) {
            return Err(StoreError::RowNotFound {
                table: "candidates",
                id: candidate.id,
            });
        }
        self.working.check_unique(candidate)?;
        self.working
            .candidates
            .insert(candidate.id, candidate.clone());
        Ok(())
    }

    fn insert_request(&mut self, mut request: AccountUpdateRequest) -> Result<u64, StoreError> {
        self.working.next_request_id += 1;
        request.id = self.working.next_request_id;
        let id = request.id;
        self.working.requests.insert(id, request);
        Ok(id)
    }

    fn update_request(&mut self, request: &AccountUpdateRequest) -> Result<(), StoreError> {
        if !self.working.requests.contains_key(&request.id) {
            return Err(StoreError::RowNotFound {
                table: "candidate_account_update_requests",
                id: request.id,
            });
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }
}

impl RelationalTx for InMemoryTx {
    fn commit(self) -> Result<(), StoreError> {
        let mut committed = self.committed.write();
        if !Arc::ptr_eq(&*committed, &self.base) {
            return Err(StoreError::Conflict);
        }
        *committed = Arc::new(self.working);
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateState, Description, RequestState};

    fn candidate(key: u8) -> Candidate {
        Candidate {
            id: 0,
            pub_key: [key; 32],
            owner_address: [key; 20],
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
    fn test_snapshot_does_not_see_open_transaction() {
        let store = InMemoryRelationalStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_candidate(candidate(1)).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.candidates().unwrap().is_empty());
        assert_eq!(tx.candidates().unwrap().len(), 1);

        tx.commit().unwrap();
        assert!(snapshot.candidates().unwrap().is_empty());
        assert_eq!(store.snapshot().unwrap().candidates().unwrap().len(), 1);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let store = InMemoryRelationalStore::new();
        let before = store.digest().unwrap();
        let mut tx = store.begin().unwrap();
        tx.insert_candidate(candidate(1)).unwrap();
        tx.rollback().unwrap();
        assert_eq!(store.digest().unwrap(), before);
    }

    #[test]
    fn test_unique_constraints() {
        let store = InMemoryRelationalStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_candidate(candidate(1)).unwrap();

        let mut same_key = candidate(2);
        same_key.pub_key = [1; 32];
        assert!(matches!(
            tx.insert_candidate(same_key),
            Err(StoreError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_digest_changes_with_rows() {
        let store = InMemoryRelationalStore::new();
        let empty = store.digest().unwrap();

        let mut tx = store.begin().unwrap();
        let id = tx.insert_candidate(candidate(1)).unwrap();
        tx.insert_request(AccountUpdateRequest {
            id: 0,
            candidate_id: id,
            from_address: [1; 20],
            to_address: [2; 20],
            created_block_height: 1,
            accepted_block_height: 0,
            state: RequestState::Pending,
        })
        .unwrap();
        tx.commit().unwrap();

        let one = store.digest().unwrap();
        assert_ne!(empty, one);

        let mut tx = store.begin().unwrap();
        let mut c = tx.candidate_by_id(id).unwrap().unwrap();
        c.verified = true;
        tx.update_candidate(&c).unwrap();
        tx.commit().unwrap();
        assert_ne!(store.digest().unwrap(), one);
    }

    #[test]
    fn test_concurrent_commit_conflicts() {
        let store = InMemoryRelationalStore::new();
        let mut a = store.begin().unwrap();
        let mut b = store.begin().unwrap();
        a.insert_candidate(candidate(1)).unwrap();
        b.insert_candidate(candidate(2)).unwrap();
        a.commit().unwrap();
        assert_eq!(b.commit(), Err(StoreError::Conflict));
    }

    #[test]
    fn test_unavailable_store() {
        let store = InMemoryRelationalStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.begin(), Err(StoreError::Unavailable(_))));
    }
}
