//! Outbound (Driven) ports for the Staking subsystem.

use shared_types::{Address, Hash, PublicKey, U256};

use crate::domain::{AccountUpdateRequest, Candidate, StoreError};

/// Read access to candidates and account-update requests.
///
/// Implemented by both the committed snapshot (check pass) and the block's
/// relational transaction (deliver pass).
pub trait CandidateReader {
    fn candidate_by_id(&self, id: u64) -> Result<Option<Candidate>, StoreError>;

    fn candidate_by_address(&self, address: &Address) -> Result<Option<Candidate>, StoreError>;

    fn candidate_by_pub_key(&self, pub_key: &PublicKey) -> Result<Option<Candidate>, StoreError>;

    /// All candidates in ascending id order.
    fn candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    fn request_by_id(&self, id: u64) -> Result<Option<AccountUpdateRequest>, StoreError>;

    /// PENDING requests whose destination is `address`.
    fn pending_requests_to(
        &self,
        address: &Address,
    ) -> Result<Vec<AccountUpdateRequest>, StoreError>;

    /// PENDING requests to move the candidate `candidate_id`, ascending id.
    fn pending_requests_for(
        &self,
        candidate_id: u64,
    ) -> Result<Vec<AccountUpdateRequest>, StoreError>;
}

/// Write access. Candidates are never deleted.
pub trait CandidateWriter: CandidateReader {
    /// Insert a candidate, assigning and returning its id.
    ///
    /// # Errors
    /// - `ConstraintViolation` if the owner address or public key is taken
    fn insert_candidate(&mut self, candidate: Candidate) -> Result<u64, StoreError>;

    fn update_candidate(&mut self, candidate: &Candidate) -> Result<(), StoreError>;

    /// Insert a request, assigning and returning its id.
    fn insert_request(&mut self, request: AccountUpdateRequest) -> Result<u64, StoreError>;

    fn update_request(&mut self, request: &AccountUpdateRequest) -> Result<(), StoreError>;
}

/// An open relational transaction.
pub trait RelationalTx: CandidateWriter + Send {
    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}

/// The relational store as an opaque ACID resource.
pub trait RelationalStore: Send + Sync {
    type Tx: RelationalTx;
    type Snapshot: CandidateReader + Send + Sync;

    /// Open a transaction over the committed state.
    fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Read-only view of the committed state. Never blocks on an open
    /// transaction and never observes its writes.
    fn snapshot(&self) -> Result<Self::Snapshot, StoreError>;

    /// Digest of the committed state.
    fn digest(&self) -> Result<Hash, StoreError>;
}

/// The native key-value store (params, queued key rotations).
pub trait KeyValueStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn remove(&mut self, key: &[u8]);
}

/// Account balances held by the execution engine.
pub trait BalanceReader {
    fn balance(&self, address: &Address) -> U256;
}

/// Balance mutation on the execution engine's deliver state.
pub trait BalanceLedger: BalanceReader {
    fn sub_balance(&mut self, address: &Address, amount: U256);

    fn add_balance(&mut self, address: &Address, amount: U256);
}
