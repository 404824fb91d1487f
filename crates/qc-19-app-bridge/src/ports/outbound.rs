//! Outbound (Driven) ports for the application bridge.
//!
//! Both collaborators are shared between the lifecycle driver and the mempool
//! connection, so every method takes `&self` and implementations synchronize
//! internally.

use qc_18_staking::ExecutionContext;
use shared_types::{Address, Hash, PublicKey, Transaction, U256};

use crate::domain::{BlockHeader, TxResponse};

/// Which of the engine's account states an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateView {
    /// Mempool-time state, reset from the committed state at every commit.
    Check,
    /// State of the block being delivered.
    Deliver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    pub last_height: u64,
    pub app_hash: Hash,
}

/// Sender and current nonce of a native transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicCheck {
    pub sender: Address,
    pub nonce: u64,
}

/// A rejection reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: String,
    pub log: String,
}

impl Rejection {
    pub fn new(code: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            log: log.into(),
        }
    }
}

/// The EVM-compatible execution engine.
pub trait ExecutionEngine: Send + Sync {
    fn info(&self) -> EngineInfo;

    /// Chain id the engine's signer commits to.
    fn net_version(&self) -> u64;

    /// Mempool validation of an engine transaction.
    fn check_tx(&self, tx: &Transaction) -> TxResponse;

    /// Recover the sender and validate its nonce in `view`.
    fn basic_check(&self, view: StateView, tx: &Transaction) -> Result<BasicCheck, Rejection>;

    /// Recover the signer with the engine's chain signer.
    fn recover_sender(&self, tx: &Transaction) -> Result<Address, Rejection>;

    fn deliver_tx(&self, tx: &Transaction) -> TxResponse;

    fn begin_block(&self, header: &BlockHeader);

    /// Close the block; returns the gas fees the engine collected.
    fn end_block(&self, height: u64) -> U256;

    /// Persist the delivered block and return the engine's state root.
    fn commit(&self) -> Result<Hash, Rejection>;

    fn nonce(&self, view: StateView, address: &Address) -> u64;

    fn set_nonce(&self, view: StateView, address: &Address, nonce: u64);

    fn balance(&self, view: StateView, address: &Address) -> U256;

    fn sub_balance(&self, view: StateView, address: &Address, amount: U256);

    fn add_balance(&self, view: StateView, address: &Address, amount: U256);
}

/// Vote outcome of a governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    Pending,
    Approved,
    Rejected,
}

/// Execution status of a retirement, written back by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetirementStatus {
    Success,
    Rejected,
}

/// A proposal retiring the running program version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetiringProposal {
    pub id: u64,
    pub version: String,
    pub preserved_validators: Vec<PublicKey>,
    pub expire_height: u64,
    pub result: VoteResult,
    pub status: Option<RetirementStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernanceReceipt {
    pub gas_used: u64,
    pub gas_fee: U256,
    pub data: Vec<u8>,
}

/// The governance module, consumed for retirement and `governance/*` routing.
pub trait GovernanceGateway: Send + Sync {
    /// The retirement proposal targeting `version`, if any.
    fn retiring_proposal(&self, version: &str) -> Option<RetiringProposal>;

    fn proposal(&self, id: u64) -> Option<RetiringProposal>;

    fn update_retirement_status(&self, id: u64, status: RetirementStatus);

    /// Re-evaluate proposal `id` when block `height` is reached.
    fn schedule_pending(&self, id: u64, height: u64);

    /// Height at which the previous program version retired, 0 if never.
    fn latest_retired_height(&self) -> u64;

    fn check_tx(&self, ctx: &ExecutionContext, kind: &str, payload: &[u8])
        -> Result<(), Rejection>;

    fn deliver_tx(
        &self,
        ctx: &ExecutionContext,
        kind: &str,
        payload: &[u8],
    ) -> Result<GovernanceReceipt, Rejection>;
}
