//! In-memory execution engine.
//!
//! Accounts only: value transfers, nonces and gas fees. The signature of an
//! engine transaction is the sender's 20-byte address, so tests can sign
//! without key material.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use shared_types::{Address, Hash, Transaction, U256};
use tracing::{debug, warn};

use crate::domain::{BlockHeader, TxResponse};
use crate::error::TxError;
use crate::ports::{BasicCheck, EngineInfo, ExecutionEngine, Rejection, StateView};

#[derive(Debug, Clone, Default)]
struct Accounts {
    balances: BTreeMap<Address, U256>,
    nonces: BTreeMap<Address, u64>,
}

impl Accounts {
    fn nonce(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or_default()
    }

    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn sub(&mut self, address: &Address, amount: U256) {
        let balance = self.balance(address).saturating_sub(amount);
        self.balances.insert(*address, balance);
    }

    fn add(&mut self, address: &Address, amount: U256) {
        let balance = self.balance(address).saturating_add(amount);
        self.balances.insert(*address, balance);
    }

    fn root(&self) -> Hash {
        let mut hasher = Sha256::new();
        for (address, balance) in &self.balances {
            let mut bytes = [0u8; 32];
            balance.to_big_endian(&mut bytes);
            hasher.update(address);
            hasher.update(bytes);
        }
        for (address, nonce) in &self.nonces {
            hasher.update(address);
            hasher.update(nonce.to_be_bytes());
        }
        hasher.finalize().into()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    committed: Accounts,
    check: Accounts,
    deliver: Accounts,
    last_height: u64,
    last_hash: Hash,
    height: u64,
    block_fee: U256,
}

impl EngineState {
    fn view(&self, view: StateView) -> &Accounts {
        match view {
            StateView::Check => &self.check,
            StateView::Deliver => &self.deliver,
        }
    }

    fn view_mut(&mut self, view: StateView) -> &mut Accounts {
        match view {
            StateView::Check => &mut self.check,
            StateView::Deliver => &mut self.deliver,
        }
    }
}

pub struct InMemoryEngine {
    chain_id: u64,
    state: RwLock<EngineState>,
    fail_next_commit: AtomicBool,
}

impl InMemoryEngine {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: RwLock::new(EngineState::default()),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Credit `address` in every state, as a genesis allocation.
    pub fn fund(&self, address: &Address, amount: U256) {
        let mut state = self.state.write();
        state.committed.add(address, amount);
        state.check.add(address, amount);
        state.deliver.add(address, amount);
    }

    /// Make the next `commit` fail and discard the delivered block.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn validate(
        &self,
        accounts: &Accounts,
        tx: &Transaction,
    ) -> Result<(Address, U256), TxError> {
        let sender = self
            .recover_sender(tx)
            .map_err(|r| TxError::Validation(r.log))?;
        let expected = accounts.nonce(&sender);
        if tx.nonce != expected {
            return Err(TxError::Validation(format!(
                "invalid nonce: expected {expected}, got {}",
                tx.nonce
            )));
        }
        let fee = U256::from(tx.gas_limit).saturating_mul(tx.gas_price);
        let required = tx.value.saturating_add(fee);
        let available = accounts.balance(&sender);
        if available < required {
            return Err(TxError::InsufficientFunds {
                required,
                available,
            });
        }
        Ok((sender, fee))
    }
}

impl ExecutionEngine for InMemoryEngine {
    fn info(&self) -> EngineInfo {
        let state = self.state.read();
        EngineInfo {
            last_height: state.last_height,
            app_hash: state.last_hash,
        }
    }

    fn net_version(&self) -> u64 {
        self.chain_id
    }

    fn check_tx(&self, tx: &Transaction) -> TxResponse {
        let mut state = self.state.write();
        match self.validate(&state.check, tx) {
            Ok((sender, _)) => {
                let nonce = state.check.nonce(&sender) + 1;
                state.check.nonces.insert(sender, nonce);
                TxResponse::ok()
            }
            Err(err) => TxResponse::from(err),
        }
    }

    fn basic_check(&self, view: StateView, tx: &Transaction) -> Result<BasicCheck, Rejection> {
        let sender = self.recover_sender(tx)?;
        let expected = self.nonce(view, &sender);
        if tx.nonce != expected {
            return Err(Rejection::new(
                "invalid_nonce",
                format!("invalid nonce: expected {expected}, got {}", tx.nonce),
            ));
        }
        Ok(BasicCheck {
            sender,
            nonce: tx.nonce,
        })
    }

    fn recover_sender(&self, tx: &Transaction) -> Result<Address, Rejection> {
        if tx.chain_id != self.chain_id {
            return Err(Rejection::new(
                "invalid_chain_id",
                format!("chain id {} does not match {}", tx.chain_id, self.chain_id),
            ));
        }
        <Address>::try_from(tx.signature.as_slice())
            .map_err(|_| Rejection::new("invalid_signature", "invalid sender signature"))
    }

    fn deliver_tx(&self, tx: &Transaction) -> TxResponse {
        let mut state = self.state.write();
        let (sender, fee) = match self.validate(&state.deliver, tx) {
            Ok(ok) => ok,
            Err(err) => {
                warn!(error = %err, "engine tx rejected at delivery");
                return TxResponse::from(err);
            }
        };

        state.deliver.sub(&sender, tx.value.saturating_add(fee));
        if let Some(to) = &tx.to {
            state.deliver.add(to, tx.value);
        }
        let nonce = tx.nonce + 1;
        state.deliver.nonces.insert(sender, nonce);
        state.block_fee = state.block_fee.saturating_add(fee);

        TxResponse {
            gas_used: tx.gas_limit,
            gas_fee: fee,
            ..TxResponse::ok()
        }
    }

    fn begin_block(&self, header: &BlockHeader) {
        let mut state = self.state.write();
        state.height = header.height;
        state.block_fee = U256::zero();
    }

    fn end_block(&self, _height: u64) -> U256 {
        self.state.read().block_fee
    }

    fn commit(&self) -> Result<Hash, Rejection> {
        let mut state = self.state.write();
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            state.deliver = state.committed.clone();
            state.check = state.committed.clone();
            return Err(Rejection::new("commit_failed", "engine commit failed"));
        }
        state.committed = state.deliver.clone();
        state.check = state.deliver.clone();
        state.last_height = state.height;
        state.last_hash = state.committed.root();
        debug!(height = state.last_height, "engine committed");
        Ok(state.last_hash)
    }

    fn nonce(&self, view: StateView, address: &Address) -> u64 {
        self.state.read().view(view).nonce(address)
    }

    fn set_nonce(&self, view: StateView, address: &Address, nonce: u64) {
        self.state.write().view_mut(view).nonces.insert(*address, nonce);
    }

    fn balance(&self, view: StateView, address: &Address) -> U256 {
        self.state.read().view(view).balance(address)
    }

    fn sub_balance(&self, view: StateView, address: &Address, amount: U256) {
        self.state.write().view_mut(view).sub(address, amount);
    }

    fn add_balance(&self, view: StateView, address: &Address, amount: U256) {
        self.state.write().view_mut(view).add(address, amount);
    }
}
