//! Deliver pass: authoritative state transitions.
//!
//! Every operation re-runs the check pass against the deliver view first, so a
//! transaction that passed the mempool against stale state is still rejected.

use shared_types::{Address, Params, U256, ZERO_ADDRESS};
use tracing::debug;

use super::check::{ensure_balance, Checker};
use super::entities::{
    AccountUpdateRequest, Candidate, CandidateState, GenesisValidator, PubKeyUpdate,
    RequestState, HOLD_ACCOUNT, PUBKEY_UPDATES_KEY,
};
use super::errors::{StakeError, StakeResult, StoreError};
use super::tx::{
    AcceptCandidacyAccountUpdate, DeclareCandidacy, ExecutionContext, StakeTx, UpdateCandidacy,
    UpdateCandidacyAccount, VerifyCandidacy,
};
use crate::ports::{BalanceLedger, CandidateWriter, KeyValueStore};

/// Result of a delivered staking transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeReceipt {
    pub gas_used: u64,
    pub gas_fee: U256,
    pub data: Vec<u8>,
}

/// Key rotations queued in the native store.
pub fn queued_rotations<K: KeyValueStore + ?Sized>(kv: &K) -> StakeResult<Vec<PubKeyUpdate>> {
    match kv.get(PUBKEY_UPDATES_KEY) {
        None => Ok(Vec::new()),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupted(format!("pubkey updates: {e}")).into()),
    }
}

fn queue_rotation<K: KeyValueStore + ?Sized>(kv: &mut K, update: PubKeyUpdate) -> StakeResult<()> {
    let mut updates = queued_rotations(kv)?;
    updates.push(update);
    let bytes = serde_json::to_vec(&updates)
        .map_err(|e| StoreError::Corrupted(format!("pubkey updates: {e}")))?;
    kv.set(PUBKEY_UPDATES_KEY, bytes);
    Ok(())
}

pub struct Deliverer<'a, W: ?Sized, K: ?Sized, L: ?Sized> {
    writer: &'a mut W,
    kv: &'a mut K,
    ledger: &'a mut L,
    params: &'a Params,
    ctx: &'a ExecutionContext,
    sender: Address,
}

impl<'a, W, K, L> Deliverer<'a, W, K, L>
where
    W: CandidateWriter + ?Sized,
    K: KeyValueStore + ?Sized,
    L: BalanceLedger + ?Sized,
{
    pub fn new(
        ctx: &'a ExecutionContext,
        params: &'a Params,
        writer: &'a mut W,
        kv: &'a mut K,
        ledger: &'a mut L,
    ) -> StakeResult<Self> {
        Ok(Self {
            sender: ctx.sender()?,
            writer,
            kv,
            ledger,
            params,
            ctx,
        })
    }

    pub fn deliver(&mut self, tx: &StakeTx) -> StakeResult<StakeReceipt> {
        let rotations = queued_rotations(&*self.kv)?;
        Checker::new(self.ctx, self.params, &*self.writer, &*self.ledger)?
            .with_rotations(rotations)
            .check(tx)?;

        let gas_used = tx.gas_limit(self.params);
        let gas_fee = self.params.gas_fee(gas_used);
        let data = match tx {
            StakeTx::DeclareCandidacy(inner) => {
                self.declare_candidacy(inner, gas_fee)?;
                Vec::new()
            }
            StakeTx::UpdateCandidacy(inner) => {
                self.update_candidacy(inner, gas_fee)?;
                Vec::new()
            }
            StakeTx::WithdrawCandidacy | StakeTx::DeactivateCandidacy => {
                self.set_active(false)?;
                Vec::new()
            }
            StakeTx::ActivateCandidacy => {
                self.set_active(true)?;
                Vec::new()
            }
            StakeTx::VerifyCandidacy(inner) => {
                self.verify_candidacy(inner)?;
                Vec::new()
            }
            StakeTx::UpdateCandidacyAccount(inner) => {
                let id = self.update_candidate_account(inner, gas_fee)?;
                id.to_string().into_bytes()
            }
            StakeTx::AcceptCandidacyAccountUpdate(inner) => {
                self.accept_candidate_account_update(inner, gas_fee)?;
                Vec::new()
            }
        };

        debug!(kind = tx.kind(), gas_used, "stake tx delivered");
        Ok(StakeReceipt {
            gas_used,
            gas_fee,
            data,
        })
    }

    fn own_candidate(&self) -> StakeResult<Candidate> {
        self.writer
            .candidate_by_address(&self.sender)?
            .ok_or(StakeError::CandidateNotFound)
    }

    fn charge(&mut self, from: Address, fee: U256) {
        self.ledger.sub_balance(&from, fee);
        self.ledger.add_balance(&HOLD_ACCOUNT, fee);
    }

    fn declare_candidacy(&mut self, tx: &DeclareCandidacy, fee: U256) -> StakeResult<()> {
        ensure_balance(&*self.ledger, &self.sender, fee)?;
        self.writer.insert_candidate(Candidate {
            id: 0,
            pub_key: tx.pub_key,
            owner_address: self.sender,
            voting_power: 0,
            description: tx.description.clone(),
            verified: false,
            active: true,
            created_at: self.ctx.block_time,
            block_height: self.ctx.height,
            state: CandidateState::Candidate,
        })?;
        Ok(())
    }

    fn update_candidacy(&mut self, tx: &UpdateCandidacy, fee: U256) -> StakeResult<()> {
        let mut candidate = self.own_candidate()?;
        if candidate.description.merge(&tx.description) {
            candidate.verified = false;
        }
        ensure_balance(&*self.ledger, &self.sender, fee)?;

        // Rotations apply at the next reconciliation, never in place
        if let Some(new_pub_key) = tx.pub_key {
            queue_rotation(
                &mut *self.kv,
                PubKeyUpdate {
                    old_pub_key: candidate.pub_key,
                    new_pub_key,
                    voting_power: candidate.voting_power,
                },
            )?;
        }
        self.writer.update_candidate(&candidate)?;
        Ok(())
    }

    fn set_active(&mut self, active: bool) -> StakeResult<()> {
        let mut candidate = self.own_candidate()?;
        candidate.active = active;
        self.writer.update_candidate(&candidate)?;
        Ok(())
    }

    fn verify_candidacy(&mut self, tx: &VerifyCandidacy) -> StakeResult<()> {
        let mut candidate = self
            .writer
            .candidate_by_address(&tx.candidate_address)?
            .ok_or(StakeError::CandidateNotFound)?;
        candidate.verified = tx.verified;
        self.writer.update_candidate(&candidate)?;
        Ok(())
    }

    fn update_candidate_account(
        &mut self,
        tx: &UpdateCandidacyAccount,
        fee: U256,
    ) -> StakeResult<u64> {
        ensure_balance(&*self.ledger, &self.sender, fee)?;
        // Charged up front and kept even if the request is never accepted
        self.charge(self.sender, fee);

        let candidate = self.own_candidate()?;
        let id = self.writer.insert_request(AccountUpdateRequest {
            id: 0,
            candidate_id: candidate.id,
            from_address: self.sender,
            to_address: tx.new_candidate_account,
            created_block_height: self.ctx.height,
            accepted_block_height: 0,
            state: RequestState::Pending,
        })?;
        Ok(id)
    }

    fn accept_candidate_account_update(
        &mut self,
        tx: &AcceptCandidacyAccountUpdate,
        fee: U256,
    ) -> StakeResult<()> {
        let mut request = self
            .writer
            .request_by_id(tx.account_update_request_id)?
            .ok_or(StakeError::RequestNotFound)?;
        let mut candidate = self
            .writer
            .candidate_by_id(request.candidate_id)?
            .ok_or(StakeError::CandidateNotFound)?;
        ensure_balance(&*self.ledger, &self.sender, fee)?;

        candidate.owner_address = request.to_address;
        self.writer.update_candidate(&candidate)?;
        self.charge(request.to_address, fee);

        request.state = RequestState::Completed;
        request.accepted_block_height = self.ctx.height;
        self.writer.update_request(&request)?;

        // Requests opened by the previous owner can no longer be honoured
        for mut stale in self.writer.pending_requests_for(candidate.id)? {
            stale.state = RequestState::Cancelled;
            self.writer.update_request(&stale)?;
        }
        Ok(())
    }
}

/// Register a genesis validator directly in state `Validator`.
pub fn declare_genesis_candidacy<W: CandidateWriter + ?Sized>(
    writer: &mut W,
    genesis: &GenesisValidator,
    height: u64,
) -> StakeResult<u64> {
    if genesis.address == ZERO_ADDRESS {
        return Err(StakeError::InvalidGenesisAddress);
    }
    if writer.candidate_by_address(&genesis.address)?.is_some() {
        return Err(StakeError::AddressAlreadyDeclared);
    }
    if writer.candidate_by_pub_key(&genesis.pub_key)?.is_some() {
        return Err(StakeError::PubKeyAlreadyDeclared);
    }
    let id = writer.insert_candidate(Candidate {
        id: 0,
        pub_key: genesis.pub_key,
        owner_address: genesis.address,
        voting_power: genesis.power,
        description: genesis.description.clone(),
        verified: false,
        active: true,
        created_at: 0,
        block_height: height,
        state: CandidateState::Validator,
    })?;
    Ok(id)
}
