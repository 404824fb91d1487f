//! Check pass: read-only precondition validation.
//!
//! Runs against whatever view it is handed. The bridge hands it the committed
//! snapshot at mempool time; the deliver pass re-runs it against the block's
//! relational transaction before mutating.
//!
//! Key rotations queued earlier in the block live in the native store until
//! EndBlock. The deliver pass hands them in through [`Checker::with_rotations`]
//! so a queued key counts as taken. The mempool pass runs with an empty queue
//! because EndBlock drains it before every commit.

use shared_types::{Address, Params, PublicKey, U256, ZERO_ADDRESS};

use super::entities::{Candidate, PubKeyUpdate};
use super::errors::{StakeError, StakeResult};
use super::tx::{
    AcceptCandidacyAccountUpdate, DeclareCandidacy, ExecutionContext, StakeTx, UpdateCandidacy,
    UpdateCandidacyAccount, VerifyCandidacy,
};
use crate::ports::{BalanceReader, CandidateReader};

/// Fail with `InsufficientFunds` unless `address` holds at least `required`.
pub fn ensure_balance<B: BalanceReader + ?Sized>(
    balances: &B,
    address: &Address,
    required: U256,
) -> StakeResult<()> {
    let available = balances.balance(address);
    if available < required {
        return Err(StakeError::InsufficientFunds {
            required,
            available,
        });
    }
    Ok(())
}

pub struct Checker<'a, R: ?Sized, B: ?Sized> {
    reader: &'a R,
    balances: &'a B,
    params: &'a Params,
    sender: Address,
    rotations: Vec<PubKeyUpdate>,
}

impl<'a, R, B> Checker<'a, R, B>
where
    R: CandidateReader + ?Sized,
    B: BalanceReader + ?Sized,
{
    pub fn new(
        ctx: &ExecutionContext,
        params: &'a Params,
        reader: &'a R,
        balances: &'a B,
    ) -> StakeResult<Self> {
        Ok(Self {
            reader,
            balances,
            params,
            sender: ctx.sender()?,
            rotations: Vec::new(),
        })
    }

    /// Treat the new keys of these pending rotations as registered.
    pub fn with_rotations(mut self, rotations: Vec<PubKeyUpdate>) -> Self {
        self.rotations = rotations;
        self
    }

    pub fn check(&self, tx: &StakeTx) -> StakeResult<()> {
        match tx {
            StakeTx::DeclareCandidacy(inner) => self.declare_candidacy(inner),
            StakeTx::UpdateCandidacy(inner) => self.update_candidacy(inner),
            StakeTx::WithdrawCandidacy => self.own_candidate().map(|_| ()),
            StakeTx::VerifyCandidacy(inner) => self.verify_candidacy(inner),
            StakeTx::ActivateCandidacy => self.activate_candidacy(),
            StakeTx::DeactivateCandidacy => self.deactivate_candidacy(),
            StakeTx::UpdateCandidacyAccount(inner) => {
                let fee = self.params.gas_fee(tx.gas_limit(self.params));
                self.update_candidate_account(inner, fee)
            }
            StakeTx::AcceptCandidacyAccountUpdate(inner) => {
                self.accept_candidate_account_update(inner)
            }
        }
    }

    /// The candidate owned by the sender.
    pub fn own_candidate(&self) -> StakeResult<Candidate> {
        self.reader
            .candidate_by_address(&self.sender)?
            .ok_or(StakeError::CandidateNotFound)
    }

    /// Stored on a candidate or already claimed by a queued rotation.
    fn key_taken(&self, pub_key: &PublicKey) -> StakeResult<bool> {
        if self.rotations.iter().any(|r| &r.new_pub_key == pub_key) {
            return Ok(true);
        }
        Ok(self.reader.candidate_by_pub_key(pub_key)?.is_some())
    }

    fn declare_candidacy(&self, tx: &DeclareCandidacy) -> StakeResult<()> {
        if self.reader.candidate_by_address(&self.sender)?.is_some() {
            return Err(StakeError::AddressAlreadyDeclared);
        }
        if self.key_taken(&tx.pub_key)? {
            return Err(StakeError::PubKeyAlreadyDeclared);
        }
        Ok(())
    }

    fn update_candidacy(&self, tx: &UpdateCandidacy) -> StakeResult<()> {
        let candidate = self.own_candidate()?;
        if let Some(pub_key) = &tx.pub_key {
            // EndBlock applies only the first rotation per old key
            if self
                .rotations
                .iter()
                .any(|r| r.old_pub_key == candidate.pub_key)
            {
                return Err(StakeError::RotationAlreadyQueued);
            }
            if self.key_taken(pub_key)? {
                return Err(StakeError::PubKeyAlreadyDeclared);
            }
        }
        Ok(())
    }

    fn verify_candidacy(&self, tx: &VerifyCandidacy) -> StakeResult<()> {
        if self
            .reader
            .candidate_by_address(&tx.candidate_address)?
            .is_none()
        {
            return Err(StakeError::CandidateNotFound);
        }
        if self.sender != self.params.foundation_address {
            return Err(StakeError::VerificationDisallowed);
        }
        Ok(())
    }

    fn activate_candidacy(&self) -> StakeResult<()> {
        if self.own_candidate()?.active {
            return Err(StakeError::CandidateAlreadyActivated);
        }
        Ok(())
    }

    fn deactivate_candidacy(&self) -> StakeResult<()> {
        if !self.own_candidate()?.active {
            return Err(StakeError::CandidateAlreadyDeactivated);
        }
        Ok(())
    }

    fn update_candidate_account(&self, tx: &UpdateCandidacyAccount, fee: U256) -> StakeResult<()> {
        let candidate = self.own_candidate()?;
        let target = tx.new_candidate_account;
        if target == ZERO_ADDRESS || target == candidate.owner_address {
            return Err(StakeError::InvalidNewAddress);
        }
        if self.reader.candidate_by_address(&target)?.is_some() {
            return Err(StakeError::AddressInUse);
        }
        if !self.reader.pending_requests_to(&target)?.is_empty() {
            return Err(StakeError::PendingRequestExists);
        }
        ensure_balance(self.balances, &self.sender, fee)
    }

    fn accept_candidate_account_update(&self, tx: &AcceptCandidacyAccountUpdate) -> StakeResult<()> {
        let request = self
            .reader
            .request_by_id(tx.account_update_request_id)?
            .ok_or(StakeError::RequestNotFound)?;
        if request.to_address != self.sender {
            return Err(StakeError::NotRequestRecipient);
        }
        if !request.is_pending() {
            return Err(StakeError::RequestNotPending);
        }
        let candidate = self
            .reader
            .candidate_by_id(request.candidate_id)?
            .ok_or(StakeError::CandidateNotFound)?;
        if candidate.owner_address != request.from_address {
            return Err(StakeError::StaleRequest);
        }
        if self
            .reader
            .candidate_by_address(&request.to_address)?
            .is_some()
        {
            return Err(StakeError::AddressInUse);
        }
        Ok(())
    }
}
