//! Staking Service - entry points used by the application bridge.
//!
//! # Architecture
//! - Check runs against whatever read view the caller supplies (committed
//!   snapshot at mempool time)
//! - Deliver runs against the block's relational transaction and re-checks
//! - Reconciliation runs once per block at EndBlock

pub mod block_tx;


pub use block_tx::{with_autocommit, BlockTransaction, Finalized};

use shared_types::{Address, Params, PublicKey, ValidatorUpdate};
use tracing::{info, warn};

use crate::domain::{
    declare_genesis_candidacy, plan_retirement, queued_rotations, validator_view, Candidate,
    Checker, Deliverer, ExecutionContext, FixedVotingPower, GenesisValidator, RetirementPlan,
    StakeReceipt, StakeResult, StakeTx, Validator, ValidatorSetReconciler, VotingPowerPolicy,
    DEFAULT_VOTING_POWER, PUBKEY_UPDATES_KEY,
};
use crate::ports::{BalanceLedger, BalanceReader, CandidateReader, CandidateWriter, KeyValueStore};

pub struct StakeModule<P = FixedVotingPower> {
    reconciler: ValidatorSetReconciler<P>,
    retirement_power: u64,
}

impl Default for StakeModule<FixedVotingPower> {
    fn default() -> Self {
        Self::with_policy(FixedVotingPower::default())
    }
}

impl StakeModule<FixedVotingPower> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: VotingPowerPolicy> StakeModule<P> {
    pub fn with_policy(policy: P) -> Self {
        Self {
            reconciler: ValidatorSetReconciler::new(policy),
            retirement_power: DEFAULT_VOTING_POWER,
        }
    }

    /// Validate `tx` without mutating anything.
    pub fn check<R, B>(
        &self,
        ctx: &ExecutionContext,
        params: &Params,
        reader: &R,
        balances: &B,
        tx: &StakeTx,
    ) -> StakeResult<()>
    where
        R: CandidateReader + ?Sized,
        B: BalanceReader + ?Sized,
    {
        Checker::new(ctx, params, reader, balances)?.check(tx)
    }

    /// Re-validate and apply `tx`.
    pub fn deliver<W, K, L>(
        &self,
        ctx: &ExecutionContext,
        params: &Params,
        writer: &mut W,
        kv: &mut K,
        ledger: &mut L,
        tx: &StakeTx,
    ) -> StakeResult<StakeReceipt>
    where
        W: CandidateWriter + ?Sized,
        K: KeyValueStore + ?Sized,
        L: BalanceLedger + ?Sized,
    {
        Deliverer::new(ctx, params, writer, kv, ledger)?.deliver(tx)
    }

    pub fn set_genesis_validator<W: CandidateWriter + ?Sized>(
        &self,
        writer: &mut W,
        genesis: &GenesisValidator,
        height: u64,
    ) -> StakeResult<u64> {
        let id = declare_genesis_candidacy(writer, genesis, height)?;
        info!(id, power = genesis.power, "genesis validator registered");
        Ok(id)
    }

    /// Reconcile the validator set and persist the recomputed candidates.
    ///
    /// Drains the queued key rotations.
    pub fn update_validator_set<W, K>(
        &self,
        writer: &mut W,
        kv: &mut K,
    ) -> StakeResult<Vec<ValidatorUpdate>>
    where
        W: CandidateWriter + ?Sized,
        K: KeyValueStore + ?Sized,
    {
        let candidates = writer.candidates()?;
        let rotations = queued_rotations(kv)?;
        let outcome = self.reconciler.reconcile(&candidates, &rotations);

        for candidate in &outcome.changed {
            writer.update_candidate(candidate)?;
        }
        if !rotations.is_empty() {
            kv.remove(PUBKEY_UPDATES_KEY);
        }

        info!(
            validators = outcome.validators.len(),
            updates = outcome.updates.len(),
            rotations = rotations.len(),
            "validator set reconciled"
        );
        Ok(outcome.updates)
    }

    /// Current validator view.
    pub fn validators<R: CandidateReader + ?Sized>(&self, reader: &R) -> StakeResult<Vec<Validator>> {
        Ok(validator_view(&reader.candidates()?))
    }

    /// Keep only validators whose key is in `preserved`.
    ///
    /// On success the others are deactivated with power 0. With no survivor
    /// nothing is written and the returned plan reports failure.
    pub fn retire<W: CandidateWriter + ?Sized>(
        &self,
        writer: &mut W,
        preserved: &[PublicKey],
    ) -> StakeResult<RetirementPlan> {
        let validators = self.validators(&*writer)?;
        let plan = plan_retirement(&validators, preserved, self.retirement_power);
        if !plan.succeeds() {
            warn!(
                validators = validators.len(),
                "retirement rejected: no preserved validator in the current set"
            );
            return Ok(plan);
        }

        for retired in &plan.retired {
            if let Some(mut candidate) = writer.candidate_by_id(retired.candidate_id)? {
                candidate.active = false;
                candidate.voting_power = 0;
                writer.update_candidate(&candidate)?;
            }
        }
        info!(
            survivors = plan.survivors,
            retired = plan.retired.len(),
            "validators retired"
        );
        Ok(plan)
    }

    /// Active candidates in id order.
    pub fn active_candidates<R: CandidateReader + ?Sized>(
        &self,
        reader: &R,
    ) -> StakeResult<Vec<Candidate>> {
        Ok(reader
            .candidates()?
            .into_iter()
            .filter(|c| c.active)
            .collect())
    }

    pub fn candidate<R: CandidateReader + ?Sized>(
        &self,
        reader: &R,
        address: &Address,
    ) -> StakeResult<Option<Candidate>> {
        Ok(reader.candidate_by_address(address)?)
    }
}
