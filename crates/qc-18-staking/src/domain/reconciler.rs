//! # Validator-Set Reconciliation
//!
//! Derives the validator view from the candidate set and computes the minimal
//! update list for the consensus engine.
//!
//! ## Ordering
//!
//! The validator view is sorted by voting power descending, ties broken by
//! ascending derived address. Diffing re-sorts both views by address and walks
//! them in a single merge pass:
//!
//! ```text
//! address only in V1      -> removal (power 0)
//! address only in V2      -> addition
//! in both, power differs  -> update
//! identical               -> nothing emitted
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use shared_types::{Address, PublicKey, ValidatorUpdate};

use super::entities::{
    find_rotation, Candidate, CandidateState, PubKeyUpdate, Validator, DEFAULT_VOTING_POWER,
};

/// Assigns voting power to active candidates.
pub trait VotingPowerPolicy: Send + Sync {
    fn voting_power(&self, candidate: &Candidate) -> u64;
}

/// Every active candidate gets the same power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedVotingPower(pub u64);

impl Default for FixedVotingPower {
    fn default() -> Self {
        Self(DEFAULT_VOTING_POWER)
    }
}

impl VotingPowerPolicy for FixedVotingPower {
    fn voting_power(&self, _candidate: &Candidate) -> u64 {
        self.0
    }
}

fn by_power_then_address(a: &Candidate, b: &Candidate) -> Ordering {
    b.voting_power
        .cmp(&a.voting_power)
        .then_with(|| a.address().cmp(&b.address()))
}

/// Validators in view order: the power-sorted prefix before the first
/// zero-power candidate.
pub fn validator_view(candidates: &[Candidate]) -> Vec<Validator> {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| by_power_then_address(a, b));
    sorted
        .into_iter()
        .take_while(|c| c.voting_power > 0)
        .map(Candidate::to_validator)
        .collect()
}

fn sorted_by_address(validators: &[Validator]) -> Vec<(Address, ValidatorUpdate)> {
    let mut keyed: Vec<_> = validators
        .iter()
        .map(|v| (v.address(), v.to_update()))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed
}

/// Updates that turn validator set `v1` into `v2`, in ascending address order.
pub fn validators_changed(v1: &[Validator], v2: &[Validator]) -> Vec<ValidatorUpdate> {
    let old = sorted_by_address(v1);
    let new = sorted_by_address(v2);
    let mut changed = Vec::with_capacity(old.len() + new.len());
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        match old[i].0.cmp(&new[j].0) {
            Ordering::Greater => {
                changed.push(new[j].1);
                j += 1;
            }
            Ordering::Less => {
                changed.push(ValidatorUpdate::removal(old[i].1.pub_key));
                i += 1;
            }
            Ordering::Equal => {
                if old[i].1.power != new[j].1.power {
                    changed.push(new[j].1);
                }
                i += 1;
                j += 1;
            }
        }
    }
    changed.extend(new[j..].iter().map(|(_, u)| *u));
    changed.extend(
        old[i..]
            .iter()
            .map(|(_, u)| ValidatorUpdate::removal(u.pub_key)),
    );
    changed
}

/// Apply an update list to a consensus-side validator set.
///
/// Returns the resulting set in ascending address order.
pub fn apply_changes(current: &[ValidatorUpdate], diff: &[ValidatorUpdate]) -> Vec<ValidatorUpdate> {
    let mut set: BTreeMap<Address, ValidatorUpdate> =
        current.iter().map(|u| (u.address(), *u)).collect();
    for update in diff {
        if update.power == 0 {
            set.remove(&update.address());
        } else {
            set.insert(update.address(), *update);
        }
    }
    set.into_values().collect()
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Updates for the consensus engine.
    pub updates: Vec<ValidatorUpdate>,
    /// The new validator view.
    pub validators: Vec<Validator>,
    /// Candidates whose stored row changed.
    pub changed: Vec<Candidate>,
}

pub struct ValidatorSetReconciler<P = FixedVotingPower> {
    policy: P,
}

impl Default for ValidatorSetReconciler<FixedVotingPower> {
    fn default() -> Self {
        Self::new(FixedVotingPower::default())
    }
}

impl<P: VotingPowerPolicy> ValidatorSetReconciler<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Recompute powers, apply queued key rotations and diff the views.
    ///
    /// Rotations carrying nonzero power are applied before the new view is
    /// taken, so the consensus engine sees the old key removed and the new one
    /// added in the same block. Rotations carrying zero power only touch the
    /// stored key.
    pub fn reconcile(&self, candidates: &[Candidate], rotations: &[PubKeyUpdate]) -> Reconciliation {
        let v1 = validator_view(candidates);

        let mut next: Vec<Candidate> = candidates.to_vec();
        for candidate in next.iter_mut() {
            if let Some(rotation) = find_rotation(rotations, &candidate.pub_key) {
                if rotation.voting_power > 0 {
                    candidate.pub_key = rotation.new_pub_key;
                }
            }
            if candidate.active {
                candidate.voting_power = self.policy.voting_power(candidate);
                candidate.state = CandidateState::Validator;
            } else {
                candidate.voting_power = 0;
                candidate.state = CandidateState::Candidate;
            }
        }

        let v2 = validator_view(&next);
        let updates = validators_changed(&v1, &v2);

        for candidate in next.iter_mut() {
            if let Some(rotation) = find_rotation(rotations, &candidate.pub_key) {
                if rotation.voting_power == 0 {
                    candidate.pub_key = rotation.new_pub_key;
                }
            }
        }

        let changed = next
            .into_iter()
            .zip(candidates)
            .filter(|(new, old)| new != *old)
            .map(|(new, _)| new)
            .collect();

        Reconciliation {
            updates,
            validators: v2,
            changed,
        }
    }
}

/// Outcome of applying a retirement to the current validator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetirementPlan {
    /// Survivors at the retirement power, everyone else at 0.
    pub updates: Vec<ValidatorUpdate>,
    /// Validators to deactivate.
    pub retired: Vec<Validator>,
    pub survivors: usize,
}

impl RetirementPlan {
    /// A retirement only succeeds when someone is left to run the chain.
    pub fn succeeds(&self) -> bool {
        self.survivors >= 1
    }
}

/// Split `validators` into survivors (key in `preserved`) and the rest.
///
/// Survivor rows keep their stored power; the node shuts down right after a
/// successful retirement, so only the emitted updates matter.
pub fn plan_retirement(
    validators: &[Validator],
    preserved: &[PublicKey],
    survivor_power: u64,
) -> RetirementPlan {
    let mut updates = Vec::with_capacity(validators.len());
    let mut retired = Vec::new();
    for validator in validators {
        if preserved.contains(&validator.pub_key) {
            updates.push(ValidatorUpdate::new(validator.pub_key, survivor_power));
        } else {
            updates.push(ValidatorUpdate::removal(validator.pub_key));
            retired.push(*validator);
        }
    }
    RetirementPlan {
        survivors: validators.len() - retired.len(),
        updates,
        retired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Description;
    use proptest::prelude::*;

    fn candidate(id: u64, key: u8, power: u64, active: bool) -> Candidate {
        Candidate {
            id,
            pub_key: [key; 32],
            owner_address: [key; 20],
            voting_power: power,
            description: Description::default(),
            verified: false,
            active,
            created_at: 0,
            block_height: 0,
            state: if power > 0 {
                CandidateState::Validator
            } else {
                CandidateState::Candidate
            },
        }
    }

    #[test]
    fn test_single_zero_power_candidate_yields_empty_view() {
        assert!(validator_view(&[candidate(1, 1, 0, true)]).is_empty());
    }

    #[test]
    fn test_view_stops_at_first_zero_power() {
        let view = validator_view(&[
            candidate(1, 1, 1000, true),
            candidate(2, 2, 0, false),
            candidate(3, 3, 500, true),
        ]);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].voting_power, 1000);
        assert_eq!(view[1].voting_power, 500);
    }

    #[test]
    fn test_diff_emits_addition_removal_and_update() {
        let v1 = validator_view(&[candidate(1, 1, 1000, true), candidate(2, 2, 1000, true)]);
        let v2 = validator_view(&[candidate(2, 2, 500, true), candidate(3, 3, 1000, true)]);
        let diff = validators_changed(&v1, &v2);
        assert_eq!(diff.len(), 3);
        assert!(diff.contains(&ValidatorUpdate::removal([1; 32])));
        assert!(diff.contains(&ValidatorUpdate::new([2; 32], 500)));
        assert!(diff.contains(&ValidatorUpdate::new([3; 32], 1000)));
    }

    #[test]
    fn test_identical_views_emit_nothing() {
        let v = validator_view(&[candidate(1, 1, 1000, true)]);
        assert!(validators_changed(&v, &v).is_empty());
    }

    #[test]
    fn test_reconcile_recomputes_power_and_state() {
        let reconciler = ValidatorSetReconciler::default();
        let out = reconciler.reconcile(
            &[candidate(1, 1, 0, true), candidate(2, 2, 1000, false)],
            &[],
        );
        assert!(out.updates.contains(&ValidatorUpdate::new([1; 32], 1000)));
        assert!(out.updates.contains(&ValidatorUpdate::removal([2; 32])));
        assert_eq!(out.updates.len(), 2);
        assert_eq!(out.validators.len(), 1);
        assert_eq!(out.changed.len(), 2);
        let demoted = out.changed.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(demoted.state, CandidateState::Candidate);
        assert_eq!(demoted.voting_power, 0);
    }

    #[test]
    fn test_reconcile_applies_rotation_with_power() {
        let reconciler = ValidatorSetReconciler::default();
        let rotation = PubKeyUpdate {
            old_pub_key: [1; 32],
            new_pub_key: [9; 32],
            voting_power: 1000,
        };
        let out = reconciler.reconcile(&[candidate(1, 1, 1000, true)], &[rotation]);
        assert!(out.updates.contains(&ValidatorUpdate::removal([1; 32])));
        assert!(out.updates.contains(&ValidatorUpdate::new([9; 32], 1000)));
        assert_eq!(out.changed[0].pub_key, [9; 32]);
    }

    #[test]
    fn test_reconcile_applies_zero_power_rotation_after_diff() {
        let reconciler = ValidatorSetReconciler::default();
        let rotation = PubKeyUpdate {
            old_pub_key: [1; 32],
            new_pub_key: [9; 32],
            voting_power: 0,
        };
        let out = reconciler.reconcile(&[candidate(1, 1, 0, false)], &[rotation]);
        assert!(out.updates.is_empty());
        assert_eq!(out.changed[0].pub_key, [9; 32]);
    }

    #[test]
    fn test_retirement_plan() {
        let validators =
            validator_view(&[candidate(1, 1, 1000, true), candidate(2, 2, 1000, true)]);
        let plan = plan_retirement(&validators, &[[2; 32]], 1000);
        assert!(plan.succeeds());
        assert_eq!(plan.retired.len(), 1);
        assert_eq!(plan.retired[0].pub_key, [1; 32]);
        assert!(plan.updates.contains(&ValidatorUpdate::removal([1; 32])));

        let none = plan_retirement(&validators, &[[7; 32]], 1000);
        assert!(!none.succeeds());
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<Candidate>> {
        prop::collection::vec((any::<u8>(), 0u64..4, any::<bool>()), 0..24).prop_map(|rows| {
            let mut seen = std::collections::HashSet::new();
            rows.into_iter()
                .filter(|(key, _, _)| seen.insert(*key))
                .enumerate()
                .map(|(i, (key, power, active))| candidate(i as u64 + 1, key, power * 500, active))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_view_is_ordered(candidates in arb_candidates()) {
            let view = validator_view(&candidates);
            for pair in view.windows(2) {
                prop_assert!(pair[0].voting_power >= pair[1].voting_power);
                if pair[0].voting_power == pair[1].voting_power {
                    prop_assert!(pair[0].address() < pair[1].address());
                }
            }
            prop_assert!(view.iter().all(|v| v.voting_power > 0));
        }

        #[test]
        fn prop_diff_replays_to_target(a in arb_candidates(), b in arb_candidates()) {
            let v1 = validator_view(&a);
            let v2 = validator_view(&b);
            let diff = validators_changed(&v1, &v2);
            let start: Vec<_> = v1.iter().map(Validator::to_update).collect();
            let mut expected: Vec<_> = v2.iter().map(Validator::to_update).collect();
            expected.sort_by_key(|u| u.address());
            prop_assert_eq!(apply_changes(&start, &diff), expected);
        }
    }
}
