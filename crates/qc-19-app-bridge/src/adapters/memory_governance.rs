//! In-memory governance collaborator.
//!
//! Holds retirement proposals and records routed `governance/*` transactions.
//! Proposal business logic lives outside this layer.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use qc_18_staking::ExecutionContext;

use crate::ports::{
    GovernanceGateway, GovernanceReceipt, Rejection, RetirementStatus, RetiringProposal,
    VoteResult,
};

#[derive(Debug, Default)]
struct GovernanceState {
    proposals: BTreeMap<u64, RetiringProposal>,
    pending: Vec<(u64, u64)>,
    latest_retired_height: u64,
    delivered: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryGovernance {
    state: RwLock<GovernanceState>,
}

impl InMemoryGovernance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_proposal(&self, proposal: RetiringProposal) {
        self.state.write().proposals.insert(proposal.id, proposal);
    }

    pub fn set_latest_retired_height(&self, height: u64) {
        self.state.write().latest_retired_height = height;
    }

    /// `(proposal id, height)` checks scheduled so far.
    pub fn pending_checks(&self) -> Vec<(u64, u64)> {
        self.state.read().pending.clone()
    }

    /// Kinds of governance transactions delivered so far.
    pub fn delivered_kinds(&self) -> Vec<String> {
        self.state.read().delivered.clone()
    }
}

impl GovernanceGateway for InMemoryGovernance {
    fn retiring_proposal(&self, version: &str) -> Option<RetiringProposal> {
        self.state
            .read()
            .proposals
            .values()
            .find(|p| p.version == version && p.result != VoteResult::Rejected)
            .cloned()
    }

    fn proposal(&self, id: u64) -> Option<RetiringProposal> {
        self.state.read().proposals.get(&id).cloned()
    }

    fn update_retirement_status(&self, id: u64, status: RetirementStatus) {
        if let Some(proposal) = self.state.write().proposals.get_mut(&id) {
            proposal.status = Some(status);
        }
    }

    fn schedule_pending(&self, id: u64, height: u64) {
        let mut state = self.state.write();
        if !state.pending.contains(&(id, height)) {
            state.pending.push((id, height));
        }
    }

    fn latest_retired_height(&self) -> u64 {
        self.state.read().latest_retired_height
    }

    fn check_tx(
        &self,
        ctx: &ExecutionContext,
        _kind: &str,
        _payload: &[u8],
    ) -> Result<(), Rejection> {
        ctx.sender()
            .map(|_| ())
            .map_err(|e| Rejection::new(e.code(), e.to_string()))
    }

    fn deliver_tx(
        &self,
        ctx: &ExecutionContext,
        kind: &str,
        payload: &[u8],
    ) -> Result<GovernanceReceipt, Rejection> {
        self.check_tx(ctx, kind, payload)?;
        self.state.write().delivered.push(kind.to_string());
        Ok(GovernanceReceipt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(id: u64, result: VoteResult) -> RetiringProposal {
        RetiringProposal {
            id,
            version: "1.0.0".into(),
            preserved_validators: vec![[1; 32]],
            expire_height: 10,
            result,
            status: None,
        }
    }

    #[test]
    fn test_rejected_proposals_are_not_retiring() {
        let gov = InMemoryGovernance::new();
        gov.insert_proposal(proposal(1, VoteResult::Rejected));
        assert!(gov.retiring_proposal("1.0.0").is_none());
        gov.insert_proposal(proposal(2, VoteResult::Approved));
        assert_eq!(gov.retiring_proposal("1.0.0").map(|p| p.id), Some(2));
        assert!(gov.retiring_proposal("2.0.0").is_none());
    }

    #[test]
    fn test_status_update_and_schedule() {
        let gov = InMemoryGovernance::new();
        gov.insert_proposal(proposal(1, VoteResult::Approved));
        gov.update_retirement_status(1, RetirementStatus::Success);
        assert_eq!(gov.proposal(1).unwrap().status, Some(RetirementStatus::Success));

        gov.schedule_pending(1, 9);
        gov.schedule_pending(1, 9);
        assert_eq!(gov.pending_checks(), vec![(1, 9)]);
    }
}
